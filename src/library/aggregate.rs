use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Result;
use serde::Serialize;

use super::{AssociationOutput, CondRepTable, InsertRow, MpraAnalyzeCounts};

///////////////////////////////
/// One row of the all-replicates table
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateRow {
    pub condition: String,
    pub replicate: String,
    pub row: InsertRow,
}

///////////////////////////////
/// Per-insert means over the replicates in which the insert qualified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageRow {
    pub insert: String,
    pub label: String,
    pub mean_dna_count: f64,
    pub mean_rna_count: f64,
    pub mean_ratio: f64,
    pub mean_log2: f64,
    pub n_replicates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    pub condition: String,
    pub all_replicates: Vec<ReplicateRow>,
    pub average: Vec<AverageRow>,
}

///////////////////////////////
/// One count column of the MPRAnalyze matrices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRow {
    pub sample: String,
    pub condition: String,
    pub replicate: String,
    pub barcode: usize,
}

///////////////////////////////
/// Wide DNA and RNA count matrices of a condition: one row per insert, one column per
/// (replicate, barcode slot). Both matrices share columns and annotation
#[derive(Debug, Clone, PartialEq)]
pub struct MpraAnalyzeTables {
    pub condition: String,
    pub annotation: Vec<AnnotationRow>,
    pub dna: Vec<(String, Vec<u64>)>,
    pub rna: Vec<(String, Vec<u64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOutput {
    Master(MasterTable),
    MpraAnalyze(MpraAnalyzeTables),
}

///////////////////////////////
/// Merge the association outputs of all replicates of a condition, in replicate order
pub fn aggregate(condition: &str, outputs: Vec<AssociationOutput>) -> Result<ConditionOutput> {
    let mut normalized = Vec::new();
    let mut mpranalyze = Vec::new();
    for output in outputs {
        match output {
            AssociationOutput::Normalized(t) => normalized.push(t),
            AssociationOutput::MpraAnalyze(c) => mpranalyze.push(c),
        }
    }
    match (normalized.is_empty(), mpranalyze.is_empty()) {
        (false, true) => Ok(ConditionOutput::Master(aggregate_normalized(
            condition,
            &normalized,
        ))),
        (true, false) => Ok(ConditionOutput::MpraAnalyze(aggregate_mpranalyze(
            condition,
            &mpranalyze,
        ))),
        (true, true) => bail!("No replicates to aggregate for condition {}", condition),
        (false, false) => bail!("Mixed output formats for condition {}", condition),
    }
}

///////////////////////////////
/// Concatenate replicate tables and average each insert over the replicates that have it
pub fn aggregate_normalized(condition: &str, tables: &[CondRepTable]) -> MasterTable {
    let all_replicates: Vec<ReplicateRow> = tables
        .iter()
        .flat_map(|t| {
            t.rows.iter().map(|row| ReplicateRow {
                condition: condition.to_string(),
                replicate: t.cond_rep.replicate.clone(),
                row: row.clone(),
            })
        })
        .collect();

    let mut per_insert: BTreeMap<&str, Vec<&InsertRow>> = BTreeMap::new();
    for r in &all_replicates {
        per_insert.entry(r.row.insert.as_str()).or_default().push(&r.row);
    }

    let average = per_insert
        .into_iter()
        .map(|(insert, rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&InsertRow) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;
            AverageRow {
                insert: insert.to_string(),
                label: rows[0].label.clone(),
                mean_dna_count: mean(|r| r.dna_count as f64),
                mean_rna_count: mean(|r| r.rna_count as f64),
                mean_ratio: mean(|r| r.ratio),
                mean_log2: mean(|r| r.log2),
                n_replicates: rows.len(),
            }
        })
        .collect();

    MasterTable {
        condition: condition.to_string(),
        all_replicates,
        average,
    }
}

///////////////////////////////
/// Spread raw barcode counts into insert x (replicate, barcode slot) matrices.
/// Slot k of an insert holds its k-th barcode; inserts with fewer barcodes get 0
pub fn aggregate_mpranalyze(condition: &str, counts: &[MpraAnalyzeCounts]) -> MpraAnalyzeTables {
    //Per replicate: insert -> counts of its barcodes, in barcode order
    let per_replicate: Vec<BTreeMap<&str, Vec<(u64, u64)>>> = counts
        .iter()
        .map(|c| {
            let mut m: BTreeMap<&str, Vec<(u64, u64)>> = BTreeMap::new();
            for row in &c.rows {
                m.entry(row.insert.as_str())
                    .or_default()
                    .push((row.dna_count, row.rna_count));
            }
            m
        })
        .collect();

    let mut annotation = Vec::new();
    let mut slots_per_replicate = Vec::new();
    for (c, m) in counts.iter().zip(per_replicate.iter()) {
        let slots = m.values().map(|v| v.len()).max().unwrap_or(0);
        slots_per_replicate.push(slots);
        for k in 1..=slots {
            annotation.push(AnnotationRow {
                sample: format!("{}_bc{}", c.cond_rep.replicate, k),
                condition: condition.to_string(),
                replicate: c.cond_rep.replicate.clone(),
                barcode: k,
            });
        }
    }

    let mut inserts: Vec<&str> = per_replicate
        .iter()
        .flat_map(|m| m.keys().copied())
        .collect();
    inserts.sort_unstable();
    inserts.dedup();

    let mut dna = Vec::with_capacity(inserts.len());
    let mut rna = Vec::with_capacity(inserts.len());
    for insert in inserts {
        let mut dna_row = Vec::with_capacity(annotation.len());
        let mut rna_row = Vec::with_capacity(annotation.len());
        for (m, &slots) in per_replicate.iter().zip(slots_per_replicate.iter()) {
            let bcs = m.get(insert).map(|v| v.as_slice()).unwrap_or(&[]);
            for k in 0..slots {
                let (d, r) = bcs.get(k).copied().unwrap_or((0, 0));
                dna_row.push(d);
                rna_row.push(r);
            }
        }
        dna.push((insert.to_string(), dna_row));
        rna.push((insert.to_string(), rna_row));
    }

    MpraAnalyzeTables {
        condition: condition.to_string(),
        annotation,
        dna,
        rna,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::AssignedCountRow;
    use crate::unit::CondRep;

    fn insert_row(insert: &str, dna: u64, rna: u64, ratio: f64) -> InsertRow {
        InsertRow {
            insert: insert.to_string(),
            label: "NA".to_string(),
            dna_count: dna,
            rna_count: rna,
            dna_normalized: 0.0,
            rna_normalized: 0.0,
            ratio,
            log2: ratio.log2(),
            n_obs_bc: 10,
        }
    }

    fn table(replicate: &str, rows: Vec<InsertRow>) -> CondRepTable {
        CondRepTable {
            cond_rep: CondRep {
                condition: "HepG2".to_string(),
                replicate: replicate.to_string(),
            },
            rows,
        }
    }

    #[test]
    fn test_average_excludes_missing_replicates() {
        let tables = vec![
            table("1", vec![insert_row("enh1", 10, 20, 2.0), insert_row("enh2", 4, 4, 1.0)]),
            table("2", vec![insert_row("enh1", 20, 80, 4.0)]),
            table("3", vec![insert_row("enh2", 6, 12, 2.0)]),
        ];
        let master = aggregate_normalized("HepG2", &tables);
        assert_eq!(master.all_replicates.len(), 4);
        assert_eq!(master.all_replicates[0].replicate, "1");
        assert_eq!(master.all_replicates[3].replicate, "3");

        assert_eq!(master.average.len(), 2);
        let enh1 = &master.average[0];
        assert_eq!(enh1.insert, "enh1");
        assert_eq!(enh1.n_replicates, 2);
        assert_eq!(enh1.mean_ratio, 3.0);
        assert_eq!(enh1.mean_dna_count, 15.0);
        assert_eq!(enh1.mean_rna_count, 50.0);
        assert_eq!(enh1.mean_log2, 1.5);

        let enh2 = &master.average[1];
        assert_eq!(enh2.n_replicates, 2);
        assert_eq!(enh2.mean_ratio, 1.5);
    }

    fn assigned(insert: &str, bc: &str, dna: u64, rna: u64) -> AssignedCountRow {
        AssignedCountRow {
            barcode: bc.to_string(),
            insert: insert.to_string(),
            label: "NA".to_string(),
            dna_count: dna,
            rna_count: rna,
        }
    }

    #[test]
    fn test_mpranalyze_matrices() {
        let counts = vec![
            MpraAnalyzeCounts {
                cond_rep: CondRep {
                    condition: "K562".to_string(),
                    replicate: "1".to_string(),
                },
                rows: vec![
                    assigned("enh1", "AAAA", 1, 2),
                    assigned("enh1", "AAAC", 3, 4),
                    assigned("enh2", "CCCC", 5, 6),
                ],
            },
            MpraAnalyzeCounts {
                cond_rep: CondRep {
                    condition: "K562".to_string(),
                    replicate: "2".to_string(),
                },
                rows: vec![assigned("enh3", "GGGG", 7, 8)],
            },
        ];
        let tables = aggregate_mpranalyze("K562", &counts);
        let samples: Vec<&str> = tables.annotation.iter().map(|a| a.sample.as_str()).collect();
        assert_eq!(samples, vec!["1_bc1", "1_bc2", "2_bc1"]);
        assert_eq!(tables.annotation[2].replicate, "2");
        assert_eq!(tables.annotation[2].barcode, 1);

        assert_eq!(
            tables.dna,
            vec![
                ("enh1".to_string(), vec![1, 3, 0]),
                ("enh2".to_string(), vec![5, 0, 0]),
                ("enh3".to_string(), vec![0, 0, 7]),
            ]
        );
        assert_eq!(tables.rna[0], ("enh1".to_string(), vec![2, 4, 0]));
    }

    #[test]
    fn test_aggregate_dispatch() {
        let out = aggregate(
            "HepG2",
            vec![AssociationOutput::Normalized(table("1", vec![]))],
        )
        .unwrap();
        assert!(matches!(out, ConditionOutput::Master(_)));
        assert!(aggregate("HepG2", vec![]).is_err());
    }
}
