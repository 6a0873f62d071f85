use std::fs::File;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Serialize;

use crate::library::{
    AssociationStats, CondRepTable, ConditionOutput, MasterTable, MpraAnalyzeTables,
};
use crate::unit::CondRep;

pub const INSERT_TABLE_HEADER: [&str; 9] = [
    "insert",
    "label",
    "dna_count",
    "rna_count",
    "dna_normalized",
    "rna_normalized",
    "ratio",
    "log2",
    "n_obs_bc",
];

///////////////////////////////
/// Open a plain TSV with its header line already written
pub fn create_tsv(path: &Path, header: &[&str]) -> Result<csv::Writer<File>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    writer.write_record(header)?;
    Ok(writer)
}

pub fn write_tsv<'a, S, I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    S: Serialize + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut writer = create_tsv(path, header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

///////////////////////////////
/// Most frequent UMIs of a unit, as `umi, count`
pub fn write_top_umis(path: &Path, top: &[(String, u64)]) -> Result<()> {
    write_tsv(path, &["umi", "count"], top)
}

///////////////////////////////
/// Insert-level table of one (condition, replicate)
pub fn write_insert_table(path: &Path, table: &CondRepTable) -> Result<()> {
    write_tsv(path, &INSERT_TABLE_HEADER, &table.rows)
}

pub fn write_association_stats(path: &Path, stats: &[(CondRep, AssociationStats)]) -> Result<()> {
    let mut writer = create_tsv(
        path,
        &[
            "condition",
            "replicate",
            "barcodes",
            "associated",
            "unassociated",
            "inserts",
            "inserts_passing_threshold",
        ],
    )?;
    for (cond_rep, s) in stats {
        writer.write_record([
            cond_rep.condition.clone(),
            cond_rep.replicate.clone(),
            s.barcodes.to_string(),
            s.associated.to_string(),
            s.unassociated.to_string(),
            s.inserts.to_string(),
            s.inserts_passing_threshold.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

///////////////////////////////
/// `{condition}_all_replicates.tsv` and `{condition}_average_replicates.tsv`
pub fn write_master_table(dir: &Path, master: &MasterTable) -> Result<()> {
    #[derive(Serialize)]
    struct Row<'a> {
        condition: &'a str,
        replicate: &'a str,
        insert: &'a str,
        label: &'a str,
        dna_count: u64,
        rna_count: u64,
        dna_normalized: f64,
        rna_normalized: f64,
        ratio: f64,
        log2: f64,
        n_obs_bc: usize,
    }

    let mut header = vec!["condition", "replicate"];
    header.extend_from_slice(&INSERT_TABLE_HEADER);
    let path = dir.join(format!("{}_all_replicates.tsv", master.condition));
    let mut writer = create_tsv(&path, &header)?;
    for r in &master.all_replicates {
        writer.serialize(Row {
            condition: &r.condition,
            replicate: &r.replicate,
            insert: &r.row.insert,
            label: &r.row.label,
            dna_count: r.row.dna_count,
            rna_count: r.row.rna_count,
            dna_normalized: r.row.dna_normalized,
            rna_normalized: r.row.rna_normalized,
            ratio: r.row.ratio,
            log2: r.row.log2,
            n_obs_bc: r.row.n_obs_bc,
        })?;
    }
    writer.flush()?;

    write_tsv(
        &dir.join(format!("{}_average_replicates.tsv", master.condition)),
        &[
            "insert",
            "label",
            "mean_dna_count",
            "mean_rna_count",
            "mean_ratio",
            "mean_log2",
            "n_replicates",
        ],
        &master.average,
    )
}

///////////////////////////////
/// The four MPRAnalyze inputs of a condition: DNA and RNA count matrices and their
/// column annotations
pub fn write_mpranalyze_tables(dir: &Path, tables: &MpraAnalyzeTables) -> Result<()> {
    let mut header = vec!["insert"];
    header.extend(tables.annotation.iter().map(|a| a.sample.as_str()));

    for (fraction, matrix) in [("dna", &tables.dna), ("rna", &tables.rna)] {
        let path = dir.join(format!("{}_{}_counts.tsv", tables.condition, fraction));
        let mut writer = create_tsv(&path, &header)?;
        for (insert, counts) in matrix.iter() {
            let mut record = Vec::with_capacity(counts.len() + 1);
            record.push(insert.clone());
            record.extend(counts.iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        write_tsv(
            &dir.join(format!("{}_{}_annot.tsv", tables.condition, fraction)),
            &["sample", "condition", "replicate", "barcode"],
            &tables.annotation,
        )?;
    }
    Ok(())
}

pub fn write_condition_output(dir: &Path, output: &ConditionOutput) -> Result<()> {
    match output {
        ConditionOutput::Master(master) => write_master_table(dir, master),
        ConditionOutput::MpraAnalyze(tables) => write_mpranalyze_tables(dir, tables),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::AnnotationRow;

    #[test]
    fn test_mpranalyze_files() {
        let dir = tempfile::tempdir().unwrap();
        let tables = MpraAnalyzeTables {
            condition: "K562".to_string(),
            annotation: vec![
                AnnotationRow {
                    sample: "1_bc1".to_string(),
                    condition: "K562".to_string(),
                    replicate: "1".to_string(),
                    barcode: 1,
                },
                AnnotationRow {
                    sample: "1_bc2".to_string(),
                    condition: "K562".to_string(),
                    replicate: "1".to_string(),
                    barcode: 2,
                },
            ],
            dna: vec![("enh1".to_string(), vec![3, 0])],
            rna: vec![("enh1".to_string(), vec![5, 0])],
        };
        write_condition_output(dir.path(), &ConditionOutput::MpraAnalyze(tables)).unwrap();

        let dna = std::fs::read_to_string(dir.path().join("K562_dna_counts.tsv")).unwrap();
        assert_eq!(dna, "insert\t1_bc1\t1_bc2\nenh1\t3\t0\n");
        let annot = std::fs::read_to_string(dir.path().join("K562_rna_annot.tsv")).unwrap();
        assert_eq!(
            annot,
            "sample\tcondition\treplicate\tbarcode\n1_bc1\tK562\t1\t1\n1_bc2\tK562\t1\t2\n"
        );
    }

    #[test]
    fn test_association_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("association_stats.tsv");
        let cond_rep = CondRep {
            condition: "HepG2".to_string(),
            replicate: "1".to_string(),
        };
        let stats = AssociationStats {
            barcodes: 4,
            associated: 3,
            unassociated: 1,
            inserts: 2,
            inserts_passing_threshold: 1,
        };
        write_association_stats(&path, &[(cond_rep, stats)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("HepG2\t1\t4\t3\t1\t2\t1")
        );
    }
}
