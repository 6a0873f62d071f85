use itertools::Itertools;
use log::debug;
use serde::Serialize;

use super::MergedCountRow;
use crate::fileformat::{AssociationMap, Labels};
use crate::runtime::{OutputBranch, RunConfig};
use crate::unit::CondRep;

/// Normalized counts are per million
pub const NORMALIZATION_SCALE: f64 = 1e6;

///////////////////////////////
/// A joined barcode resolved to its designed insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedCountRow {
    pub barcode: String,
    pub insert: String,
    pub label: String,
    pub dna_count: u64,
    pub rna_count: u64,
}

///////////////////////////////
/// Insert-level counts and activity for one (condition, replicate)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertRow {
    pub insert: String,
    pub label: String,
    pub dna_count: u64,
    pub rna_count: u64,
    pub dna_normalized: f64,
    pub rna_normalized: f64,
    pub ratio: f64,
    pub log2: f64,
    pub n_obs_bc: usize,
}

///////////////////////////////
/// Qualifying inserts of one (condition, replicate), sorted by insert
#[derive(Debug, Clone, PartialEq)]
pub struct CondRepTable {
    pub cond_rep: CondRep,
    pub rows: Vec<InsertRow>,
}

///////////////////////////////
/// Raw per-barcode counts of one (condition, replicate) for MPRAnalyze, sorted by insert then barcode
#[derive(Debug, Clone, PartialEq)]
pub struct MpraAnalyzeCounts {
    pub cond_rep: CondRep,
    pub rows: Vec<AssignedCountRow>,
}

///////////////////////////////
/// Result of library association; which variant is fixed by the run's output branch
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationOutput {
    Normalized(CondRepTable),
    MpraAnalyze(MpraAnalyzeCounts),
}

///////////////////////////////
/// Exclusions made while associating. None of these are errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssociationStats {
    pub barcodes: u64,
    pub associated: u64,
    pub unassociated: u64,
    pub inserts: u64,
    pub inserts_passing_threshold: u64,
}

#[derive(Debug, Clone)]
pub struct Association {
    pub output: AssociationOutput,
    pub assigned: Vec<AssignedCountRow>,
    pub stats: AssociationStats,
}

///////////////////////////////
/// Resolves joined barcodes to inserts, then either normalizes per insert or keeps raw counts.
/// The association map and labels are borrowed; many associators may share them
pub struct LibraryAssociator<'a> {
    association: &'a AssociationMap,
    labels: &'a Labels,
    config: &'a RunConfig,
}

impl<'a> LibraryAssociator<'a> {
    pub fn new(
        association: &'a AssociationMap,
        labels: &'a Labels,
        config: &'a RunConfig,
    ) -> LibraryAssociator<'a> {
        LibraryAssociator {
            association,
            labels,
            config,
        }
    }

    pub fn associate(&self, cond_rep: &CondRep, merged: &[MergedCountRow]) -> Association {
        let mut stats = AssociationStats {
            barcodes: merged.len() as u64,
            ..AssociationStats::default()
        };

        let mut assigned: Vec<AssignedCountRow> = merged
            .iter()
            .filter_map(|row| {
                let Some(assoc) = self.association.get(&row.barcode) else {
                    stats.unassociated += 1;
                    return None;
                };
                stats.associated += 1;
                Some(AssignedCountRow {
                    barcode: row.barcode.clone(),
                    insert: assoc.insert.clone(),
                    label: self
                        .labels
                        .label_for(&assoc.insert, assoc.group.as_deref())
                        .to_string(),
                    dna_count: row.dna_count,
                    rna_count: row.rna_count,
                })
            })
            .collect();
        assigned.sort_by(|a, b| {
            a.insert
                .cmp(&b.insert)
                .then_with(|| a.barcode.cmp(&b.barcode))
        });
        stats.inserts = assigned.iter().map(|r| &r.insert).dedup().count() as u64;

        let output = match self.config.branch {
            OutputBranch::Normalize => {
                let rows = self.normalize(&assigned);
                stats.inserts_passing_threshold = rows.len() as u64;
                AssociationOutput::Normalized(CondRepTable {
                    cond_rep: cond_rep.clone(),
                    rows,
                })
            }
            OutputBranch::MpraAnalyze => {
                stats.inserts_passing_threshold = stats.inserts;
                AssociationOutput::MpraAnalyze(MpraAnalyzeCounts {
                    cond_rep: cond_rep.clone(),
                    rows: assigned.clone(),
                })
            }
        };
        debug!("{}: {:?}", cond_rep, stats);

        Association {
            output,
            assigned,
            stats,
        }
    }

    ///////////////////////////////
    /// Sum counts per insert, keep inserts with enough barcodes, and normalize to counts per million.
    /// Without intersect joins every barcode gets a pseudocount so ratios stay finite
    fn normalize(&self, assigned: &[AssignedCountRow]) -> Vec<InsertRow> {
        let pseudocount = if self.config.merge_intersect {
            0
        } else {
            self.config.pseudocount
        };

        let mut rows: Vec<InsertRow> = Vec::new();
        for (insert, group) in &assigned.iter().chunk_by(|r| r.insert.as_str()) {
            let group: Vec<&AssignedCountRow> = group.collect();
            let n_obs_bc = group.len();
            if n_obs_bc < self.config.count_threshold {
                continue;
            }
            rows.push(InsertRow {
                insert: insert.to_string(),
                label: group[0].label.clone(),
                dna_count: group.iter().map(|r| r.dna_count + pseudocount).sum(),
                rna_count: group.iter().map(|r| r.rna_count + pseudocount).sum(),
                dna_normalized: 0.0,
                rna_normalized: 0.0,
                ratio: 0.0,
                log2: 0.0,
                n_obs_bc,
            });
        }

        let dna_total: u64 = rows.iter().map(|r| r.dna_count).sum();
        let rna_total: u64 = rows.iter().map(|r| r.rna_count).sum();
        for row in rows.iter_mut() {
            row.dna_normalized = per_million(row.dna_count, dna_total);
            row.rna_normalized = per_million(row.rna_count, rna_total);
            row.ratio = row.rna_normalized / row.dna_normalized;
            row.log2 = row.ratio.log2();
        }
        rows
    }
}

fn per_million(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * NORMALIZATION_SCALE
    }
}
