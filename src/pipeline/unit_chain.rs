use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use log::debug;
use log::info;
use serde::Serialize;

use crate::barcode::ReadPairMerger;
use crate::count::{filter_by_length, final_counts, top_umis, FinalCountRecord, RawCounter};
use crate::fileformat::count_table::{write_filtered_counts, write_final_counts, write_raw_counts};
use crate::fileformat::open_fastq;
use crate::fileformat::tables::write_top_umis;
use super::Stage;
use crate::runtime::{MpraError, RunConfig};
use crate::unit::{ReadUnit, UnitFiles};

///////////////////////////////
/// One line of `unit_stats.tsv`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitStats {
    pub dataset: String,
    pub read_pairs: u64,
    pub merged: u64,
    pub dropped_no_overlap: u64,
    pub raw_records: u64,
    pub filtered_out_ambiguous: u64,
    pub filtered_out_length: u64,
    pub final_barcodes: u64,
    pub final_count_total: u64,
}

pub const UNIT_STATS_HEADER: [&str; 9] = [
    "dataset",
    "read_pairs",
    "merged",
    "dropped_no_overlap",
    "raw_records",
    "filtered_out_ambiguous",
    "filtered_out_length",
    "final_barcodes",
    "final_count_total",
];

///////////////////////////////
/// Final counts of a unit, sorted by barcode, ready for its DNA/RNA join
#[derive(Debug, Clone)]
pub struct UnitCounts {
    pub counts: Vec<FinalCountRecord>,
    pub stats: UnitStats,
}

///////////////////////////////
/// Where the per-unit tables of a dataset go
pub struct UnitPaths {
    pub raw: PathBuf,
    pub filtered: PathBuf,
    pub final_counts: PathBuf,
    pub top_umis: PathBuf,
}

impl UnitPaths {
    pub fn new(dir: &Path, unit: &ReadUnit) -> UnitPaths {
        let id = unit.dataset_id();
        UnitPaths {
            raw: dir.join(format!("{}_raw_counts.tsv.gz", id)),
            filtered: dir.join(format!("{}_filtered_counts.tsv.gz", id)),
            final_counts: dir.join(format!("{}_final_counts.tsv.gz", id)),
            top_umis: dir.join(format!("{}_top_umis.tsv", id)),
        }
    }
}

///////////////////////////////
/// Run merge, count, filter and dedup for one unit, writing its tables into `dir`.
/// `on_stage` is told every stage the unit completes.
/// Stateless: running a unit again overwrites the same files with the same content
pub fn count_unit(
    unit: &ReadUnit,
    files: &UnitFiles,
    config: &RunConfig,
    dir: &Path,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<UnitCounts> {
    info!("Counting {}", unit);
    let reader_umi = match (config.use_umi, &files.path_umi) {
        (true, Some(p)) => Some(open_fastq(p)?),
        (true, None) => {
            return Err(MpraError::input_format(unit.dataset_id(), "no UMI file given").into())
        }
        (false, _) => None,
    };
    let mut merger = ReadPairMerger::new(
        unit.clone(),
        config.barcode_length,
        config.max_mismatch_fraction,
        open_fastq(&files.path_forward)?,
        open_fastq(&files.path_reverse)?,
        reader_umi,
    );

    let mut counter = RawCounter::new(config.use_umi.then_some(config.umi_length));
    while let Some(record) = merger.next_merged()? {
        counter.add(record)?;
    }
    let merge_stats = merger.stats().clone();
    debug!("{}: {:?}", unit, merge_stats);
    on_stage(Stage::Merged);

    let paths = UnitPaths::new(dir, unit);
    let raw = counter.into_records();
    let raw_records = raw.len() as u64;
    write_raw_counts(&paths.raw, &raw, config.use_umi)?;
    on_stage(Stage::Counted);

    let (filtered, filter_stats) = filter_by_length(raw, config.barcode_length);
    debug!("{}: {:?}", unit, filter_stats);
    write_filtered_counts(&paths.filtered, filtered.records(), config.use_umi)?;
    on_stage(Stage::Filtered);

    let counts = final_counts(&filtered, config.use_umi);
    write_final_counts(&paths.final_counts, &counts)?;
    if config.use_umi {
        write_top_umis(&paths.top_umis, &top_umis(&filtered, config.top_umis))?;
    }
    on_stage(Stage::Deduplicated);

    let stats = UnitStats {
        dataset: unit.dataset_id(),
        read_pairs: merge_stats.read_pairs,
        merged: merge_stats.merged,
        dropped_no_overlap: merge_stats.dropped_no_overlap,
        raw_records,
        filtered_out_ambiguous: filter_stats.ambiguous,
        filtered_out_length: filter_stats.wrong_length,
        final_barcodes: counts.len() as u64,
        final_count_total: counts.iter().map(|r| r.count).sum(),
    };
    info!(
        "{}: {} read pairs, {} merged, {} barcodes",
        unit, stats.read_pairs, stats.merged, stats.final_barcodes
    );

    Ok(UnitCounts {
        counts,
        stats,
    })
}
