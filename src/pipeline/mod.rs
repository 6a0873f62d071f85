mod stage;
mod unit_chain;

pub use stage::{RunSummary, Scope, Stage, SummaryRow};
pub use unit_chain::{count_unit, UnitCounts, UnitPaths, UnitStats, UNIT_STATS_HEADER};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use log::{error, info, warn};
use rayon::prelude::*;

use crate::fileformat::count_table::{write_assigned_counts, write_merged_counts};
use crate::fileformat::tables::{
    write_association_stats, write_condition_output, write_insert_table, write_tsv,
};
use crate::fileformat::{AssociationMap, Design, Labels, Manifest};
use crate::library::{
    aggregate, join_dna_rna, Association, AssociationOutput, ConditionOutput, LibraryAssociator,
    MergedCountRow,
};
use crate::runtime::{LibraryFiles, MpraError, RunConfig};
use crate::unit::{CondRep, FractionType, ReadUnit, UnitFiles};

pub const DIR_COUNTS: &str = "counts";
pub const DIR_ASSIGNED: &str = "assigned";
pub const DIR_AGGREGATED: &str = "aggregated";
pub const FILE_RUN_SUMMARY: &str = "run_summary.tsv";

///////////////////////////////
/// Output directories of a run, created on demand
pub struct OutputDirs {
    pub root: PathBuf,
    pub counts: PathBuf,
    pub assigned: PathBuf,
    pub aggregated: PathBuf,
}

impl OutputDirs {
    pub fn new(root: &Path) -> OutputDirs {
        OutputDirs {
            root: root.to_path_buf(),
            counts: root.join(DIR_COUNTS),
            assigned: root.join(DIR_ASSIGNED),
            aggregated: root.join(DIR_AGGREGATED),
        }
    }

    fn create(&self, with_library: bool) -> Result<()> {
        let mut dirs = vec![&self.root, &self.counts];
        if with_library {
            dirs.push(&self.assigned);
            dirs.push(&self.aggregated);
        }
        for d in dirs {
            fs::create_dir_all(d)
                .with_context(|| format!("Could not create directory {}", d.display()))?;
        }
        Ok(())
    }
}

///////////////////////////////
/// Read-only library data shared by all associations of a run
pub struct Library {
    pub association: AssociationMap,
    pub labels: Labels,
}

impl Library {
    ///////////////////////////////
    /// None when no association file is given; the run then stops after final counts
    pub fn load(files: &LibraryFiles, config: &RunConfig) -> Result<Option<Library>> {
        let (Some(path_association), Some(path_design)) =
            (&files.path_association, &files.path_design)
        else {
            return Ok(None);
        };
        let design = Design::read(path_design)?;
        info!("Design has {} inserts", design.len());
        let association = AssociationMap::read(path_association, &design, config.barcode_length)?;
        let labels = match &files.path_label {
            Some(p) => Labels::read(p)?,
            None => Labels::default(),
        };
        Ok(Some(Library {
            association,
            labels,
        }))
    }
}

///////////////////////////////
/// Outcome of a whole run. Partial failures are recorded here rather than returned as errors
pub struct RunReport {
    pub summary: RunSummary,
    pub path_summary: PathBuf,
}

impl RunReport {
    pub fn num_failed_units(&self) -> usize {
        self.summary.num_failed(Scope::Unit)
    }

    ///////////////////////////////
    /// Failed or blocked entries of any scope
    pub fn num_incomplete(&self) -> usize {
        self.summary
            .rows
            .iter()
            .filter(|r| r.stage.is_terminal_failure())
            .count()
    }
}

///////////////////////////////
/// Run the whole pipeline over a manifest.
///
/// Configuration problems and missing files abort before any unit runs. After that a
/// failing unit only blocks its replicate pair and its condition
pub fn run(config: &RunConfig, path_manifest: &Path, library_files: &LibraryFiles) -> Result<RunReport> {
    config.validate(library_files)?;
    let manifest = Manifest::read(path_manifest, config.use_umi)?;
    if manifest.rows.is_empty() && manifest.rejected.is_empty() {
        return Err(MpraError::configuration(format!(
            "manifest {} lists no samples",
            path_manifest.display()
        ))
        .into());
    }
    manifest.verify_files()?;
    let library = Library::load(library_files, config)?;

    let dirs = OutputDirs::new(&config.output_directory);
    dirs.create(library.is_some())?;

    let mut summary = RunSummary::default();
    record_rejected_rows(&manifest, &mut summary);
    for (unit, _) in manifest.units() {
        summary.record(Scope::Unit, unit.dataset_id(), Stage::Ingested, "");
    }

    //Units
    let mut unit_results = count_units(config, manifest.units(), &dirs.counts, &mut summary);
    let mut unit_counts: BTreeMap<ReadUnit, UnitCounts> = BTreeMap::new();
    let mut unit_stats = Vec::new();
    for (unit, _) in manifest.units() {
        match unit_results.remove(&unit) {
            Some(Ok(counts)) => {
                summary.record(Scope::Unit, unit.dataset_id(), Stage::Deduplicated, "");
                unit_stats.push(counts.stats.clone());
                unit_counts.insert(unit, counts);
            }
            Some(Err(e)) => {
                summary.record_failure(Scope::Unit, unit.dataset_id(), &format!("{:#}", e));
            }
            None => {
                summary.record_failure(
                    Scope::Unit,
                    unit.dataset_id(),
                    "worker stopped without a result",
                );
            }
        }
    }
    write_tsv(
        &dirs.counts.join("unit_stats.tsv"),
        &UNIT_STATS_HEADER,
        &unit_stats,
    )?;

    let Some(library) = library else {
        info!("No association file given, stopping after final counts");
        return finish(summary, &dirs);
    };

    //Replicate pairs
    let mut ready = Vec::new();
    for row in &manifest.rows {
        let cond_rep = row.cond_rep();
        let dna = unit_counts.get(&ReadUnit::new(&row.condition, &row.replicate, FractionType::DNA));
        let rna = unit_counts.get(&ReadUnit::new(&row.condition, &row.replicate, FractionType::RNA));
        match (dna, rna) {
            (Some(dna), Some(rna)) => ready.push((cond_rep, dna, rna)),
            _ => {
                warn!("Skipping join of {}, a unit failed", cond_rep);
                summary.record(
                    Scope::Pair,
                    cond_rep.to_string(),
                    Stage::Blocked,
                    missing_units(&cond_rep, dna.is_some(), rna.is_some()),
                );
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build()?;
    let joined: Vec<(CondRep, Result<Vec<MergedCountRow>>)> = pool.install(|| {
        ready
            .par_iter()
            .map(|(cond_rep, dna, rna)| {
                let result = join_pair(cond_rep, dna, rna, config, &dirs);
                (cond_rep.clone(), result)
            })
            .collect()
    });
    let mut joined_ok = Vec::new();
    for (cond_rep, result) in joined {
        match result {
            Ok(merged) => {
                summary.record(Scope::Pair, cond_rep.to_string(), Stage::Joined, "");
                joined_ok.push((cond_rep, merged));
            }
            Err(e) => {
                error!("Join of {} failed: {:#}", cond_rep, e);
                summary.record_failure(Scope::Pair, cond_rep.to_string(), &format!("{:#}", e));
            }
        }
    }

    let associator = LibraryAssociator::new(&library.association, &library.labels, config);
    let associated: Vec<(CondRep, Result<Association>)> = pool.install(|| {
        joined_ok
            .par_iter()
            .map(|(cond_rep, merged)| {
                let result = associate_pair(&associator, cond_rep, merged, &dirs);
                (cond_rep.clone(), result)
            })
            .collect()
    });

    let mut outputs: BTreeMap<CondRep, AssociationOutput> = BTreeMap::new();
    let mut association_stats = Vec::new();
    for (cond_rep, result) in associated {
        match result {
            Ok(assoc) => {
                let stage = match assoc.output {
                    AssociationOutput::Normalized(_) => Stage::Normalized,
                    AssociationOutput::MpraAnalyze(_) => Stage::Associated,
                };
                summary.record(Scope::Pair, cond_rep.to_string(), stage, "");
                association_stats.push((cond_rep.clone(), assoc.stats));
                outputs.insert(cond_rep, assoc.output);
            }
            Err(e) => {
                error!("Association of {} failed: {:#}", cond_rep, e);
                summary.record_failure(Scope::Pair, cond_rep.to_string(), &format!("{:#}", e));
            }
        }
    }
    write_association_stats(&dirs.assigned.join("association_stats.tsv"), &association_stats)?;

    //Conditions
    for condition in manifest.conditions() {
        let replicates: Vec<CondRep> = manifest
            .rows
            .iter()
            .filter(|r| r.condition == condition)
            .map(|r| r.cond_rep())
            .collect();
        let rejected = manifest
            .rejected
            .iter()
            .filter(|r| r.condition.as_deref() == Some(condition.as_str()))
            .count();
        let missing: Vec<String> = replicates
            .iter()
            .filter(|cr| !outputs.contains_key(cr))
            .map(|cr| cr.to_string())
            .collect();
        if rejected > 0 || !missing.is_empty() {
            warn!("Skipping aggregation of condition {}", condition);
            let mut detail = Vec::new();
            if rejected > 0 {
                detail.push(format!("{} rejected manifest rows", rejected));
            }
            if !missing.is_empty() {
                detail.push(format!("missing {}", missing.join(",")));
            }
            summary.record(Scope::Condition, &condition, Stage::Blocked, detail.join("; "));
            continue;
        }

        let condition_outputs = replicates
            .iter()
            .filter_map(|cr| outputs.remove(cr))
            .collect();
        let result = aggregate(&condition, condition_outputs)
            .and_then(|out| write_condition_output(&dirs.aggregated, &out).map(|_| out));
        match result {
            Ok(ConditionOutput::Master(_)) => {
                summary.record(Scope::Condition, &condition, Stage::Aggregated, "")
            }
            Ok(ConditionOutput::MpraAnalyze(_)) => summary.record(
                Scope::Condition,
                &condition,
                Stage::MpraAnalyzeFormatted,
                "",
            ),
            Err(e) => {
                error!("Aggregation of condition {} failed: {:#}", condition, e);
                summary.record_failure(Scope::Condition, &condition, &format!("{:#}", e))
            }
        }
    }

    finish(summary, &dirs)
}

fn finish(summary: RunSummary, dirs: &OutputDirs) -> Result<RunReport> {
    let path_summary = dirs.root.join(FILE_RUN_SUMMARY);
    summary.write(&path_summary)?;
    info!("Run summary written to {}", path_summary.display());
    Ok(RunReport {
        summary,
        path_summary,
    })
}

fn record_rejected_rows(manifest: &Manifest, summary: &mut RunSummary) {
    for rejected in &manifest.rejected {
        match (&rejected.condition, &rejected.replicate) {
            (Some(condition), Some(replicate)) => {
                for fraction in [FractionType::DNA, FractionType::RNA] {
                    let unit = ReadUnit::new(condition, replicate, fraction);
                    summary.record(
                        Scope::Unit,
                        unit.dataset_id(),
                        Stage::Failed,
                        rejected.reason.clone(),
                    );
                }
                let cond_rep = CondRep {
                    condition: condition.clone(),
                    replicate: replicate.clone(),
                };
                summary.record(
                    Scope::Pair,
                    cond_rep.to_string(),
                    Stage::Blocked,
                    format!("manifest line {} rejected", rejected.line),
                );
            }
            _ => summary.record(
                Scope::Manifest,
                format!("line {}", rejected.line),
                Stage::Failed,
                rejected.reason.clone(),
            ),
        }
    }
}

fn missing_units(cond_rep: &CondRep, has_dna: bool, has_rna: bool) -> String {
    [(FractionType::DNA, has_dna), (FractionType::RNA, has_rna)]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(fraction, _)| {
            format!(
                "{} failed",
                ReadUnit::new(&cond_rep.condition, &cond_rep.replicate, fraction)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

enum UnitEvent {
    Reached(ReadUnit, Stage),
    Done(ReadUnit, Result<UnitCounts>),
}

///////////////////////////////
/// Run every unit chain on a pool of `num_threads` workers. Stage progress and results
/// come back over a channel; a unit missing from the map had its worker die
fn count_units(
    config: &RunConfig,
    units: Vec<(ReadUnit, UnitFiles)>,
    dir: &Path,
    summary: &mut RunSummary,
) -> BTreeMap<ReadUnit, Result<UnitCounts>> {
    let thread_pool = threadpool::ThreadPool::new(config.num_threads);
    let (tx, rx) = crossbeam::channel::unbounded::<UnitEvent>();

    let config = Arc::new(config.clone());
    let dir = Arc::new(dir.to_path_buf());
    for (unit, files) in units {
        let tx = tx.clone();
        let config = Arc::clone(&config);
        let dir = Arc::clone(&dir);
        thread_pool.execute(move || {
            let result = count_unit(&unit, &files, &config, &dir, &mut |stage| {
                let _ = tx.send(UnitEvent::Reached(unit.clone(), stage));
            });
            let _ = tx.send(UnitEvent::Done(unit, result));
        });
    }
    drop(tx);

    let mut results = BTreeMap::new();
    for event in rx.iter() {
        match event {
            UnitEvent::Reached(unit, stage) => {
                summary.record(Scope::Unit, unit.dataset_id(), stage, "");
            }
            UnitEvent::Done(unit, result) => {
                if let Err(e) = &result {
                    error!("Unit {} failed: {:#}", unit, e);
                }
                results.insert(unit, result);
            }
        }
    }
    thread_pool.join();
    results
}

///////////////////////////////
/// Join the DNA and RNA counts of one replicate and write the merged table
fn join_pair(
    cond_rep: &CondRep,
    dna: &UnitCounts,
    rna: &UnitCounts,
    config: &RunConfig,
    dirs: &OutputDirs,
) -> Result<Vec<MergedCountRow>> {
    let merged = join_dna_rna(&dna.counts, &rna.counts, config.merge_intersect);
    info!("{}: {} barcodes after join", cond_rep, merged.len());
    write_merged_counts(
        &dirs.assigned.join(format!("{}_merged_counts.tsv.gz", cond_rep)),
        &merged,
    )?;
    Ok(merged)
}

///////////////////////////////
/// Resolve the inserts of a joined replicate, and write the assigned and
/// (normalize branch) insert tables
fn associate_pair(
    associator: &LibraryAssociator,
    cond_rep: &CondRep,
    merged: &[MergedCountRow],
    dirs: &OutputDirs,
) -> Result<Association> {
    let assoc = associator.associate(cond_rep, merged);
    write_assigned_counts(
        &dirs.assigned.join(format!("{}_assigned_counts.tsv.gz", cond_rep)),
        &assoc.assigned,
    )?;
    if let AssociationOutput::Normalized(table) = &assoc.output {
        write_insert_table(
            &dirs.assigned.join(format!("{}_insert_counts.tsv", cond_rep)),
            table,
        )?;
    }
    info!(
        "{}: {} of {} barcodes associated, {} inserts kept",
        cond_rep, assoc.stats.associated, assoc.stats.barcodes, assoc.stats.inserts_passing_threshold
    );
    Ok(assoc)
}
