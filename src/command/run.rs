use std::path::PathBuf;

use anyhow::bail;
use anyhow::Result;
use clap::Args;
use log::info;

use super::determine_thread_count;
use crate::pipeline;
use crate::runtime::{
    LibraryFiles, OutputBranch, RunConfig, DEFAULT_BARCODE_LENGTH, DEFAULT_COUNT_THRESHOLD,
    DEFAULT_MAX_MISMATCH_FRACTION, DEFAULT_PSEUDOCOUNT, DEFAULT_TOP_UMIS, DEFAULT_UMI_LENGTH,
};

///////////////////////////////
/// Options shared by every command that counts barcodes
#[derive(Args, Debug, Clone)]
pub struct CountingArgs {
    #[arg(long = "barcode-length", value_parser, default_value_t = DEFAULT_BARCODE_LENGTH)]
    /// Length of the barcode; merged fragments of other lengths are discarded
    pub barcode_length: usize,

    #[arg(long = "umi-length", value_parser, default_value_t = DEFAULT_UMI_LENGTH)]
    /// Number of bases of the UMI read used as UMI
    pub umi_length: usize,

    #[arg(long = "no-umi")]
    /// Count barcode occurrences; no UMI files are read
    pub no_umi: bool,

    #[arg(long = "max-mismatch-fraction", value_parser, default_value_t = DEFAULT_MAX_MISMATCH_FRACTION)]
    /// Largest fraction of mismatching bases tolerated in the read overlap
    pub max_mismatch_fraction: f64,

    #[arg(long = "top-umis", value_parser, default_value_t = DEFAULT_TOP_UMIS)]
    /// Size of the overrepresented UMI report
    pub top_umis: usize,

    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    pub num_threads: Option<usize>,
}

impl CountingArgs {
    ///////////////////////////////
    /// Configuration with these counting options; library options stay at their defaults
    pub fn to_config(&self, output_directory: PathBuf) -> Result<RunConfig> {
        Ok(RunConfig {
            barcode_length: self.barcode_length,
            umi_length: self.umi_length,
            use_umi: !self.no_umi,
            max_mismatch_fraction: self.max_mismatch_fraction,
            top_umis: self.top_umis,
            output_directory,
            num_threads: determine_thread_count(self.num_threads)?,
            ..RunConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct RunCMD {
    #[arg(short = 'i', long = "manifest", value_parser)]
    /// Experiment manifest: Condition, Replicate, DNA_BC_F, DNA_BC_R, DNA_UMI, RNA_BC_F, RNA_BC_R, RNA_UMI
    pub path_manifest: PathBuf,

    #[arg(short = 'o', long = "output", value_parser)]
    /// Directory to store all tables in
    pub path_out: PathBuf,

    #[arg(long = "association", value_parser)]
    /// Barcode to insert association, tab separated. Without it the run stops after final counts
    pub path_association: Option<PathBuf>,

    #[arg(long = "design", value_parser)]
    /// FASTA of the designed inserts; required with --association
    pub path_design: Option<PathBuf>,

    #[arg(long = "labels", value_parser)]
    /// Insert to label table, tab separated
    pub path_label: Option<PathBuf>,

    #[arg(long = "merge-intersect")]
    /// Keep only barcodes seen in both DNA and RNA
    pub merge_intersect: bool,

    #[arg(long = "mpranalyze")]
    /// Write raw count matrices for MPRAnalyze instead of normalized ratios
    pub mpranalyze: bool,

    #[arg(long = "count-threshold", value_parser, default_value_t = DEFAULT_COUNT_THRESHOLD)]
    /// Minimum number of barcodes an insert needs to be reported
    pub count_threshold: usize,

    #[arg(long = "pseudocount", value_parser, default_value_t = DEFAULT_PSEUDOCOUNT)]
    /// Added to every DNA and RNA barcode count when joining without --merge-intersect
    pub pseudocount: u64,

    #[command(flatten)]
    pub counting: CountingArgs,
}

impl RunCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let config = RunConfig {
            merge_intersect: self.merge_intersect,
            branch: OutputBranch::from_flag(self.mpranalyze),
            count_threshold: self.count_threshold,
            pseudocount: self.pseudocount,
            ..self.counting.to_config(self.path_out.clone())?
        };
        info!("Using threads {}", config.num_threads);

        let library = LibraryFiles {
            path_association: self.path_association.clone(),
            path_design: self.path_design.clone(),
            path_label: self.path_label.clone(),
        };

        let report = pipeline::run(&config, &self.path_manifest, &library)?;
        if report.num_incomplete() > 0 {
            bail!(
                "{} units failed, {} entries incomplete; see {}",
                report.num_failed_units(),
                report.num_incomplete(),
                report.path_summary.display()
            );
        }
        info!("Run has finished successfully");
        Ok(())
    }
}
