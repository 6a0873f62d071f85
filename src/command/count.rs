use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::{debug, info};

use super::CountingArgs;
use crate::pipeline::count_unit;
use crate::runtime::{verify_input_file, LibraryFiles};
use crate::unit::{FractionType, ReadUnit, UnitFiles};

///////////////////////////////
/// Count the barcodes of a single sample, as one unit of a full run would
#[derive(Args, Debug)]
pub struct CountCMD {
    #[arg(long = "condition", value_parser)]
    pub condition: String,

    #[arg(long = "replicate", value_parser)]
    pub replicate: String,

    #[arg(long = "fraction", value_parser = clap::value_parser!(FractionType))]
    /// DNA or RNA
    pub fraction: FractionType,

    #[arg(long = "r1", value_parser)]
    /// Forward barcode reads
    pub path_forward: PathBuf,

    #[arg(long = "r2", value_parser)]
    /// Reverse barcode reads
    pub path_reverse: PathBuf,

    #[arg(long = "umi", value_parser)]
    /// UMI reads; required unless --no-umi
    pub path_umi: Option<PathBuf>,

    #[arg(short = 'o', long = "output", value_parser)]
    /// Directory to store the count tables in
    pub path_out: PathBuf,

    #[command(flatten)]
    pub counting: CountingArgs,
}

impl CountCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let config = self.counting.to_config(self.path_out.clone())?;
        config.validate(&LibraryFiles::default())?;

        let files = UnitFiles {
            path_forward: self.path_forward.clone(),
            path_reverse: self.path_reverse.clone(),
            path_umi: if config.use_umi {
                self.path_umi.clone()
            } else {
                None
            },
        };
        verify_input_file(&files.path_forward)?;
        verify_input_file(&files.path_reverse)?;
        if let Some(p) = &files.path_umi {
            verify_input_file(p)?;
        }

        fs::create_dir_all(&self.path_out)
            .with_context(|| format!("Could not create directory {}", self.path_out.display()))?;
        let unit = ReadUnit::new(&self.condition, &self.replicate, self.fraction);
        let counts = count_unit(&unit, &files, &config, &self.path_out, &mut |stage| {
            debug!("{}: {}", unit, stage)
        })?;

        info!(
            "Count has finished successfully: {} barcodes, {} molecules",
            counts.stats.final_barcodes, counts.stats.final_count_total
        );
        Ok(())
    }
}
