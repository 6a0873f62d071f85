use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;

use crate::runtime::MpraError;

pub const DEFAULT_BARCODE_LENGTH: usize = 15;
pub const DEFAULT_UMI_LENGTH: usize = 10;
pub const DEFAULT_COUNT_THRESHOLD: usize = 10;
pub const DEFAULT_TOP_UMIS: usize = 10;
pub const DEFAULT_MAX_MISMATCH_FRACTION: f64 = 0.1;
pub const DEFAULT_PSEUDOCOUNT: u64 = 1;
pub const DEFAULT_LABEL: &str = "NA";

///////////////////////////////
/// Which output the library association stage produces. Chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBranch {
    /// Threshold, normalize and average into per-condition master tables
    Normalize,
    /// Raw DNA/RNA counts plus annotation tables for MPRAnalyze
    MpraAnalyze,
}

impl OutputBranch {
    pub fn from_flag(mpranalyze: bool) -> OutputBranch {
        if mpranalyze {
            OutputBranch::MpraAnalyze
        } else {
            OutputBranch::Normalize
        }
    }
}

///////////////////////////////
/// Settings shared by every stage of a run. Built once, then only borrowed
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub barcode_length: usize,
    pub umi_length: usize,
    pub use_umi: bool,
    pub merge_intersect: bool,
    pub branch: OutputBranch,
    pub count_threshold: usize,
    pub top_umis: usize,
    pub max_mismatch_fraction: f64,
    pub pseudocount: u64,
    pub output_directory: PathBuf,
    pub num_threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            barcode_length: DEFAULT_BARCODE_LENGTH,
            umi_length: DEFAULT_UMI_LENGTH,
            use_umi: true,
            merge_intersect: false,
            branch: OutputBranch::Normalize,
            count_threshold: DEFAULT_COUNT_THRESHOLD,
            top_umis: DEFAULT_TOP_UMIS,
            max_mismatch_fraction: DEFAULT_MAX_MISMATCH_FRACTION,
            pseudocount: DEFAULT_PSEUDOCOUNT,
            output_directory: PathBuf::from("."),
            num_threads: 1,
        }
    }
}

///////////////////////////////
/// Library-level inputs. Association and design come together or not at all
#[derive(Debug, Clone, Default)]
pub struct LibraryFiles {
    pub path_association: Option<PathBuf>,
    pub path_design: Option<PathBuf>,
    pub path_label: Option<PathBuf>,
}

impl LibraryFiles {
    pub fn has_association(&self) -> bool {
        self.path_association.is_some()
    }
}

impl RunConfig {
    ///////////////////////////////
    /// Check option consistency and presence of library files. Any problem here aborts the run
    pub fn validate(&self, library: &LibraryFiles) -> Result<()> {
        if self.barcode_length == 0 {
            return Err(MpraError::configuration("barcode length must be positive").into());
        }
        if self.use_umi && self.umi_length == 0 {
            return Err(
                MpraError::configuration("UMI length must be positive when UMIs are used").into(),
            );
        }
        if !(0.0..1.0).contains(&self.max_mismatch_fraction) {
            return Err(MpraError::configuration(format!(
                "mismatch fraction {} is outside [0,1)",
                self.max_mismatch_fraction
            ))
            .into());
        }
        if self.num_threads == 0 {
            return Err(MpraError::configuration("need at least one thread").into());
        }
        //Barcodes seen only in RNA would otherwise give inserts without DNA counts
        if self.pseudocount == 0
            && !self.merge_intersect
            && self.branch == OutputBranch::Normalize
        {
            return Err(MpraError::configuration(
                "a union join needs a positive pseudocount; use --merge-intersect to disable it",
            )
            .into());
        }

        match (&library.path_association, &library.path_design) {
            (Some(_), None) => {
                return Err(MpraError::configuration(
                    "an association file requires a design file",
                )
                .into())
            }
            (None, Some(_)) => {
                return Err(MpraError::configuration(
                    "a design file was given without an association file",
                )
                .into())
            }
            _ => {}
        }
        if self.branch == OutputBranch::MpraAnalyze && !library.has_association() {
            return Err(MpraError::configuration(
                "MPRAnalyze output requires an association file",
            )
            .into());
        }
        if library.path_label.is_some() && !library.has_association() {
            return Err(
                MpraError::configuration("a label file requires an association file").into(),
            );
        }

        for p in [
            &library.path_association,
            &library.path_design,
            &library.path_label,
        ]
        .into_iter()
        .flatten()
        {
            verify_input_file(p)?;
        }
        Ok(())
    }
}

///////////////////////////////
/// Fail with FileNotFound unless the path is an existing file
pub fn verify_input_file(p: &Path) -> Result<()> {
    if p.is_file() {
        Ok(())
    } else {
        Err(MpraError::file_not_found(p).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(assoc: bool, design: bool) -> LibraryFiles {
        LibraryFiles {
            path_association: assoc.then(|| PathBuf::from("/nonexistent/assoc.tsv")),
            path_design: design.then(|| PathBuf::from("/nonexistent/design.fa")),
            path_label: None,
        }
    }

    fn is_configuration_error(e: &anyhow::Error) -> bool {
        matches!(
            e.downcast_ref::<MpraError>(),
            Some(MpraError::Configuration { .. })
        )
    }

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.barcode_length, 15);
        assert_eq!(cfg.umi_length, 10);
        assert!(cfg.use_umi);
        assert!(!cfg.merge_intersect);
        assert_eq!(cfg.branch, OutputBranch::Normalize);
        assert_eq!(cfg.count_threshold, 10);
        assert!(cfg.validate(&LibraryFiles::default()).is_ok());
    }

    #[test]
    fn test_mpranalyze_needs_association() {
        let cfg = RunConfig {
            branch: OutputBranch::from_flag(true),
            ..RunConfig::default()
        };
        let e = cfg.validate(&LibraryFiles::default()).unwrap_err();
        assert!(is_configuration_error(&e));
    }

    #[test]
    fn test_association_and_design_go_together() {
        let cfg = RunConfig::default();
        assert!(is_configuration_error(
            &cfg.validate(&library_with(true, false)).unwrap_err()
        ));
        assert!(is_configuration_error(
            &cfg.validate(&library_with(false, true)).unwrap_err()
        ));
    }

    #[test]
    fn test_missing_library_file() {
        let cfg = RunConfig::default();
        let e = cfg.validate(&library_with(true, true)).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<MpraError>(),
            Some(MpraError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_zero_lengths() {
        let cfg = RunConfig {
            barcode_length: 0,
            ..RunConfig::default()
        };
        assert!(is_configuration_error(
            &cfg.validate(&LibraryFiles::default()).unwrap_err()
        ));

        let cfg = RunConfig {
            umi_length: 0,
            ..RunConfig::default()
        };
        assert!(is_configuration_error(
            &cfg.validate(&LibraryFiles::default()).unwrap_err()
        ));

        //UMI length is irrelevant without UMIs
        let cfg = RunConfig {
            umi_length: 0,
            use_umi: false,
            ..RunConfig::default()
        };
        assert!(cfg.validate(&LibraryFiles::default()).is_ok());
    }

    #[test]
    fn test_union_join_needs_pseudocount() {
        let cfg = RunConfig {
            pseudocount: 0,
            ..RunConfig::default()
        };
        assert!(is_configuration_error(
            &cfg.validate(&LibraryFiles::default()).unwrap_err()
        ));

        let cfg = RunConfig {
            pseudocount: 0,
            merge_intersect: true,
            ..RunConfig::default()
        };
        assert!(cfg.validate(&LibraryFiles::default()).is_ok());

        //Raw MPRAnalyze counts never carry a pseudocount
        let cfg = RunConfig {
            pseudocount: 0,
            branch: OutputBranch::MpraAnalyze,
            ..RunConfig::default()
        };
        let library = library_with(true, true);
        let e = cfg.validate(&library).unwrap_err();
        assert!(!is_configuration_error(&e));
    }
}
