use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Result;
use log::warn;
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::runtime::verify_input_file;
use crate::runtime::MpraError;
use crate::unit::{CondRep, FractionType, ReadUnit, UnitFiles};

const REQUIRED_COLUMNS: [&str; 6] = [
    "Condition",
    "Replicate",
    "DNA_BC_F",
    "DNA_BC_R",
    "RNA_BC_F",
    "RNA_BC_R",
];
const UMI_COLUMNS: [&str; 2] = ["DNA_UMI", "RNA_UMI"];

#[derive(Debug, Deserialize)]
struct ManifestRow {
    #[serde(rename = "Condition")]
    condition: String,
    #[serde(rename = "Replicate")]
    replicate: String,
    #[serde(rename = "DNA_BC_F")]
    dna_bc_f: String,
    #[serde(rename = "DNA_BC_R")]
    dna_bc_r: String,
    #[serde(rename = "DNA_UMI", default)]
    dna_umi: Option<String>,
    #[serde(rename = "RNA_BC_F")]
    rna_bc_f: String,
    #[serde(rename = "RNA_BC_R")]
    rna_bc_r: String,
    #[serde(rename = "RNA_UMI", default)]
    rna_umi: Option<String>,
}

///////////////////////////////
/// One manifest row: a replicate of a condition with its DNA and RNA files
#[derive(Debug, Clone)]
pub struct ExperimentRow {
    pub condition: String,
    pub replicate: String,
    pub dna: UnitFiles,
    pub rna: UnitFiles,
}

impl ExperimentRow {
    pub fn cond_rep(&self) -> CondRep {
        CondRep {
            condition: self.condition.clone(),
            replicate: self.replicate.clone(),
        }
    }

    /// Each row is two units, DNA and RNA
    pub fn units(&self) -> [(ReadUnit, UnitFiles); 2] {
        [
            (
                ReadUnit::new(&self.condition, &self.replicate, FractionType::DNA),
                self.dna.clone(),
            ),
            (
                ReadUnit::new(&self.condition, &self.replicate, FractionType::RNA),
                self.rna.clone(),
            ),
        ]
    }
}

///////////////////////////////
/// A manifest row that could not be used. Only this row's units are affected
#[derive(Debug, Clone)]
pub struct RejectedRow {
    pub line: u64,
    pub condition: Option<String>,
    pub replicate: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub rows: Vec<ExperimentRow>,
    pub rejected: Vec<RejectedRow>,
}

impl Manifest {
    ///////////////////////////////
    /// Read the experiment manifest. Comma separated if the name ends in .csv, else tab separated.
    /// Relative FASTQ paths are taken relative to the manifest
    pub fn read(p: &Path, use_umi: bool) -> Result<Manifest> {
        verify_input_file(p)?;
        let delimiter = if p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) {
            b','
        } else {
            b'\t'
        };
        let base_dir = p.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(p)?;

        let headers = reader.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .chain(if use_umi { UMI_COLUMNS.iter() } else { [].iter() })
            .filter(|c| !headers.iter().any(|h| h == **c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(MpraError::file_not_valid(
                p,
                Some(format!("missing column(s) {}", missing.join(", "))),
            )
            .into());
        }
        let idx_condition = headers.iter().position(|h| h == "Condition");
        let idx_replicate = headers.iter().position(|h| h == "Replicate");

        let mut manifest = Manifest::default();
        let mut seen: FxHashSet<CondRep> = FxHashSet::default();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |pos| pos.line());

            let row: ManifestRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(e) => {
                    let reject = RejectedRow {
                        line,
                        condition: idx_condition
                            .and_then(|i| record.get(i))
                            .map(String::from),
                        replicate: idx_replicate
                            .and_then(|i| record.get(i))
                            .map(String::from),
                        reason: e.to_string(),
                    };
                    warn!("Skipping manifest line {}: {}", line, reject.reason);
                    manifest.rejected.push(reject);
                    continue;
                }
            };

            match ExperimentRow::from_manifest_row(row, use_umi, &base_dir) {
                Ok(row) => {
                    if !seen.insert(row.cond_rep()) {
                        bail!(MpraError::configuration(format!(
                            "condition {} replicate {} is listed twice in the manifest",
                            row.condition, row.replicate
                        )));
                    }
                    manifest.rows.push(row)
                }
                Err(reject) => {
                    let reject = RejectedRow { line, ..reject };
                    warn!("Skipping manifest line {}: {}", line, reject.reason);
                    manifest.rejected.push(reject);
                }
            }
        }
        Ok(manifest)
    }

    ///////////////////////////////
    /// Conditions in order of first appearance, including those of rejected rows
    pub fn conditions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .rows
            .iter()
            .map(|r| Some(&r.condition))
            .chain(self.rejected.iter().map(|r| r.condition.as_ref()));
        for cond in all.flatten() {
            if !out.contains(cond) {
                out.push(cond.clone());
            }
        }
        out
    }

    pub fn units(&self) -> Vec<(ReadUnit, UnitFiles)> {
        self.rows.iter().flat_map(|r| r.units()).collect()
    }

    ///////////////////////////////
    /// All FASTQ files must exist before anything runs
    pub fn verify_files(&self) -> Result<()> {
        for (_, files) in self.units() {
            verify_input_file(&files.path_forward)?;
            verify_input_file(&files.path_reverse)?;
            if let Some(p) = &files.path_umi {
                verify_input_file(p)?;
            }
        }
        Ok(())
    }
}

impl ExperimentRow {
    fn from_manifest_row(
        row: ManifestRow,
        use_umi: bool,
        base_dir: &Path,
    ) -> std::result::Result<ExperimentRow, RejectedRow> {
        let reject = |reason: String| RejectedRow {
            line: 0,
            condition: Some(row.condition.clone()),
            replicate: Some(row.replicate.clone()),
            reason,
        };

        if row.condition.is_empty() || row.replicate.is_empty() {
            return Err(reject("empty condition or replicate".to_string()));
        }
        for (name, value) in [
            ("DNA_BC_F", &row.dna_bc_f),
            ("DNA_BC_R", &row.dna_bc_r),
            ("RNA_BC_F", &row.rna_bc_f),
            ("RNA_BC_R", &row.rna_bc_r),
        ] {
            if value.is_empty() {
                return Err(reject(format!("no file given for {}", name)));
            }
        }

        let resolve = |s: &str| -> PathBuf {
            let p = PathBuf::from(s);
            if p.is_absolute() {
                p
            } else {
                base_dir.join(p)
            }
        };
        let umi = |name: &str, value: &Option<String>| -> std::result::Result<Option<PathBuf>, RejectedRow> {
            match (use_umi, value.as_deref()) {
                (false, _) => Ok(None),
                (true, Some(v)) if !v.is_empty() => Ok(Some(resolve(v))),
                (true, _) => Err(reject(format!("no UMI file given for {}", name))),
            }
        };

        Ok(ExperimentRow {
            condition: row.condition.clone(),
            replicate: row.replicate.clone(),
            dna: UnitFiles {
                path_forward: resolve(&row.dna_bc_f),
                path_reverse: resolve(&row.dna_bc_r),
                path_umi: umi("DNA_UMI", &row.dna_umi)?,
            },
            rna: UnitFiles {
                path_forward: resolve(&row.rna_bc_f),
                path_reverse: resolve(&row.rna_bc_r),
                path_umi: umi("RNA_UMI", &row.rna_umi)?,
            },
        })
    }
}
