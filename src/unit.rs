use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::runtime::MpraError;

///////////////////////////////
/// Which nucleic acid fraction a sample was sequenced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FractionType {
    DNA,
    RNA,
}

impl fmt::Display for FractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FractionType::DNA => write!(f, "DNA"),
            FractionType::RNA => write!(f, "RNA"),
        }
    }
}

impl FromStr for FractionType {
    type Err = MpraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DNA" => Ok(FractionType::DNA),
            "RNA" => Ok(FractionType::RNA),
            _ => Err(MpraError::parse_error(s, Some("expected DNA or RNA"))),
        }
    }
}

///////////////////////////////
/// One sequencing sample: a (condition, replicate, fraction) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadUnit {
    pub condition: String,
    pub replicate: String,
    pub fraction: FractionType,
}

impl ReadUnit {
    pub fn new<C: Into<String>, R: Into<String>>(
        condition: C,
        replicate: R,
        fraction: FractionType,
    ) -> ReadUnit {
        ReadUnit {
            condition: condition.into(),
            replicate: replicate.into(),
            fraction,
        }
    }

    /// `condition_replicate_type`, used to name every per-unit output
    pub fn dataset_id(&self) -> String {
        format!("{}_{}_{}", self.condition, self.replicate, self.fraction)
    }

    pub fn cond_rep(&self) -> CondRep {
        CondRep {
            condition: self.condition.clone(),
            replicate: self.replicate.clone(),
        }
    }
}

impl fmt::Display for ReadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dataset_id())
    }
}

///////////////////////////////
/// Key of a DNA/RNA join: one replicate of one condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CondRep {
    pub condition: String,
    pub replicate: String,
}

impl fmt::Display for CondRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.condition, self.replicate)
    }
}

///////////////////////////////
/// FASTQ files backing one ReadUnit. The UMI read is absent in no-UMI mode
#[derive(Debug, Clone)]
pub struct UnitFiles {
    pub path_forward: PathBuf,
    pub path_reverse: PathBuf,
    pub path_umi: Option<PathBuf>,
}
