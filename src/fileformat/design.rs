use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use rustc_hash::FxHashSet;
use seq_io::fasta::Record as FastaRecord;

use super::open_fasta;
use crate::runtime::MpraError;

///////////////////////////////
/// Names of the designed inserts, taken from the design FASTA
#[derive(Debug, Clone, Default)]
pub struct Design {
    inserts: FxHashSet<String>,
}

impl Design {
    pub fn read(p: &Path) -> Result<Design> {
        let mut reader = open_fasta(p)?;
        let mut design = Design::default();
        while let Some(record) = reader.next() {
            let record = record?;
            let name = record
                .id()
                .map_err(|e| MpraError::file_not_valid(p, Some(e.to_string())))?;
            if !design.inserts.insert(name.to_string()) {
                warn!("Insert {} appears more than once in the design file", name);
            }
        }
        if design.inserts.is_empty() {
            return Err(MpraError::file_not_valid(p, Some("no sequences in design file")).into());
        }
        info!("Read {} designed inserts", design.inserts.len());
        Ok(design)
    }

    pub fn from_names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Design {
        Design {
            inserts: names.into_iter().map(|s| s.into()).collect(),
        }
    }

    pub fn contains(&self, insert: &str) -> bool {
        self.inserts.contains(insert)
    }

    pub fn len(&self) -> usize {
        self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_design() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("design.fa");
        std::fs::write(&p, ">enh1 some description\nACGT\nACGT\n>enh2\nGGGG\n").unwrap();
        let design = Design::read(&p).unwrap();
        assert_eq!(design.len(), 2);
        assert!(design.contains("enh1"));
        assert!(design.contains("enh2"));
        assert!(!design.contains("enh3"));
    }

    #[test]
    fn test_empty_design() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("design.fa");
        std::fs::write(&p, "").unwrap();
        assert!(Design::read(&p).is_err());
    }
}
