use std::path::Path;

use anyhow::Result;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::open_maybe_compressed;
use super::Design;
use crate::runtime::MpraError;

///////////////////////////////
/// What happened to the entries of the association file while loading it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationLoadStats {
    pub entries: u64,
    pub ambiguous_barcodes: u64,
    pub wrong_length: u64,
    pub not_in_design: u64,
}

#[derive(Debug, Deserialize)]
struct AssociationRow {
    barcode: String,
    insert: String,
    #[serde(default)]
    group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedInsert {
    pub insert: String,
    pub group: Option<String>,
}

///////////////////////////////
/// Barcode to designed insert. Read-only once loaded, shared by all joins of a run.
///
/// A barcode assigned to more than one insert is ambiguous and left out
#[derive(Debug, Clone, Default)]
pub struct AssociationMap {
    map: FxHashMap<String, AssociatedInsert>,
    stats: AssociationLoadStats,
}

impl AssociationMap {
    ///////////////////////////////
    /// Read `barcode<TAB>insert[<TAB>group]` lines, possibly compressed. # starts a comment
    pub fn read(p: &Path, design: &Design, barcode_length: usize) -> Result<AssociationMap> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(open_maybe_compressed(p)?);
        let mut entries = Vec::new();
        for result in reader.deserialize() {
            let row: AssociationRow = result.map_err(|e| {
                MpraError::file_not_valid(
                    p,
                    Some(format!("expected barcode and insert columns: {}", e)),
                )
            })?;
            entries.push((
                row.barcode,
                row.insert,
                row.group.filter(|g| !g.is_empty()),
            ));
        }
        let map = AssociationMap::from_entries(entries, design, barcode_length);
        info!(
            "Association map: {} barcodes from {} entries ({} ambiguous, {} wrong length, {} not in design)",
            map.len(),
            map.stats.entries,
            map.stats.ambiguous_barcodes,
            map.stats.wrong_length,
            map.stats.not_in_design
        );
        Ok(map)
    }

    ///////////////////////////////
    /// Build from (barcode, insert, group) entries
    pub fn from_entries<I>(entries: I, design: &Design, barcode_length: usize) -> AssociationMap
    where
        I: IntoIterator<Item = (String, String, Option<String>)>,
    {
        let mut stats = AssociationLoadStats::default();
        //None marks a barcode seen with conflicting inserts
        let mut candidates: FxHashMap<String, Option<AssociatedInsert>> = FxHashMap::default();
        for (barcode, insert, group) in entries {
            stats.entries += 1;
            if barcode.len() != barcode_length {
                stats.wrong_length += 1;
                continue;
            }
            if !design.contains(&insert) {
                debug!("Insert {} of barcode {} is not in the design", insert, barcode);
                stats.not_in_design += 1;
                continue;
            }
            let entry = candidates
                .entry(barcode)
                .or_insert_with(|| Some(AssociatedInsert {
                    insert: insert.clone(),
                    group: group.clone(),
                }));
            if entry.as_ref().is_some_and(|a| a.insert != insert) {
                *entry = None;
            }
        }

        let mut map = FxHashMap::default();
        for (barcode, assoc) in candidates {
            match assoc {
                Some(assoc) => {
                    map.insert(barcode, assoc);
                }
                None => stats.ambiguous_barcodes += 1,
            }
        }
        AssociationMap { map, stats }
    }

    pub fn get(&self, barcode: &str) -> Option<&AssociatedInsert> {
        self.map.get(barcode)
    }

    pub fn insert_for(&self, barcode: &str) -> Option<&str> {
        self.map.get(barcode).map(|a| a.insert.as_str())
    }

    pub fn stats(&self) -> &AssociationLoadStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bc: &str, insert: &str) -> (String, String, Option<String>) {
        (bc.to_string(), insert.to_string(), None)
    }

    #[test]
    fn test_ambiguous_and_invalid_entries() {
        let design = Design::from_names(["enh1", "enh2"]);
        let map = AssociationMap::from_entries(
            vec![
                entry("AAAA", "enh1"),
                entry("AAAA", "enh1"),
                entry("CCCC", "enh1"),
                entry("CCCC", "enh2"),
                entry("GGG", "enh1"),
                entry("TTTT", "enh3"),
            ],
            &design,
            4,
        );
        assert_eq!(map.insert_for("AAAA"), Some("enh1"));
        assert_eq!(map.insert_for("CCCC"), None);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.stats(),
            &AssociationLoadStats {
                entries: 6,
                ambiguous_barcodes: 1,
                wrong_length: 1,
                not_in_design: 1
            }
        );
    }

    #[test]
    fn test_read_association_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("assoc.tsv");
        std::fs::write(&p, "# barcode\tinsert\nAAAA\tenh1\tcontrol\nCCCC\tenh2\n\n").unwrap();
        let design = Design::from_names(["enh1", "enh2"]);
        let map = AssociationMap::read(&p, &design, 4).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("AAAA").unwrap().group.as_deref(), Some("control"));
        assert_eq!(map.get("CCCC").unwrap().group, None);
    }

    #[test]
    fn test_read_compressed_association_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("assoc.tsv.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&p).unwrap(),
            flate2::Compression::default(),
        );
        encoder
            .write_all(b"AAAA\tenh1\t\nCCCC\tenh1\tcontrol\nCCCC\tenh2\nGGGG\tenh2\tneg\n")
            .unwrap();
        encoder.finish().unwrap();

        let design = Design::from_names(["enh1", "enh2"]);
        let map = AssociationMap::read(&p, &design, 4).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("AAAA").unwrap().group, None);
        assert_eq!(map.get("GGGG").unwrap().group.as_deref(), Some("neg"));
        assert_eq!(map.stats().ambiguous_barcodes, 1);
    }

    #[test]
    fn test_malformed_association_line() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("assoc.tsv");
        std::fs::write(&p, "AAAA enh1\n").unwrap();
        let design = Design::from_names(["enh1"]);
        let e = AssociationMap::read(&p, &design, 4).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<MpraError>(),
            Some(MpraError::FileNotValid { .. })
        ));
    }
}
