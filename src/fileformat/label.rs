use std::path::Path;

use anyhow::Result;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::runtime::DEFAULT_LABEL;

#[derive(Debug, Deserialize)]
struct LabelRow {
    insert: String,
    label: String,
}

///////////////////////////////
/// Insert to label. Inserts not listed, or all inserts without a label file, get the default label
#[derive(Debug, Clone, Default)]
pub struct Labels {
    map: FxHashMap<String, String>,
}

impl Labels {
    pub fn read(p: &Path) -> Result<Labels> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .from_path(p)?;
        let mut labels = Labels::default();
        for result in reader.deserialize() {
            let row: LabelRow = result?;
            labels.map.insert(row.insert, row.label);
        }
        Ok(labels)
    }

    ///////////////////////////////
    /// Label file first, then the fallback (group from the association), then the default
    pub fn label_for<'a>(&'a self, insert: &str, fallback: Option<&'a str>) -> &'a str {
        self.map
            .get(insert)
            .map(|s| s.as_str())
            .or(fallback)
            .unwrap_or(DEFAULT_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("labels.tsv");
        std::fs::write(&p, "enh1\tpositive\nenh2\tnegative\n").unwrap();
        let labels = Labels::read(&p).unwrap();
        assert_eq!(labels.label_for("enh1", None), "positive");
        assert_eq!(labels.label_for("enh2", Some("group")), "negative");
        assert_eq!(labels.label_for("enh3", Some("group")), "group");
        assert_eq!(labels.label_for("enh3", None), "NA");
        assert_eq!(Labels::default().label_for("enh1", None), "NA");
    }
}
