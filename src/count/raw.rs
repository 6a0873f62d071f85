use anyhow::Result;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::barcode::MergedRecord;
use crate::runtime::MpraError;

///////////////////////////////
/// How often one (barcode, UMI) combination was seen. UMI is None in no-UMI mode
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RawCountRecord {
    pub barcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umi: Option<String>,
    pub count: u64,
}

///////////////////////////////
/// Tallies merged records by barcode, or by (barcode, UMI) when a UMI length is set
pub struct RawCounter {
    umi_length: Option<usize>,
    counts: FxHashMap<(Vec<u8>, Option<Vec<u8>>), u64>,
    num_records: u64,
}

impl RawCounter {
    ///////////////////////////////
    /// Only the first `umi_length` bases of the UMI read make up the UMI
    pub fn new(umi_length: Option<usize>) -> RawCounter {
        RawCounter {
            umi_length,
            counts: FxHashMap::default(),
            num_records: 0,
        }
    }

    pub fn add(&mut self, record: MergedRecord) -> Result<()> {
        let umi = match self.umi_length {
            Some(umi_length) => {
                let mut umi = record.umi.ok_or_else(|| {
                    MpraError::input_format(
                        String::from_utf8_lossy(&record.barcode),
                        "merged record lacks a UMI",
                    )
                })?;
                umi.truncate(umi_length);
                Some(umi)
            }
            None => None,
        };
        *self.counts.entry((record.barcode, umi)).or_insert(0) += 1;
        self.num_records += 1;
        Ok(())
    }

    pub fn add_all<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<MergedRecord>>,
    {
        for record in records {
            self.add(record?)?;
        }
        Ok(())
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    ///////////////////////////////
    /// Counts sorted by barcode, then UMI
    pub fn into_records(self) -> Vec<RawCountRecord> {
        let mut records: Vec<RawCountRecord> = self
            .counts
            .into_iter()
            .map(|((barcode, umi), count)| RawCountRecord {
                barcode: String::from_utf8_lossy(&barcode).into_owned(),
                umi: umi.map(|u| String::from_utf8_lossy(&u).into_owned()),
                count,
            })
            .collect();
        records.sort_unstable();
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(barcode: &str, umi: Option<&str>) -> Result<MergedRecord> {
        Ok(MergedRecord {
            barcode: barcode.as_bytes().to_vec(),
            umi: umi.map(|u| u.as_bytes().to_vec()),
        })
    }

    #[test]
    fn test_count_without_umi() {
        let mut counter = RawCounter::new(None);
        counter
            .add_all(vec![
                rec("CCCC", None),
                rec("AAAA", None),
                rec("AAAA", None),
                rec("AAAA", None),
            ])
            .unwrap();
        assert_eq!(counter.num_records(), 4);
        assert_eq!(
            counter.into_records(),
            vec![
                RawCountRecord {
                    barcode: "AAAA".to_string(),
                    umi: None,
                    count: 3
                },
                RawCountRecord {
                    barcode: "CCCC".to_string(),
                    umi: None,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_count_with_truncated_umi() {
        let mut counter = RawCounter::new(Some(3));
        counter
            .add_all(vec![
                rec("AAAA", Some("GGGTT")),
                rec("AAAA", Some("GGGCC")),
                rec("AAAA", Some("CCCCC")),
            ])
            .unwrap();
        let records = counter.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].umi.as_deref(), Some("CCC"));
        assert_eq!(records[0].count, 1);
        assert_eq!(records[1].umi.as_deref(), Some("GGG"));
        assert_eq!(records[1].count, 2);
    }

    #[test]
    fn test_missing_umi_is_an_error() {
        let mut counter = RawCounter::new(Some(10));
        assert!(counter.add_all(vec![rec("AAAA", None)]).is_err());
    }
}
