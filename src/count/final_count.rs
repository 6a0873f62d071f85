use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::FilteredCounts;

///////////////////////////////
/// Abundance of one barcode in one unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FinalCountRecord {
    pub barcode: String,
    pub count: u64,
}

///////////////////////////////
/// Collapse filtered counts to one count per barcode.
///
/// With UMIs the count is the number of distinct UMIs seen with the barcode, which removes
/// PCR duplicates. Without UMIs it is the number of times the barcode was seen.
/// Input is sorted by barcode, and so is the output
pub fn final_counts(filtered: &FilteredCounts, use_umi: bool) -> Vec<FinalCountRecord> {
    filtered
        .records()
        .iter()
        .chunk_by(|r| r.barcode.as_str())
        .into_iter()
        .map(|(barcode, group)| {
            let count = if use_umi {
                group.filter_map(|r| r.umi.as_deref()).unique().count() as u64
            } else {
                group.map(|r| r.count).sum()
            };
            FinalCountRecord {
                barcode: barcode.to_string(),
                count,
            }
        })
        .collect()
}

///////////////////////////////
/// The `n` UMIs shared by most barcodes. QC only; ties go in UMI order
pub fn top_umis(filtered: &FilteredCounts, n: usize) -> Vec<(String, u64)> {
    let mut per_umi: FxHashMap<&str, u64> = FxHashMap::default();
    for umi in filtered.records().iter().filter_map(|r| r.umi.as_deref()) {
        *per_umi.entry(umi).or_insert(0) += 1;
    }
    per_umi
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .take(n)
        .map(|(umi, cnt)| (umi.to_string(), cnt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count::{filter_by_length, RawCountRecord};

    fn raw(barcode: &str, umi: Option<&str>, count: u64) -> RawCountRecord {
        RawCountRecord {
            barcode: barcode.to_string(),
            umi: umi.map(String::from),
            count,
        }
    }

    fn final_rec(barcode: &str, count: u64) -> FinalCountRecord {
        FinalCountRecord {
            barcode: barcode.to_string(),
            count,
        }
    }

    #[test]
    fn test_no_umi_counts_pass_through() {
        let (filtered, _) = filter_by_length(vec![raw("AAAA", None, 3), raw("CCCC", None, 1)], 4);
        assert_eq!(
            final_counts(&filtered, false),
            vec![final_rec("AAAA", 3), final_rec("CCCC", 1)]
        );
    }

    #[test]
    fn test_umi_counts_distinct_umis() {
        //AAAA seen with U1 twice and U2 once: two molecules, not three
        let (filtered, _) = filter_by_length(
            vec![raw("AAAA", Some("U1"), 2), raw("AAAA", Some("U2"), 1)],
            4,
        );
        assert_eq!(final_counts(&filtered, true), vec![final_rec("AAAA", 2)]);
    }

    #[test]
    fn test_umi_dedup_property() {
        let records = vec![
            raw("AAAA", Some("ACG"), 10),
            raw("AAAA", Some("GGT"), 1),
            raw("AAAA", Some("TTT"), 4),
            raw("CCCC", Some("ACG"), 1),
            raw("GGGG", Some("AAA"), 100),
        ];
        let (filtered, _) = filter_by_length(records, 4);
        let counts = final_counts(&filtered, true);
        assert_eq!(
            counts,
            vec![
                final_rec("AAAA", 3),
                final_rec("CCCC", 1),
                final_rec("GGGG", 1)
            ]
        );

        //Without UMIs, the raw occurrences are summed
        let counts = final_counts(&filtered, false);
        assert_eq!(counts[0], final_rec("AAAA", 15));
    }

    #[test]
    fn test_top_umis() {
        let records = vec![
            raw("AAAA", Some("ACG"), 1),
            raw("CCCC", Some("ACG"), 1),
            raw("GGGG", Some("ACG"), 1),
            raw("AAAA", Some("TTT"), 50),
            raw("CCCC", Some("TTT"), 1),
            raw("GGGG", Some("GGG"), 1),
        ];
        let (filtered, _) = filter_by_length(records, 4);
        assert_eq!(
            top_umis(&filtered, 2),
            vec![("ACG".to_string(), 3), ("TTT".to_string(), 2)]
        );
        assert!(top_umis(&FilteredCounts::default(), 5).is_empty());
    }
}
