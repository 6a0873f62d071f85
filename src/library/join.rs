use itertools::EitherOrBoth;
use itertools::Itertools;
use serde::Serialize;

use crate::count::FinalCountRecord;

///////////////////////////////
/// DNA and RNA count of one barcode within a (condition, replicate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedCountRow {
    pub barcode: String,
    pub dna_count: u64,
    pub rna_count: u64,
}

///////////////////////////////
/// Join DNA and RNA final counts on barcode. Both inputs must be sorted by barcode.
///
/// Intersect keeps barcodes seen in both; otherwise all barcodes are kept and the
/// missing side counts as 0. Output stays sorted by barcode
pub fn join_dna_rna(
    dna: &[FinalCountRecord],
    rna: &[FinalCountRecord],
    merge_intersect: bool,
) -> Vec<MergedCountRow> {
    dna.iter()
        .merge_join_by(rna.iter(), |d, r| d.barcode.cmp(&r.barcode))
        .filter_map(|pair| match pair {
            EitherOrBoth::Both(d, r) => Some(MergedCountRow {
                barcode: d.barcode.clone(),
                dna_count: d.count,
                rna_count: r.count,
            }),
            EitherOrBoth::Left(d) if !merge_intersect => Some(MergedCountRow {
                barcode: d.barcode.clone(),
                dna_count: d.count,
                rna_count: 0,
            }),
            EitherOrBoth::Right(r) if !merge_intersect => Some(MergedCountRow {
                barcode: r.barcode.clone(),
                dna_count: 0,
                rna_count: r.count,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    fn counts(list: &[(&str, u64)]) -> Vec<FinalCountRecord> {
        list.iter()
            .map(|(bc, cnt)| FinalCountRecord {
                barcode: bc.to_string(),
                count: *cnt,
            })
            .collect()
    }

    fn row(bc: &str, dna: u64, rna: u64) -> MergedCountRow {
        MergedCountRow {
            barcode: bc.to_string(),
            dna_count: dna,
            rna_count: rna,
        }
    }

    #[test]
    fn test_dna_only_barcode() {
        let dna = counts(&[("AAAA", 5)]);
        let rna = counts(&[]);
        assert!(join_dna_rna(&dna, &rna, true).is_empty());
        assert_eq!(join_dna_rna(&dna, &rna, false), vec![row("AAAA", 5, 0)]);
    }

    #[test]
    fn test_join_policy() {
        let dna = counts(&[("AAAA", 5), ("CCCC", 2), ("GGGG", 1)]);
        let rna = counts(&[("ACGT", 3), ("CCCC", 7), ("GGGG", 4), ("TTTT", 9)]);

        let inner = join_dna_rna(&dna, &rna, true);
        assert_eq!(inner, vec![row("CCCC", 2, 7), row("GGGG", 1, 4)]);

        let outer = join_dna_rna(&dna, &rna, false);
        assert_eq!(
            outer,
            vec![
                row("AAAA", 5, 0),
                row("ACGT", 0, 3),
                row("CCCC", 2, 7),
                row("GGGG", 1, 4),
                row("TTTT", 0, 9),
            ]
        );

        let dna_set: FxHashSet<&str> = dna.iter().map(|r| r.barcode.as_str()).collect();
        let rna_set: FxHashSet<&str> = rna.iter().map(|r| r.barcode.as_str()).collect();
        let outer_set: FxHashSet<&str> = outer.iter().map(|r| r.barcode.as_str()).collect();
        let inner_set: FxHashSet<&str> = inner.iter().map(|r| r.barcode.as_str()).collect();
        assert_eq!(outer_set, dna_set.union(&rna_set).copied().collect());
        assert_eq!(inner_set, dna_set.intersection(&rna_set).copied().collect());
    }
}
