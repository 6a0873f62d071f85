use super::RawCountRecord;

///////////////////////////////
/// True for anything outside ATCG
#[inline(always)]
pub fn is_ambiguous_base(b: u8) -> bool {
    !matches!(b, b'A' | b'C' | b'G' | b'T')
}

///////////////////////////////
/// Raw counts whose barcode has the configured length and only unambiguous bases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredCounts {
    records: Vec<RawCountRecord>,
}

impl FilteredCounts {
    pub fn records(&self) -> &[RawCountRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

///////////////////////////////
/// Records removed by the length filter, by reason. Ambiguity is checked first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub ambiguous: u64,
    pub wrong_length: u64,
}

///////////////////////////////
/// Drop barcodes with an ambiguous base or a length other than `barcode_length`.
/// Order is preserved; an empty result is fine
pub fn filter_by_length(
    records: Vec<RawCountRecord>,
    barcode_length: usize,
) -> (FilteredCounts, FilterStats) {
    let mut stats = FilterStats::default();
    let records = records
        .into_iter()
        .filter(|r| {
            if r.barcode.bytes().any(is_ambiguous_base) {
                stats.ambiguous += 1;
                false
            } else if r.barcode.len() != barcode_length {
                stats.wrong_length += 1;
                false
            } else {
                true
            }
        })
        .collect();
    (FilteredCounts { records }, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(barcode: &str, count: u64) -> RawCountRecord {
        RawCountRecord {
            barcode: barcode.to_string(),
            umi: None,
            count,
        }
    }

    #[test]
    fn test_ambiguous_barcode_dropped() {
        let (filtered, stats) = filter_by_length(vec![raw("AAAN", 5), raw("ACGT", 2)], 4);
        assert_eq!(filtered.records(), &[raw("ACGT", 2)]);
        assert_eq!(stats.ambiguous, 1);
        assert_eq!(stats.wrong_length, 0);
    }

    #[test]
    fn test_filter_correctness() {
        let input = vec![
            raw("AAAA", 1),
            raw("AAA", 1),
            raw("AAAAA", 1),
            raw("ANA", 1),
            raw("CGTA", 7),
            raw("", 1),
        ];
        let (filtered, stats) = filter_by_length(input.clone(), 4);

        for r in filtered.records() {
            assert_eq!(r.barcode.len(), 4);
            assert!(!r.barcode.bytes().any(is_ambiguous_base));
        }
        for r in input.iter().filter(|r| !filtered.records().contains(r)) {
            assert!(r.barcode.len() != 4 || r.barcode.bytes().any(is_ambiguous_base));
        }
        assert_eq!(filtered.records(), &[raw("AAAA", 1), raw("CGTA", 7)]);
        assert_eq!(stats.ambiguous + stats.wrong_length, 4);
    }

    #[test]
    fn test_empty_result() {
        let (filtered, _) = filter_by_length(vec![raw("NNNN", 3)], 4);
        assert!(filtered.is_empty());
    }
}
