use std::io::Read;

use anyhow::Result;
use log::debug;
use seq_io::fastq::Reader as FastqReader;
use seq_io::fastq::Record as FastqRecord;

use super::revcomp_n;
use crate::runtime::MpraError;
use crate::unit::ReadUnit;

/// Upper bound on the required overlap, so that short barcodes still merge
pub const MAX_MIN_OVERLAP: usize = 11;

///////////////////////////////
/// Overlap merging parameters for one unit, derived from its read length
#[derive(Debug, Clone, PartialEq)]
pub struct MergeParams {
    pub read_length: usize,
    pub barcode_length: usize,
    pub rev_start: usize,
    pub min_overlap: usize,
    pub max_mismatch_fraction: f64,
}

impl MergeParams {
    ///////////////////////////////
    /// The reverse read starts right after the forward read in the concatenated fragment.
    /// Forward and reverse reads are assumed to share the same length
    pub fn from_read_length(
        read_length: usize,
        barcode_length: usize,
        max_mismatch_fraction: f64,
    ) -> MergeParams {
        MergeParams {
            read_length,
            barcode_length,
            rev_start: read_length,
            min_overlap: min_overlap(read_length, barcode_length),
            max_mismatch_fraction,
        }
    }
}

///////////////////////////////
/// min(F + F - L - 1, 11), never below 1
pub fn min_overlap(read_length: usize, barcode_length: usize) -> usize {
    let expected = 2 * read_length as i64 - barcode_length as i64 - 1;
    expected.min(MAX_MIN_OVERLAP as i64).max(1) as usize
}

///////////////////////////////
/// One sequencing fragment after merging: the barcode region and the UMI read, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub barcode: Vec<u8>,
    pub umi: Option<Vec<u8>>,
}

///////////////////////////////
/// Forward, reverse and UMI read laid end to end, as the merge operates on
#[derive(Debug, Clone)]
pub struct ConcatenatedFragment {
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub rev_start: usize,
    pub umi_start: Option<usize>,
}

impl ConcatenatedFragment {
    pub fn new(
        fwd: (&[u8], &[u8]),
        rev: (&[u8], &[u8]),
        umi: Option<&[u8]>,
    ) -> ConcatenatedFragment {
        let mut seq = Vec::with_capacity(fwd.0.len() + rev.0.len() + umi.map_or(0, |u| u.len()));
        let mut qual = Vec::with_capacity(seq.capacity());
        seq.extend_from_slice(fwd.0);
        qual.extend_from_slice(fwd.1);
        let rev_start = seq.len();
        seq.extend_from_slice(rev.0);
        qual.extend_from_slice(rev.1);

        let umi_start = umi.map(|u| {
            let start = seq.len();
            seq.extend_from_slice(u);
            start
        });
        //UMI qualities are not used but kept aligned with the sequence
        qual.resize(seq.len(), b'!');

        ConcatenatedFragment {
            seq,
            qual,
            rev_start,
            umi_start,
        }
    }

    ///////////////////////////////
    /// Merge the forward and reverse part. None if no overlap satisfies the constraints
    pub fn merge(&self, params: &MergeParams) -> Option<MergedRecord> {
        let rev_end = self.umi_start.unwrap_or(self.seq.len());
        let barcode = merge_pair(
            &self.seq[..self.rev_start],
            &self.qual[..self.rev_start],
            &self.seq[self.rev_start..rev_end],
            &self.qual[self.rev_start..rev_end],
            params,
        )?;
        Some(MergedRecord {
            barcode,
            umi: self.umi_start.map(|s| self.seq[s..].to_vec()),
        })
    }
}

///////////////////////////////
/// Where the reverse complement sits against the forward read. The compared region is
/// `fwd[fwd_start..fwd_start + overlap]` against `rev_rc[rev_start..rev_start + overlap]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Alignment {
    fwd_start: usize,
    rev_start: usize,
    overlap: usize,
    mismatches: usize,
}

impl Alignment {
    /// Reads longer than the fragment run into the adapter: the reverse complement then
    /// starts before the forward read, and only the overlap is kept
    fn is_overhang(&self) -> bool {
        self.rev_start > 0
    }

    fn merged_length(&self, fwd_len: usize, rev_len: usize) -> usize {
        if self.is_overhang() {
            self.overlap
        } else {
            fwd_len + rev_len - self.overlap
        }
    }
}

fn score_alignment(
    fwd_seq: &[u8],
    rev_rc: &[u8],
    fwd_start: usize,
    rev_start: usize,
    overlap: usize,
    max_mismatch_fraction: f64,
) -> Option<Alignment> {
    let mismatches = fwd_seq[fwd_start..fwd_start + overlap]
        .iter()
        .zip(rev_rc[rev_start..rev_start + overlap].iter())
        .filter(|&(&f, &r)| f != r && f != b'N' && r != b'N')
        .count();
    let allowed = (overlap as f64 * max_mismatch_fraction).floor() as usize;
    (mismatches <= allowed).then_some(Alignment {
        fwd_start,
        rev_start,
        overlap,
        mismatches,
    })
}

///////////////////////////////
/// Overlap-merge a read pair. The reverse read is given as sequenced, not complemented.
///
/// All overlaps of the forward suffix with the reverse complement prefix are tried, from
/// the full read length down to the minimum. When the reads are longer than the barcode,
/// alignments where the reverse complement starts before the forward read are tried as
/// well, and the merged sequence is trimmed to the overlap.
///
/// An overlap is only acceptable if its mismatches stay within the allowed fraction. The
/// one with the fewest mismatches wins, then the longer overlap, then the merged length
/// closest to the barcode length. In the overlap the consensus base is the one with
/// higher quality; a tie in quality gives N
pub fn merge_pair(
    fwd_seq: &[u8],
    fwd_qual: &[u8],
    rev_seq: &[u8],
    rev_qual: &[u8],
    params: &MergeParams,
) -> Option<Vec<u8>> {
    let rev_rc = revcomp_n(rev_seq);
    let rev_rc_qual: Vec<u8> = rev_qual.iter().rev().copied().collect();

    let max_overlap = fwd_seq.len().min(rev_rc.len());
    if params.min_overlap > max_overlap {
        return None;
    }

    let mut candidates = Vec::new();
    for overlap in (params.min_overlap..=max_overlap).rev() {
        candidates.extend(score_alignment(
            fwd_seq,
            &rev_rc,
            fwd_seq.len() - overlap,
            0,
            overlap,
            params.max_mismatch_fraction,
        ));
    }
    if fwd_seq.len() > params.barcode_length {
        for rev_start in 1..rev_rc.len() {
            let overlap = fwd_seq.len().min(rev_rc.len() - rev_start);
            if overlap < params.min_overlap {
                break;
            }
            candidates.extend(score_alignment(
                fwd_seq,
                &rev_rc,
                0,
                rev_start,
                overlap,
                params.max_mismatch_fraction,
            ));
        }
    }

    //min_by_key keeps the first of equal candidates
    let best = candidates.into_iter().min_by_key(|a| {
        (
            a.mismatches,
            std::cmp::Reverse(a.overlap),
            a.merged_length(fwd_seq.len(), rev_rc.len())
                .abs_diff(params.barcode_length),
        )
    })?;

    let mut merged = Vec::with_capacity(best.merged_length(fwd_seq.len(), rev_rc.len()));
    if !best.is_overhang() {
        merged.extend_from_slice(&fwd_seq[..best.fwd_start]);
    }
    for k in 0..best.overlap {
        let i = best.fwd_start + k;
        let j = best.rev_start + k;
        merged.push(consensus_base(
            fwd_seq[i],
            fwd_qual[i],
            rev_rc[j],
            rev_rc_qual[j],
        ));
    }
    if !best.is_overhang() {
        merged.extend_from_slice(&rev_rc[best.overlap..]);
    }
    Some(merged)
}

fn consensus_base(f: u8, fq: u8, r: u8, rq: u8) -> u8 {
    if f == r || r == b'N' {
        f
    } else if f == b'N' {
        r
    } else if fq > rq {
        f
    } else if rq > fq {
        r
    } else {
        b'N'
    }
}

///////////////////////////////
/// Tally of what happened to the read pairs of one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub read_pairs: u64,
    pub merged: u64,
    pub dropped_no_overlap: u64,
}

///////////////////////////////
/// Name of a read without comment and without /1, /2 or /3 mate suffix
fn read_name_stem(head: &[u8]) -> &[u8] {
    let name = head
        .split(|&b| b == b' ' || b == b'\t')
        .next()
        .unwrap_or(head);
    match name {
        [rest @ .., b'/', b'1' | b'2' | b'3'] => rest,
        _ => name,
    }
}

///////////////////////////////
/// Streams merged records out of the FASTQ files of one unit.
///
/// Read length is taken from the first forward read. Reads that do not merge are
/// counted in the stats and skipped; inconsistent input (unequal read lengths,
/// files of different length, mismatching read names) is an InputFormat error
pub struct ReadPairMerger<R: Read> {
    unit: ReadUnit,
    barcode_length: usize,
    max_mismatch_fraction: f64,
    reader_fwd: FastqReader<R>,
    reader_rev: FastqReader<R>,
    reader_umi: Option<FastqReader<R>>,
    params: Option<MergeParams>,
    umi_read_length: Option<usize>,
    stats: MergeStats,
}

impl<R: Read> ReadPairMerger<R> {
    pub fn new(
        unit: ReadUnit,
        barcode_length: usize,
        max_mismatch_fraction: f64,
        reader_fwd: FastqReader<R>,
        reader_rev: FastqReader<R>,
        reader_umi: Option<FastqReader<R>>,
    ) -> ReadPairMerger<R> {
        ReadPairMerger {
            unit,
            barcode_length,
            max_mismatch_fraction,
            reader_fwd,
            reader_rev,
            reader_umi,
            params: None,
            umi_read_length: None,
            stats: MergeStats::default(),
        }
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    ///////////////////////////////
    /// Next merged record. Ok(None) once all files are exhausted
    pub fn next_merged(&mut self) -> Result<Option<MergedRecord>> {
        loop {
            let rec_fwd = match self.reader_fwd.next() {
                Some(r) => r?,
                None => {
                    if self.reader_rev.next().is_some() {
                        return Err(MpraError::input_format(
                            self.unit.dataset_id(),
                            "reverse reads outnumber forward reads",
                        )
                        .into());
                    }
                    if let Some(reader_umi) = self.reader_umi.as_mut() {
                        if reader_umi.next().is_some() {
                            return Err(MpraError::input_format(
                                self.unit.dataset_id(),
                                "UMI reads outnumber forward reads",
                            )
                            .into());
                        }
                    }
                    return Ok(None);
                }
            };
            let rec_rev = match self.reader_rev.next() {
                Some(r) => r?,
                None => {
                    return Err(MpraError::input_format(
                        self.unit.dataset_id(),
                        "forward reads outnumber reverse reads",
                    )
                    .into())
                }
            };
            let rec_umi = match self.reader_umi.as_mut() {
                Some(reader_umi) => match reader_umi.next() {
                    Some(r) => Some(r?),
                    None => {
                        return Err(MpraError::input_format(
                            self.unit.dataset_id(),
                            "forward reads outnumber UMI reads",
                        )
                        .into())
                    }
                },
                None => None,
            };

            let name_fwd = read_name_stem(rec_fwd.head());
            if name_fwd != read_name_stem(rec_rev.head())
                || rec_umi
                    .as_ref()
                    .is_some_and(|u| name_fwd != read_name_stem(u.head()))
            {
                return Err(MpraError::input_format(
                    self.unit.dataset_id(),
                    format!(
                        "read names out of sync at {}",
                        String::from_utf8_lossy(name_fwd)
                    ),
                )
                .into());
            }

            //Read length is fixed by the first forward read
            let read_length = rec_fwd.seq().len();
            let params = self.params.get_or_insert_with(|| {
                debug!(
                    "{}: read length {}, minimum overlap {}",
                    self.unit,
                    read_length,
                    min_overlap(read_length, self.barcode_length)
                );
                MergeParams::from_read_length(
                    read_length,
                    self.barcode_length,
                    self.max_mismatch_fraction,
                )
            });
            if read_length != params.read_length || rec_rev.seq().len() != params.read_length {
                return Err(MpraError::input_format(
                    self.unit.dataset_id(),
                    format!(
                        "expected forward and reverse reads of length {}, got {} and {}",
                        params.read_length,
                        read_length,
                        rec_rev.seq().len()
                    ),
                )
                .into());
            }
            if let Some(rec_umi) = rec_umi.as_ref() {
                let umi_length = *self.umi_read_length.get_or_insert(rec_umi.seq().len());
                if rec_umi.seq().len() != umi_length {
                    return Err(MpraError::input_format(
                        self.unit.dataset_id(),
                        format!(
                            "expected UMI reads of length {}, got {}",
                            umi_length,
                            rec_umi.seq().len()
                        ),
                    )
                    .into());
                }
            }

            let fragment = ConcatenatedFragment::new(
                (rec_fwd.seq(), rec_fwd.qual()),
                (rec_rev.seq(), rec_rev.qual()),
                rec_umi.as_ref().map(|u| u.seq()),
            );

            self.stats.read_pairs += 1;
            match fragment.merge(params) {
                Some(merged) => {
                    self.stats.merged += 1;
                    return Ok(Some(merged));
                }
                None => {
                    self.stats.dropped_no_overlap += 1;
                }
            }
        }
    }
}

impl<R: Read> Iterator for ReadPairMerger<R> {
    type Item = Result<MergedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_merged().transpose()
    }
}
