/// Using the trick from https://doi.org/10.1101/082214 , extended to handle N.
/// Anything outside ATCG becomes N
pub fn revcomp_n(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&c| match c {
            b'A' | b'T' => c ^ 21,
            b'C' | b'G' => c ^ 4,
            _ => b'N',
        })
        .collect()
}

// C and G have their bit 2 set, whereas A and T do not
// C hex 43 bin 01000011
// G hex 47 bin 01000111
// A hex 41 bin 01000001
// T hex 54 bin 01010100
