//! Nucleotide helpers shared by the catalog, matcher and alignment code

/// Map a nucleotide to its index in the `ACGTN` alphabet.
///
/// Anything outside `ACGT` (case-insensitive) collapses onto `N`.
#[inline]
pub fn nucleotide_index(nucleotide: u8) -> usize {
    match nucleotide.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

/// Get complement of a single nucleotide
pub fn complement_nucleotide(nucleotide: u8) -> u8 {
    match nucleotide.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => b'N',
    }
}

/// Reverse complement of a byte sequence
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|&nucleotide| complement_nucleotide(nucleotide))
        .collect()
}

/// Reverse complement of a string over `ACGTN`
pub fn reverse_complement_str(sequence: &str) -> String {
    // complement_nucleotide only ever yields ASCII
    reverse_complement(sequence.as_bytes())
        .into_iter()
        .map(char::from)
        .collect()
}

/// Uppercase a raw input sequence and fold every non-`ACGT` symbol to `N`.
pub fn normalize_sequence(raw: &str) -> String {
    raw.trim()
        .bytes()
        .map(|b| match b.to_ascii_uppercase() {
            c @ (b'A' | b'C' | b'G' | b'T') => char::from(c),
            _ => 'N',
        })
        .collect()
}

/// True if the k-mer only contains unambiguous bases
pub fn is_unambiguous(kmer: &[u8]) -> bool {
    kmer.iter().all(|&b| nucleotide_index(b) < 4)
}

/// Fraction of G/C bases across a set of sequences
pub fn gc_ratio<S: AsRef<str>>(sequences: &[S]) -> f64 {
    let mut gc = 0usize;
    let mut total = 0usize;
    for seq in sequences {
        for b in seq.as_ref().bytes() {
            if matches!(b, b'C' | b'G') {
                gc += 1;
            }
            total += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        gc as f64 / total as f64
    }
}

/// Every start offset of `pattern` in `text`, overlapping occurrences included.
pub fn find_all_occurrences(text: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || pattern.len() > text.len() {
        return Vec::new();
    }
    text.windows(pattern.len())
        .enumerate()
        .filter(|(_, window)| *window == pattern)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ATCG"), b"CGAT");
        assert_eq!(reverse_complement_str("AACN"), "NGTT");
    }

    #[test]
    fn test_normalize_sequence() {
        assert_eq!(normalize_sequence(" acgtRYn\n"), "ACGTNNN");
    }

    #[test]
    fn test_nucleotide_index() {
        assert_eq!(nucleotide_index(b'a'), 0);
        assert_eq!(nucleotide_index(b'T'), 3);
        assert_eq!(nucleotide_index(b'-'), 4);
    }

    #[test]
    fn test_gc_ratio() {
        assert!((gc_ratio(&["GGCC", "AATT"]) - 0.5).abs() < 1e-12);
        assert_eq!(gc_ratio::<&str>(&[]), 0.0);
    }

    #[test]
    fn test_find_all_occurrences_overlapping() {
        assert_eq!(find_all_occurrences(b"AAAAA", b"AAA"), vec![0, 1, 2]);
        assert!(find_all_occurrences(b"AC", b"ACGT").is_empty());
    }
}
