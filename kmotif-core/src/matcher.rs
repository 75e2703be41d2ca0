//! Multi-pattern matching over a k-mer dictionary
//!
//! An Aho-Corasick automaton over the `ACGTN` alphabet. Construction is linear
//! in the total pattern length and a scan is linear in the text length plus
//! the number of matches. The automaton is an immutable value: when the
//! dictionary changes a new matcher is built and swapped in.

use std::collections::{BTreeSet, VecDeque};

use crate::dna::{nucleotide_index, reverse_complement};
use crate::types::Strand;

const ALPHABET: usize = 5;
const ROOT: u32 = 0;
const NONE: u32 = u32::MAX;

/// One occurrence of a dictionary pattern.
///
/// `start` is always the leftmost base in forward-strand coordinates; `strand`
/// is `Reverse` when it was the pattern's reverse complement that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternMatch {
    pub pattern: usize,
    pub start: usize,
    pub strand: Strand,
}

impl PatternMatch {
    /// Start of the occurrence in the coordinate frame of its own strand
    pub fn strand_start(&self, text_len: usize, pattern_len: usize) -> usize {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => text_len - self.start - pattern_len,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    pattern: usize,
    len: usize,
    strand: Strand,
}

#[derive(Debug, Clone)]
pub struct MultiPatternMatcher {
    transitions: Vec<[u32; ALPHABET]>,
    outputs: Vec<Vec<u32>>,
    entries: Vec<Entry>,
    lengths: Vec<usize>,
}

impl MultiPatternMatcher {
    /// Build over `patterns`; match ids are indices into the slice.
    pub fn new<S: AsRef<[u8]>>(patterns: &[S]) -> Self {
        let variants = patterns
            .iter()
            .enumerate()
            .map(|(id, p)| (id, p.as_ref().to_vec(), Strand::Forward));
        Self::build(patterns, variants)
    }

    /// Build over `patterns` plus each pattern's reverse complement as an
    /// explicit variant, so one forward scan covers both strands.
    pub fn with_reverse_complements<S: AsRef<[u8]>>(patterns: &[S]) -> Self {
        let mut variants = Vec::with_capacity(patterns.len() * 2);
        for (id, p) in patterns.iter().enumerate() {
            let fwd = p.as_ref().to_vec();
            let rc = reverse_complement(&fwd);
            let palindrome = rc == fwd;
            variants.push((id, fwd, Strand::Forward));
            if !palindrome {
                variants.push((id, rc, Strand::Reverse));
            }
        }
        Self::build(patterns, variants)
    }

    fn build<S, I>(patterns: &[S], variants: I) -> Self
    where
        S: AsRef<[u8]>,
        I: IntoIterator<Item = (usize, Vec<u8>, Strand)>,
    {
        let mut transitions = vec![[NONE; ALPHABET]];
        let mut outputs: Vec<Vec<u32>> = vec![Vec::new()];
        let mut entries = Vec::new();

        for (pattern, bytes, strand) in variants {
            if bytes.is_empty() {
                continue;
            }
            let mut state = ROOT as usize;
            for &b in &bytes {
                let c = nucleotide_index(b);
                if transitions[state][c] == NONE {
                    transitions.push([NONE; ALPHABET]);
                    outputs.push(Vec::new());
                    transitions[state][c] = (transitions.len() - 1) as u32;
                }
                state = transitions[state][c] as usize;
            }
            outputs[state].push(entries.len() as u32);
            entries.push(Entry {
                pattern,
                len: bytes.len(),
                strand,
            });
        }

        // Breadth-first failure links, folded directly into the transition
        // table so scanning never follows a failure pointer.
        let mut fail = vec![ROOT; transitions.len()];
        let mut queue = VecDeque::new();
        for c in 0..ALPHABET {
            let s = transitions[ROOT as usize][c];
            if s == NONE {
                transitions[ROOT as usize][c] = ROOT;
            } else {
                fail[s as usize] = ROOT;
                queue.push_back(s as usize);
            }
        }
        while let Some(r) = queue.pop_front() {
            for c in 0..ALPHABET {
                let s = transitions[r][c];
                let via_fail = transitions[fail[r] as usize][c];
                if s == NONE {
                    transitions[r][c] = via_fail;
                } else {
                    let s = s as usize;
                    fail[s] = via_fail;
                    let inherited = outputs[via_fail as usize].clone();
                    outputs[s].extend(inherited);
                    queue.push_back(s);
                }
            }
        }

        Self {
            transitions,
            outputs,
            entries,
            lengths: patterns.iter().map(|p| p.as_ref().len()).collect(),
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn pattern_len(&self, pattern: usize) -> usize {
        self.lengths[pattern]
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn scan<F: FnMut(&Entry, usize)>(&self, text: &[u8], mut on_match: F) {
        let mut state = ROOT as usize;
        for (i, &b) in text.iter().enumerate() {
            state = self.transitions[state][nucleotide_index(b)] as usize;
            for &e in &self.outputs[state] {
                let entry = &self.entries[e as usize];
                on_match(entry, i + 1 - entry.len);
            }
        }
    }

    /// All occurrences in a single forward pass over `text`
    pub fn find_all(&self, text: &[u8]) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        self.scan(text, |entry, start| {
            matches.push(PatternMatch {
                pattern: entry.pattern,
                start,
                strand: entry.strand,
            });
        });
        matches
    }

    /// Occurrences on both strands of `text`, in forward-strand coordinates.
    ///
    /// Scans `text` and its reverse complement; sorted and free of duplicates.
    pub fn find_both_strands(&self, text: &[u8]) -> Vec<PatternMatch> {
        let mut matches = self.find_all(text);
        let rc = reverse_complement(text);
        let n = text.len();
        self.scan(&rc, |entry, start| {
            matches.push(PatternMatch {
                pattern: entry.pattern,
                start: n - start - entry.len,
                strand: entry.strand.flip(),
            });
        });
        matches.sort_unstable();
        matches.dedup();
        matches
    }

    /// Distinct pattern ids present in `text`, optionally on either strand
    pub fn patterns_present(&self, text: &[u8], both_strands: bool) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        self.scan(text, |entry, _| {
            found.insert(entry.pattern);
        });
        if both_strands {
            self.scan(&reverse_complement(text), |entry, _| {
                found.insert(entry.pattern);
            });
        }
        found
    }
}
