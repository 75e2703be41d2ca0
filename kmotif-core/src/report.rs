//! Plain tab-delimited reports
//!
//! Writers take any [`Write`] sink; the `*_string` helpers render to memory.

use std::io::{self, Write};

use crate::align::KmerCluster;
use crate::dna::reverse_complement_str;
use crate::threshold::ThresholdReport;
use crate::types::{Kmer, Strand};

/// Ranked k-mer table: k-mer, foreground hits, background hits, log10 p
pub fn write_kmers<W: Write>(out: &mut W, kmers: &[Kmer]) -> io::Result<()> {
    writeln!(out, "#kmer\tfg_hits\tbg_hits\tlog10_hgp")?;
    for km in kmers {
        writeln!(
            out,
            "{}\t{}\t{}\t{:.2}",
            km.as_str(),
            km.pos_hit_count(),
            km.neg_hit_count(),
            km.hgp()
        )?;
    }
    Ok(())
}

/// Aligned k-mers of a cluster with their shift and orientation
pub fn write_cluster_kmers<W: Write>(out: &mut W, cluster: &KmerCluster) -> io::Result<()> {
    writeln!(out, "#kmer\tshift\tstrand\tfg_hits\tbg_hits\tlog10_hgp")?;
    for km in &cluster.kmers {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{:.2}",
            km.pattern(),
            km.shift,
            km.strand.as_char(),
            km.pos_hit_count(),
            km.neg_hit_count(),
            km.hgp()
        )?;
    }
    Ok(())
}

/// Aligned sequences, each left-padded with `.` so aligned sites line up.
///
/// Columns: sequence id, score, offset, strand, padded sequence. Unaligned
/// sequences are left out.
pub fn write_aligned<W: Write, S: AsRef<str>>(
    out: &mut W,
    cluster: &KmerCluster,
    sequences: &[S],
) -> io::Result<()> {
    let Some(leftmost) = cluster.leftmost() else {
        return Ok(());
    };
    for placement in &cluster.placements {
        let (Some(pos), Some(seq)) = (placement.position, sequences.get(placement.id)) else {
            continue;
        };
        let oriented = match placement.strand {
            Strand::Forward => seq.as_ref().to_string(),
            Strand::Reverse => reverse_complement_str(seq.as_ref()),
        };
        let padding = ".".repeat((pos - leftmost) as usize);
        writeln!(
            out,
            "{}\t{:.1}\t{}\t{}\t{}{}",
            placement.id,
            placement.score,
            pos,
            placement.strand.as_char(),
            padding,
            oriented
        )?;
    }
    Ok(())
}

/// Threshold table: index, score, fg >= score, bg >= score, log10 p
pub fn write_threshold<W: Write>(out: &mut W, report: &ThresholdReport) -> io::Result<()> {
    for (i, row) in report.rows.iter().enumerate() {
        writeln!(
            out,
            "{}\t{:.3}\t{}\t{}\t{:.1}",
            i, row.score, row.pos_hit, row.neg_hit, row.hgp
        )?;
    }
    Ok(())
}

fn render<F>(write: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let mut buf = Vec::new();
    // writes into a Vec never fail
    let _ = write(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn kmers_string(kmers: &[Kmer]) -> String {
    render(|buf| write_kmers(buf, kmers))
}

pub fn aligned_string<S: AsRef<str>>(cluster: &KmerCluster, sequences: &[S]) -> String {
    render(|buf| write_aligned(buf, cluster, sequences))
}

pub fn threshold_string(report: &ThresholdReport) -> String {
    render(|buf| write_threshold(buf, report))
}
