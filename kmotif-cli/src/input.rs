//! Sequence, event and region file readers

use kmotif_core::dna::normalize_sequence;
use kmotif_core::{Event, InMemoryProvider, Region};
use needletail::parse_fastx_file;
use std::path::Path;

use crate::error::{CliError, CliResult};

fn is_fastx(path: &Path) -> CliResult<bool> {
    let content = std::fs::read(path)?;
    let first = content
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .copied();
    // gzip magic, or a FASTA/FASTQ header
    Ok(content.starts_with(&[0x1f, 0x8b]) || matches!(first, Some(b'>') | Some(b'@')))
}

/// Named sequences from a FASTA/FASTQ file (gzip is detected by needletail)
pub fn read_fastx(path: &Path) -> CliResult<Vec<(String, String)>> {
    let mut reader = parse_fastx_file(path)
        .map_err(|e| CliError::parse(path.display().to_string(), e.to_string()))?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record =
            record.map_err(|e| CliError::parse(path.display().to_string(), e.to_string()))?;
        let id = String::from_utf8_lossy(record.id()).to_string();
        let name = id.split_whitespace().next().unwrap_or_default().to_string();
        let seq = normalize_sequence(&String::from_utf8_lossy(&record.seq()));
        records.push((name, seq));
    }
    Ok(records)
}

/// Sequences from a FASTA/FASTQ file or from a plain file holding one
/// sequence per line. Blank lines and `#` comments are skipped.
pub fn read_sequences(path: &Path) -> CliResult<Vec<String>> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    let sequences: Vec<String> = if is_fastx(path)? {
        read_fastx(path)?.into_iter().map(|(_, seq)| seq).collect()
    } else {
        std::fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(normalize_sequence)
            .collect()
    };
    if sequences.is_empty() {
        return Err(CliError::empty_input(path.to_path_buf()));
    }
    log::info!("Read {} sequences from {}", sequences.len(), path.display());
    Ok(sequences)
}

/// Whole-genome provider from a FASTA file
pub fn read_genome(path: &Path) -> CliResult<InMemoryProvider> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    let mut provider = InMemoryProvider::new();
    let records = read_fastx(path)?;
    if records.is_empty() {
        return Err(CliError::empty_input(path.to_path_buf()));
    }
    log::info!("Loaded {} chromosomes from {}", records.len(), path.display());
    for (name, seq) in records {
        provider.insert(name, &seq);
    }
    Ok(provider)
}

fn split_chrom<'a>(line: &'a str, file: &Path) -> CliResult<(&'a str, &'a str)> {
    line.rsplit_once(':').ok_or_else(|| {
        CliError::parse(file.display().to_string(), format!("missing ':' in \"{}\"", line))
    })
}

fn parse_coordinate(value: &str, line: &str, file: &Path) -> CliResult<usize> {
    value.trim().replace(',', "").parse().map_err(|_| {
        CliError::parse(
            file.display().to_string(),
            format!("invalid coordinate \"{}\" in \"{}\"", value, line),
        )
    })
}

fn data_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Parse `chrom:position` lines
pub fn parse_events(content: &str, file: &Path) -> CliResult<Vec<Event>> {
    data_lines(content)
        .map(|line| {
            let (chrom, pos) = split_chrom(line, file)?;
            Ok(Event::new(chrom, parse_coordinate(pos, line, file)?))
        })
        .collect()
}

/// Parse `chrom:start-end` lines
pub fn parse_regions(content: &str, file: &Path) -> CliResult<Vec<Region>> {
    data_lines(content)
        .map(|line| {
            let (chrom, range) = split_chrom(line, file)?;
            let (start, end) = range.split_once('-').ok_or_else(|| {
                CliError::parse(file.display().to_string(), format!("missing '-' in \"{}\"", line))
            })?;
            let start = parse_coordinate(start, line, file)?;
            let end = parse_coordinate(end, line, file)?;
            if start > end {
                return Err(CliError::parse(
                    file.display().to_string(),
                    format!("region start after end in \"{}\"", line),
                ));
            }
            Ok(Region::new(chrom, start, end))
        })
        .collect()
}

pub fn read_events(path: &Path) -> CliResult<Vec<Event>> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    parse_events(&std::fs::read_to_string(path)?, path)
}

pub fn read_regions(path: &Path) -> CliResult<Vec<Region>> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    parse_regions(&std::fs::read_to_string(path)?, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plain_lines() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "# peaks\nacgtNN\n\n  GGATTACA  ").expect("write");
        let seqs = read_sequences(file.path()).expect("read");
        assert_eq!(seqs, vec!["ACGTNN", "GGATTACA"]);
    }

    #[test]
    fn test_fasta_records() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, ">s1 first\nACGT\nacgt\n>s2\nGGRA").expect("write");
        let seqs = read_sequences(file.path()).expect("read");
        assert_eq!(seqs, vec!["ACGTACGT", "GGNA"]);

        let records = read_fastx(file.path()).expect("records");
        assert_eq!(records[0].0, "s1");
    }

    #[test]
    fn test_missing_and_empty_files() {
        let missing = read_sequences(Path::new("/nonexistent/peaks.txt"));
        assert!(matches!(missing, Err(CliError::FileNotFound { .. })));

        let file = NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "# nothing\n").expect("write");
        assert!(matches!(read_sequences(file.path()), Err(CliError::EmptyInput { .. })));
    }

    #[test]
    fn test_events_and_regions() {
        let file = Path::new("events.txt");
        let events = parse_events("chr1:1,200\n# comment\nchrX:5\n", file).expect("events");
        assert_eq!(events, vec![Event::new("chr1", 1200), Event::new("chrX", 5)]);

        let regions = parse_regions("chr2:10-20\n", file).expect("regions");
        assert_eq!(regions, vec![Region::new("chr2", 10, 20)]);

        assert!(parse_events("chr1-5", file).is_err());
        assert!(parse_regions("chr1:20-10", file).is_err());
        assert!(parse_regions("chr1:abc-10", file).is_err());
    }

    #[test]
    fn test_genome_provider() {
        use kmotif_core::SequenceProvider;

        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, ">chr1 test\nACGTACGTAC\n>chr2\nTTTT").expect("write");
        let provider = read_genome(file.path()).expect("genome");
        assert_eq!(provider.fetch(&Region::new("chr1", 2, 5)).expect("fetch"), "GTAC");
        assert!(provider.fetch(&Region::new("chr3", 0, 1)).is_err());
    }
}
