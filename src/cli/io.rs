//! Text-format collaborators: reference FASTA, SNP catalog, chrlens side
//! file. All of them fail early on malformed input; the core assumes
//! well-formed data.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bio::io::fasta;

use crate::lava::dictgen::{RefSeq, SnpRecord};
use crate::lava::output::ChromLengths;

/// chrlens file limits; kept tight so the file stays a fixed small table.
const MAX_CHROMS: usize = 128;
const MAX_CHROM_NAME: usize = 31;

/// Read every sequence of a reference FASTA, in file order.
pub fn read_fasta(path: &Path) -> Result<Vec<RefSeq>> {
    let reader =
        fasta::Reader::from_file(path).with_context(|| format!("opening FASTA {path:?}"))?;

    let mut seqs = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading FASTA record in {path:?}"))?;
        seqs.push(RefSeq {
            name: record.id().to_string(),
            seq: record.seq().to_vec(),
        });
    }
    if seqs.is_empty() {
        bail!("FASTA {path:?} contains no sequences");
    }
    Ok(seqs)
}

/// Parse the SNP catalog: whitespace-separated
/// `<chrom> <1-based-pos> <ref> <alt> <ref_freq> <alt_freq>` lines,
/// with `#` comments and blank lines skipped.
pub fn read_snps(path: &Path) -> Result<Vec<SnpRecord>> {
    let file = File::open(path).with_context(|| format!("opening SNP catalog {path:?}"))?;

    let mut snps = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading SNP catalog {path:?}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            bail!(
                "SNP catalog {path:?} line {}: expected 6 fields, found {}",
                lineno + 1,
                fields.len()
            );
        }

        let allele = |s: &str, what: &str| -> Result<u8> {
            let bytes = s.as_bytes();
            if bytes.len() != 1 {
                bail!(
                    "SNP catalog {path:?} line {}: {what} allele must be one base, got {s:?}",
                    lineno + 1
                );
            }
            Ok(bytes[0])
        };

        snps.push(SnpRecord {
            chrom: fields[0].to_string(),
            pos: fields[1].parse().with_context(|| {
                format!("SNP catalog {path:?} line {}: bad position", lineno + 1)
            })?,
            ref_allele: allele(fields[2], "ref")?,
            alt_allele: allele(fields[3], "alt")?,
            ref_freq: fields[4].parse().with_context(|| {
                format!("SNP catalog {path:?} line {}: bad ref frequency", lineno + 1)
            })?,
            alt_freq: fields[5].parse().with_context(|| {
                format!("SNP catalog {path:?} line {}: bad alt frequency", lineno + 1)
            })?,
        });
    }
    Ok(snps)
}

/// Write the `"<name> <length>"` chromosome list alongside the reference.
pub fn write_chrlens(path: &Path, seqs: &[RefSeq]) -> Result<()> {
    if seqs.len() > MAX_CHROMS {
        bail!("too many reference sequences for a chrlens file (max {MAX_CHROMS})");
    }

    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("creating chrlens file {path:?}"))?,
    );
    for seq in seqs {
        if seq.name.len() > MAX_CHROM_NAME {
            bail!(
                "sequence name {:?} is too long for a chrlens file (max {MAX_CHROM_NAME} chars)",
                seq.name
            );
        }
        writeln!(out, "{} {}", seq.name, seq.seq.len())
            .with_context(|| format!("writing chrlens file {path:?}"))?;
    }
    out.flush()
        .with_context(|| format!("writing chrlens file {path:?}"))?;
    Ok(())
}

/// Read a chrlens file back into the insertion-ordered lookup list.
pub fn read_chrlens(path: &Path) -> Result<ChromLengths> {
    let file = File::open(path).with_context(|| format!("opening chrlens file {path:?}"))?;

    let mut entries: Vec<(String, u64)> = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading chrlens file {path:?}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(name), Some(len)) = (fields.next(), fields.next()) else {
            bail!("chrlens file {path:?} line {}: malformed", lineno + 1);
        };
        if name.len() > MAX_CHROM_NAME {
            bail!(
                "chrlens file {path:?} line {}: name longer than {MAX_CHROM_NAME} chars",
                lineno + 1
            );
        }
        let len: u64 = len
            .parse()
            .with_context(|| format!("chrlens file {path:?} line {}: bad length", lineno + 1))?;
        entries.push((name.to_string(), len));

        if entries.len() > MAX_CHROMS {
            bail!("chrlens file {path:?} lists more than {MAX_CHROMS} chromosomes");
        }
    }
    Ok(ChromLengths::new(entries))
}
