#![allow(dead_code)]

//! Shared fixtures for the integration tests: a deterministic reference
//! generator and small writers for the three text inputs, plus a helper
//! that drives the whole dict → genotype pipeline inside a temp dir.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use lava::lava::dictgen::build_dicts;
use lava::lava::genotype::{genotype, GenotypeSummary};

/// Deterministic pseudo-random base sequence (xorshift64*). Distinct seeds
/// give unrelated sequences; 32-base windows of any reasonably sized
/// output are unique for all practical purposes.
pub fn random_seq(seed: u64, len: usize) -> Vec<u8> {
    let mut x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        let b = (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 62) as usize;
        out.push(b"ACGT"[b]);
    }
    out
}

/// A deterministic base different from `b`.
pub fn other_base(b: u8) -> u8 {
    match b {
        b'A' => b'G',
        b'G' => b'A',
        b'C' => b'T',
        _ => b'C',
    }
}

pub fn write_fasta(path: &Path, seqs: &[(&str, &[u8])]) {
    let mut f = File::create(path).unwrap();
    for (name, seq) in seqs {
        writeln!(f, ">{name}").unwrap();
        f.write_all(seq).unwrap();
        writeln!(f).unwrap();
    }
}

pub fn write_fastq(path: &Path, reads: &[Vec<u8>]) {
    let mut f = File::create(path).unwrap();
    for (i, read) in reads.iter().enumerate() {
        writeln!(f, "@read{i}").unwrap();
        f.write_all(read).unwrap();
        writeln!(f).unwrap();
        writeln!(f, "+").unwrap();
        writeln!(f, "{}", "I".repeat(read.len())).unwrap();
    }
}

pub fn snp_line(chrom: &str, pos: u64, ref_allele: u8, alt_allele: u8, p: f32, q: f32) -> String {
    format!(
        "{chrom} {pos} {} {} {p} {q}\n",
        ref_allele as char, alt_allele as char
    )
}

pub struct PipelineRun {
    pub summary: GenotypeSummary,
    /// Full text of the call output file.
    pub output: String,
    pub refdict: PathBuf,
    pub snpdict: PathBuf,
}

/// Write the inputs into `dir`, build both dictionaries, then genotype
/// `reads` against them.
pub fn run_pipeline(
    dir: &Path,
    seqs: &[(&str, &[u8])],
    snp_catalog: &str,
    reads: &[Vec<u8>],
) -> PipelineRun {
    let fasta = dir.join("ref.fa");
    let snps = dir.join("snps.txt");
    let refdict = dir.join("ref.dict");
    let snpdict = dir.join("snp.dict");
    let fastq = dir.join("reads.fq");
    let chrlens = dir.join("ref.fa.chrlens");
    let out = dir.join("calls.txt");

    write_fasta(&fasta, seqs);
    fs::write(&snps, snp_catalog).unwrap();
    build_dicts(&fasta, &snps, &refdict, &snpdict).unwrap();

    write_fastq(&fastq, reads);
    let summary = genotype(&refdict, &snpdict, &fastq, &chrlens, &out).unwrap();

    PipelineRun {
        summary,
        output: fs::read_to_string(&out).unwrap(),
        refdict,
        snpdict,
    }
}
