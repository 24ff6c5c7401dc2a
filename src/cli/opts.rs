use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the genotyping tool.
#[derive(Debug, Parser)]
#[command(
    name = "lava",
    about = "Genotype known SNP sites from short sequencing reads",
    long_about = "Genotype known SNP sites from short sequencing reads.

EXAMPLES:
    $ lava dict hg19.fa snps.txt hg19.refdict hg19.snpdict
    $ lava lava hg19.refdict hg19.snpdict reads.fastq hg19.fa.chrlens calls.txt
    ",
    version = "0.1.0"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate the dictionary files (plus a `.chrlens` side file next to
    /// the reference)
    Dict {
        /// Input reference FASTA [path]
        ref_fasta: PathBuf,
        /// Input SNP catalog [path]
        snps: PathBuf,
        /// Output reference dictionary [path]
        out_ref_dict: PathBuf,
        /// Output SNP dictionary [path]
        out_snp_dict: PathBuf,
    },
    /// Perform genotyping
    Lava {
        /// Input reference dictionary [path]
        ref_dict: PathBuf,
        /// Input SNP dictionary [path]
        snp_dict: PathBuf,
        /// Input FASTQ reads [path]
        fastq: PathBuf,
        /// Chromosome-length file written by `dict` [path]
        chrlens: PathBuf,
        /// Output file; one line per alt or het call [path]
        out: PathBuf,
    },
}
