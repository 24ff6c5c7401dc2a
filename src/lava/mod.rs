pub mod dict;
pub mod dictgen;
pub mod genotype;
pub mod index_table;
pub mod kmer_codec;
pub mod output;
pub mod pileup;
pub mod scanner;

/// Width of an aux-table row: the most positions a repeated k-mer may have
/// before it is written off as dispersed.
pub const AUX_TABLE_COLS: usize = 4;

/// Saturating upper bound on pileup counters. A single high-coverage
/// artifact cannot push a counter past this.
pub const MAX_COV: u8 = 64;

/// `pos` sentinel for k-mers occurring at too many positions to enumerate.
/// Entries carrying it are informational only; no vote is ever cast.
pub const POS_AMBIGUOUS: u32 = u32::MAX;

/// On-disk ambiguity flags. `FLAG_AMBIGUOUS` reinterprets the entry's
/// `pos` field as an aux-table row index.
pub const FLAG_UNAMBIGUOUS: u8 = 0;
pub const FLAG_AMBIGUOUS: u8 = 1;

/// Assumed per-base sequencing error rate of the genotype model.
pub const ERR_RATE: f64 = 0.01;

/// Expected per-locus depth; mean of the Poisson depth prior.
pub const AVG_COV: f64 = 30.0;
