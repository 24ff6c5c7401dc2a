//! Genotype calling and the genotyping pipeline.
//!
//! The model follows a fixed per-base error rate: conditioned on the true
//! genotype, each observed allele at a site is an independent draw, so the
//! three likelihoods over (ref_cnt, alt_cnt) form a small grid that is
//! precomputed once per run. Priors are Hardy–Weinberg from the catalog
//! allele frequencies, and the reported confidence is the normalized joint
//! probability damped by a Poisson depth prior at AVG_COV.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use bio::io::fastq;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::counters::{CallCounters, ScanCounters};
use crate::cli::io::read_chrlens;
use crate::lava::dict::{RefDict, SnpDict};
use crate::lava::output::write_calls;
use crate::lava::pileup::PileupTable;
use crate::lava::scanner::ReadScanner;
use crate::lava::{AVG_COV, ERR_RATE, MAX_COV};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype {
    /// No call: zero coverage, or both counters saturated.
    None,
    /// Homozygous reference.
    Ref,
    /// Heterozygous.
    Het,
    /// Homozygous alternate.
    Alt,
}

#[derive(Debug, Clone, Copy)]
pub struct Call {
    pub genotype: Genotype,
    pub confidence: f64,
}

/// Precomputed likelihood grid and Poisson depth prior.
///
/// Built once per run before the call loop and read-only afterwards, so a
/// future parallel caller could share it freely.
pub struct GenotypeModel {
    /// `(MAX_COV+1)²` triples of P(counts|G₀), P(counts|G₁), P(counts|G₂),
    /// row-major by ref count. The binomial coefficient is omitted: it is
    /// common to all three and cancels in the normalization.
    cache: Vec<[f32; 3]>,
    /// Poisson(n; AVG_COV) for n in 0..=2·MAX_COV.
    poisson: Vec<f64>,
}

impl Default for GenotypeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenotypeModel {
    pub fn new() -> Self {
        let n = MAX_COV as usize + 1;
        let mut cache = vec![[0.0f32; 3]; n * n];
        for ref_cnt in 0..n {
            for alt_cnt in 0..n {
                let g0 = (1.0 - ERR_RATE).powi(ref_cnt as i32) * ERR_RATE.powi(alt_cnt as i32);
                let g1 = 0.5f64.powi((ref_cnt + alt_cnt) as i32);
                let g2 = ERR_RATE.powi(ref_cnt as i32) * (1.0 - ERR_RATE).powi(alt_cnt as i32);
                cache[ref_cnt * n + alt_cnt] = [g0 as f32, g1 as f32, g2 as f32];
            }
        }

        let mut poisson = vec![0.0f64; 2 * MAX_COV as usize + 1];
        poisson[0] = (-AVG_COV).exp();
        for i in 1..poisson.len() {
            poisson[i] = poisson[i - 1] * AVG_COV / i as f64;
        }

        GenotypeModel { cache, poisson }
    }

    /// Most likely genotype for one site.
    ///
    /// Ties deliberately fall through toward the hom-alt branch: every
    /// comparison is strict, mirroring the argmax order G₀, G₁, G₂.
    pub fn call(&self, ref_cnt: u8, alt_cnt: u8, ref_freq: u8, alt_freq: u8) -> Call {
        debug_assert!(ref_cnt <= MAX_COV && alt_cnt <= MAX_COV);

        if (ref_cnt == 0 && alt_cnt == 0) || (ref_cnt == MAX_COV && alt_cnt == MAX_COV) {
            return Call {
                genotype: Genotype::None,
                confidence: 0.0,
            };
        }

        let n = MAX_COV as usize + 1;
        let [g0, g1, g2] = self.cache[ref_cnt as usize * n + alt_cnt as usize];

        let p = ref_freq as f32 / 255.0;
        let q = alt_freq as f32 / 255.0;
        let p2 = p * p;
        let q2 = q * q;

        let p_g0 = p2 * g0;
        let p_g1 = (1.0 - p2 - q2) * g1;
        let p_g2 = q2 * g2;
        let total = p_g0 + p_g1 + p_g2;

        let depth = self.poisson[ref_cnt as usize + alt_cnt as usize];

        if p_g0 > p_g1 && p_g0 > p_g2 {
            Call {
                genotype: Genotype::Ref,
                confidence: (p_g0 / total) as f64 * depth,
            }
        } else if p_g1 > p_g0 && p_g1 > p_g2 {
            Call {
                genotype: Genotype::Het,
                confidence: (p_g1 / total) as f64 * depth,
            }
        } else {
            Call {
                genotype: Genotype::Alt,
                confidence: (p_g2 / total) as f64 * depth,
            }
        }
    }
}

/* ------------------------------------------------------------------------- */
/*  `lava` subcommand pipeline                                               */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct GenotypeSummary {
    pub scan: ScanCounters,
    pub calls: CallCounters,
}

/// Run the full genotyping pass: load dictionaries and chromosome lengths,
/// stream the FASTQ through the scanner, then call every site and write
/// alt/het lines to `out_path`.
pub fn genotype(
    refdict_path: &Path,
    snpdict_path: &Path,
    fastq_path: &Path,
    chrlens_path: &Path,
    out_path: &Path,
) -> Result<GenotypeSummary> {
    let start = Instant::now();

    let chrlens = read_chrlens(chrlens_path)?;

    log::info!("initializing...");

    let mut refdict_file = BufReader::new(
        File::open(refdict_path).with_context(|| format!("opening ref dict {refdict_path:?}"))?,
    );
    let ref_dict = RefDict::load(&mut refdict_file)?;

    // Sized from the reference dictionary; SNP loading grows it if the
    // catalog reaches further.
    let mut pileup = PileupTable::covering(ref_dict.max_pos);

    let mut snpdict_file = BufReader::new(
        File::open(snpdict_path).with_context(|| format!("opening SNP dict {snpdict_path:?}"))?,
    );
    let snp_dict = SnpDict::load(&mut snpdict_file, &mut pileup)?;

    log::info!("processing...");

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("       {spinner} {pos} reads {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut scanner = ReadScanner::new(&ref_dict, &snp_dict);
    let reader = fastq::Reader::from_file(fastq_path)
        .with_context(|| format!("opening FASTQ {fastq_path:?}"))?;
    for record in reader.records() {
        let record = record.context("reading FASTQ record")?;
        scanner.scan_read(record.seq(), &mut pileup);
        pb.inc(1);
    }
    pb.finish_with_message("| scanned");

    let model = GenotypeModel::new();
    let mut out = BufWriter::new(
        File::create(out_path).with_context(|| format!("creating output {out_path:?}"))?,
    );
    let calls = write_calls(&pileup, &model, &chrlens, &mut out)?;
    out.flush().context("flushing output")?;

    let summary = GenotypeSummary {
        scan: scanner.counters,
        calls,
    };

    log::info!("time: {:.2?}", start.elapsed());
    log::info!(
        "calls: {} ref / {} het / {} alt",
        summary.calls.ref_calls,
        summary.calls.het_calls,
        summary.calls.alt_calls
    );
    log::debug!("{:?}", summary.scan);

    Ok(summary)
}
