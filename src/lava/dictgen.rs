//! Dictionary construction.
//!
//! Both dictionaries are flat sorted tables over encoded 32-mers:
//!
//! * reference dict: one candidate entry per window of every chromosome,
//!   keyed by the window's k-mer, valued by its absolute 1-based position;
//! * SNP dict: one candidate entry per (SNP locus × covering window),
//!   keyed by the window's k-mer with the *alternate* allele substituted
//!   in, so reads carrying the variant hit it directly.
//!
//! Duplicate k-mers collapse: up to AUX_TABLE_COLS occurrences move into a
//! zero-terminated aux row referenced from the entry; anything beyond that
//! is recorded as dispersed (POS_AMBIGUOUS) and never voted on.
//!
//! FILE LAYOUT (all integers little-endian)
//! ─────────────────────────────────────────────────────────────────────
//!  u64 dict_size
//!  u64 aux_size
//!  dict_size × entry
//!     ref: { u64 kmer; u32 pos; u8 ambig_flag }
//!     snp: { u64 kmer; u32 pos; u8 snp_info; u8 ambig_flag;
//!            u8 ref_freq; u8 alt_freq }
//!  aux_size × row
//!     ref: { AUX_TABLE_COLS × u32 pos }
//!     snp: { u64 kmer; AUX_TABLE_COLS × (u32 pos; u8 snp_info;
//!            u8 ref_freq; u8 alt_freq) }
//! ─────────────────────────────────────────────────────────────────────

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use fxhash::FxHashMap;
use indicatif::{ProgressBar, ProgressStyle};
use smallvec::SmallVec;

use crate::cli::io::{read_fasta, read_snps, write_chrlens};
use crate::lava::kmer_codec::{encode_base, encode_kmer, Kmer, KMER_LEN};
use crate::lava::dict::SnpInfo;
use crate::lava::{AUX_TABLE_COLS, FLAG_AMBIGUOUS, FLAG_UNAMBIGUOUS, POS_AMBIGUOUS};

/// One reference sequence, in file order.
pub struct RefSeq {
    pub name: String,
    pub seq: Vec<u8>,
}

/// One parsed SNP catalog row. `pos` is 1-based within `chrom`; alleles
/// are raw ASCII bases; frequencies are fractions in [0, 1].
pub struct SnpRecord {
    pub chrom: String,
    pub pos: u64,
    pub ref_allele: u8,
    pub alt_allele: u8,
    pub ref_freq: f32,
    pub alt_freq: f32,
}

/// Population frequency as stored on disk: v represents v/255.
fn encode_freq(f: f32) -> u8 {
    (f.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn progress(len: u64, msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("       {bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(msg);
    pb
}

/* ------------------------------------------------------------------------- */
/*  Binary scalar writers                                                    */
/* ------------------------------------------------------------------------- */

fn write_u64<W: Write>(w: &mut W, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u8<W: Write>(w: &mut W, v: u8) -> std::io::Result<()> {
    w.write_all(&[v])
}

const DICT_MAX_ENTRIES: usize = 1 << 32;

/// Guard 32-bit positions: every window start must encode as a nonzero
/// u32 below the POS_AMBIGUOUS sentinel.
fn check_genome_size(seqs: &[RefSeq]) -> Result<()> {
    let total: u64 = seqs.iter().map(|s| s.seq.len() as u64).sum();
    if total >= (POS_AMBIGUOUS as u64 - KMER_LEN as u64) {
        bail!("reference is too long for 32-bit positions ({total} bases)");
    }
    Ok(())
}

/* ------------------------------------------------------------------------- */
/*  Reference dictionary                                                     */
/* ------------------------------------------------------------------------- */

/// Occurrence lists are capped one past the aux width: reaching
/// AUX_TABLE_COLS + 1 marks the k-mer dispersed, and further positions
/// are not worth remembering.
type PosList = SmallVec<[u32; 5]>;

fn record_occurrence(list: &mut PosList, pos: u32) {
    if list.len() <= AUX_TABLE_COLS {
        list.push(pos);
    }
}

/// Build the reference dictionary over every 32-base window of `seqs` and
/// write it to `out`. Windows containing N are skipped.
pub fn make_ref_dict<W: Write>(seqs: &[RefSeq], out: &mut W) -> Result<()> {
    check_genome_size(seqs)?;

    let mut occurrences: FxHashMap<Kmer, PosList> = FxHashMap::default();

    let pb = progress(seqs.len() as u64, "indexing reference windows");
    let mut abs_offset: u64 = 0;
    for seq in seqs {
        let n = seq.seq.len();
        if n >= KMER_LEN {
            for start in 0..=(n - KMER_LEN) {
                let (kmer, had_n) = encode_kmer(&seq.seq[start..]);
                if had_n {
                    continue;
                }
                let pos = (abs_offset + start as u64 + 1) as u32;
                record_occurrence(occurrences.entry(kmer).or_default(), pos);
            }
        }
        abs_offset += n as u64;
        pb.inc(1);
    }
    pb.finish_with_message("| reference windows indexed");

    if occurrences.len() > DICT_MAX_ENTRIES {
        bail!(
            "reference dictionary is too large ({} 32-mers, limit {DICT_MAX_ENTRIES})",
            occurrences.len()
        );
    }

    let mut sorted: Vec<(Kmer, PosList)> = occurrences.into_iter().collect();
    sorted.sort_unstable_by_key(|&(kmer, _)| kmer);

    let aux_size = sorted
        .iter()
        .filter(|(_, v)| (2..=AUX_TABLE_COLS).contains(&v.len()))
        .count() as u64;

    write_u64(out, sorted.len() as u64).context("writing ref dict header")?;
    write_u64(out, aux_size).context("writing ref dict header")?;

    let mut aux_rows: Vec<[u32; AUX_TABLE_COLS]> = Vec::with_capacity(aux_size as usize);
    for (kmer, positions) in &sorted {
        let (pos, flag) = match positions.len() {
            1 => (positions[0], FLAG_UNAMBIGUOUS),
            n if n <= AUX_TABLE_COLS => {
                let mut row = [0u32; AUX_TABLE_COLS];
                row[..n].copy_from_slice(positions);
                aux_rows.push(row);
                ((aux_rows.len() - 1) as u32, FLAG_AMBIGUOUS)
            }
            _ => (POS_AMBIGUOUS, FLAG_UNAMBIGUOUS),
        };
        write_u64(out, *kmer).context("writing ref dict entry")?;
        write_u32(out, pos).context("writing ref dict entry")?;
        write_u8(out, flag).context("writing ref dict entry")?;
    }

    for row in &aux_rows {
        for &p in row {
            write_u32(out, p).context("writing ref aux row")?;
        }
    }

    log::info!(
        "ref dict: {} entries, {} aux rows",
        sorted.len(),
        aux_rows.len()
    );
    Ok(())
}

/* ------------------------------------------------------------------------- */
/*  SNP dictionary                                                           */
/* ------------------------------------------------------------------------- */

#[derive(Clone, Copy)]
struct SnpWindow {
    pos: u32,
    snp: SnpInfo,
    ref_freq: u8,
    alt_freq: u8,
}

type SnpWindowList = SmallVec<[SnpWindow; 5]>;

/// Build the SNP dictionary and write it to `out`.
///
/// For every catalog row on a known chromosome, every 32-base window
/// covering the locus contributes one candidate entry keyed by the window
/// k-mer with the alternate allele substituted at the site. The entry's
/// descriptor carries the in-window offset and the *reference* allele; the
/// alternate allele is recoverable from the k-mer itself.
pub fn make_snp_dict<W: Write>(seqs: &[RefSeq], snps: &[SnpRecord], out: &mut W) -> Result<()> {
    check_genome_size(seqs)?;

    // chrom name → (absolute offset of base 1, length)
    let mut chrom_index: FxHashMap<&str, (u64, usize)> = FxHashMap::default();
    let mut seq_of: FxHashMap<&str, &[u8]> = FxHashMap::default();
    let mut abs_offset: u64 = 0;
    for seq in seqs {
        chrom_index.insert(seq.name.as_str(), (abs_offset, seq.seq.len()));
        seq_of.insert(seq.name.as_str(), &seq.seq);
        abs_offset += seq.seq.len() as u64;
    }

    let mut occurrences: FxHashMap<Kmer, SnpWindowList> = FxHashMap::default();

    let pb = progress(snps.len() as u64, "indexing SNP windows");
    let mut skipped = 0usize;
    for snp in snps {
        pb.inc(1);

        let Some(&(chrom_offset, chrom_len)) = chrom_index.get(snp.chrom.as_str()) else {
            log::warn!("SNP on unknown chromosome {:?} skipped", snp.chrom);
            skipped += 1;
            continue;
        };
        if snp.pos == 0 || snp.pos > chrom_len as u64 {
            log::warn!("SNP at {}:{} is out of range, skipped", snp.chrom, snp.pos);
            skipped += 1;
            continue;
        }

        let seq = seq_of[snp.chrom.as_str()];
        let site = (snp.pos - 1) as usize; // 0-based within the chromosome
        let ref_code = encode_base(snp.ref_allele);
        let ref_freq = encode_freq(snp.ref_freq);
        let alt_freq = encode_freq(snp.alt_freq);

        let first_start = site.saturating_sub(KMER_LEN - 1);
        for start in first_start..=site {
            if start + KMER_LEN > chrom_len {
                break;
            }
            let mut window = [0u8; KMER_LEN];
            window.copy_from_slice(&seq[start..start + KMER_LEN]);
            window[site - start] = snp.alt_allele;

            let (kmer, had_n) = encode_kmer(&window);
            if had_n {
                continue;
            }

            let pos = (chrom_offset + start as u64 + 1) as u32;
            let snp_info = SnpInfo::pack((site - start) as u8, ref_code);
            record_snp_occurrence(
                occurrences.entry(kmer).or_default(),
                SnpWindow {
                    pos,
                    snp: snp_info,
                    ref_freq,
                    alt_freq,
                },
            );
        }
    }
    pb.finish_with_message("| SNP windows indexed");

    if skipped > 0 {
        log::warn!("{skipped} SNP catalog rows skipped");
    }
    if occurrences.len() > DICT_MAX_ENTRIES {
        bail!(
            "SNP dictionary is too large ({} 32-mers, limit {DICT_MAX_ENTRIES})",
            occurrences.len()
        );
    }

    let mut sorted: Vec<(Kmer, SnpWindowList)> = occurrences.into_iter().collect();
    sorted.sort_unstable_by_key(|&(kmer, _)| kmer);

    let aux_size = sorted
        .iter()
        .filter(|(_, v)| (2..=AUX_TABLE_COLS).contains(&v.len()))
        .count() as u64;

    write_u64(out, sorted.len() as u64).context("writing SNP dict header")?;
    write_u64(out, aux_size).context("writing SNP dict header")?;

    let mut aux_rows: Vec<(Kmer, SnpWindowList)> = Vec::with_capacity(aux_size as usize);
    for (kmer, windows) in &sorted {
        let first = windows[0];
        let (pos, flag) = match windows.len() {
            1 => (first.pos, FLAG_UNAMBIGUOUS),
            n if n <= AUX_TABLE_COLS => {
                aux_rows.push((*kmer, windows.clone()));
                ((aux_rows.len() - 1) as u32, FLAG_AMBIGUOUS)
            }
            _ => (POS_AMBIGUOUS, FLAG_UNAMBIGUOUS),
        };
        write_u64(out, *kmer).context("writing SNP dict entry")?;
        write_u32(out, pos).context("writing SNP dict entry")?;
        write_u8(out, first.snp.raw()).context("writing SNP dict entry")?;
        write_u8(out, flag).context("writing SNP dict entry")?;
        write_u8(out, first.ref_freq).context("writing SNP dict entry")?;
        write_u8(out, first.alt_freq).context("writing SNP dict entry")?;
    }

    for (kmer, windows) in &aux_rows {
        write_u64(out, *kmer).context("writing SNP aux row")?;
        for c in 0..AUX_TABLE_COLS {
            let w = windows.get(c).copied().unwrap_or(SnpWindow {
                pos: 0,
                snp: SnpInfo::from_raw(0),
                ref_freq: 0,
                alt_freq: 0,
            });
            write_u32(out, w.pos).context("writing SNP aux row")?;
            write_u8(out, w.snp.raw()).context("writing SNP aux row")?;
            write_u8(out, w.ref_freq).context("writing SNP aux row")?;
            write_u8(out, w.alt_freq).context("writing SNP aux row")?;
        }
    }

    log::info!(
        "SNP dict: {} entries, {} aux rows",
        sorted.len(),
        aux_rows.len()
    );
    Ok(())
}

fn record_snp_occurrence(list: &mut SnpWindowList, w: SnpWindow) {
    if list.len() <= AUX_TABLE_COLS {
        list.push(w);
    }
}

/* ------------------------------------------------------------------------- */
/*  `dict` subcommand pipeline                                               */
/* ------------------------------------------------------------------------- */

/// Parse the reference and SNP catalog, then write the chrlens side file
/// and both dictionaries.
pub fn build_dicts(
    ref_fasta: &Path,
    snp_path: &Path,
    refdict_path: &Path,
    snpdict_path: &Path,
) -> Result<()> {
    let seqs = read_fasta(ref_fasta)?;
    log::info!("reference: {} sequences", seqs.len());

    let mut chrlens_path = ref_fasta.as_os_str().to_owned();
    chrlens_path.push(".chrlens");
    write_chrlens(Path::new(&chrlens_path), &seqs)?;

    let mut refdict = BufWriter::new(
        File::create(refdict_path)
            .with_context(|| format!("creating ref dict {refdict_path:?}"))?,
    );
    make_ref_dict(&seqs, &mut refdict)?;
    refdict.flush().context("flushing ref dict")?;

    let snps = read_snps(snp_path)?;
    log::info!("SNP catalog: {} rows", snps.len());

    let mut snpdict = BufWriter::new(
        File::create(snpdict_path)
            .with_context(|| format!("creating SNP dict {snpdict_path:?}"))?,
    );
    make_snp_dict(&seqs, &snps, &mut snpdict)?;
    snpdict.flush().context("flushing SNP dict")?;

    Ok(())
}
