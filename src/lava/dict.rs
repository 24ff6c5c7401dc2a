//! In-memory dictionaries and their jumpgate indexes.
//!
//! Both dictionaries arrive as sorted flat files (see `dictgen`). The
//! loader streams entries in order, keeps only the low half of each k-mer
//! as the intra-bucket search key, and uses the high half to seed the
//! jumpgate before discarding it.
//!
//! The jumpgate contract is an O(1) mapping from a k-mer's high half to
//! the `[lo, hi)` run of dictionary entries sharing that prefix. A dense
//! 2^32-slot array satisfies it at ~16 GiB; a hash bucket directory over
//! the same runs gives identical query results in memory proportional to
//! the number of distinct prefixes, which is what we build here.

use std::io::Read;
use std::ops::Range;

use anyhow::{bail, Context, Result};
use fxhash::FxHashMap;

use crate::lava::kmer_codec::{base_at, hi, hi24, lo, lo40, Kmer, BASE_N};
use crate::lava::pileup::PileupTable;
use crate::lava::{AUX_TABLE_COLS, FLAG_AMBIGUOUS, FLAG_UNAMBIGUOUS, POS_AMBIGUOUS};

/// Decoded (pos, ambig_flag) pair of a dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// K-mer occurs exactly once, at this absolute 1-based position.
    Unique(u32),
    /// K-mer occurs a few times; the payload is an aux-table row index.
    Aux(u32),
    /// K-mer occurs at too many positions to enumerate. Informational
    /// only; the scanner never votes on these.
    Dispersed,
}

fn decode_placement(pos: u32, flag: u8) -> Result<Placement> {
    if pos == POS_AMBIGUOUS {
        return Ok(Placement::Dispersed);
    }
    match flag {
        FLAG_UNAMBIGUOUS => Ok(Placement::Unique(pos)),
        FLAG_AMBIGUOUS => Ok(Placement::Aux(pos)),
        other => bail!("unknown ambiguity flag {other} in dictionary entry"),
    }
}

/// Packed SNP descriptor: in-k-mer offset in bits 0..=4, reference base
/// code in bits 5..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnpInfo(u8);

impl SnpInfo {
    pub fn pack(offset: u8, ref_base: u8) -> SnpInfo {
        debug_assert!(offset < 32 && ref_base <= BASE_N);
        SnpInfo((ref_base << 5) | (offset & 0x1F))
    }

    pub fn from_raw(raw: u8) -> SnpInfo {
        SnpInfo(raw)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// SNP position within the k-mer window (0..=31).
    pub fn offset(self) -> u8 {
        self.0 & 0x1F
    }

    /// Reference allele code (may be BASE_N for a degenerate catalog row).
    pub fn ref_base(self) -> u8 {
        self.0 >> 5
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefEntry {
    pub kmer_lo: u32,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy)]
pub struct SnpEntry {
    pub kmer_lo40: u64,
    pub placement: Placement,
    pub snp: SnpInfo,
    pub ref_freq: u8,
    pub alt_freq: u8,
}

/// Fixed-width aux row: alternate placements of a k-mer occurring more
/// than once but at most AUX_TABLE_COLS times. Zero-terminated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefAuxRow {
    pub pos: [u32; AUX_TABLE_COLS],
}

impl RefAuxRow {
    /// Occupied positions, left to right up to the first zero.
    pub fn positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.pos.iter().copied().take_while(|&p| p != 0)
    }
}

/// Aux row of the SNP dictionary: parallel position/descriptor columns.
/// The frequency columns are stored as written; the scanner does not
/// consult them.
#[derive(Debug, Clone, Copy)]
pub struct SnpAuxRow {
    pub pos: [u32; AUX_TABLE_COLS],
    pub snp: [SnpInfo; AUX_TABLE_COLS],
    pub ref_freq: [u8; AUX_TABLE_COLS],
    pub alt_freq: [u8; AUX_TABLE_COLS],
}

impl SnpAuxRow {
    /// Occupied (pos, snp) columns, left to right up to the first zero.
    pub fn placements(&self) -> impl Iterator<Item = (u32, SnpInfo)> + '_ {
        self.pos
            .iter()
            .zip(self.snp.iter())
            .map(|(&p, &s)| (p, s))
            .take_while(|&(p, _)| p != 0)
    }
}

/* ------------------------------------------------------------------------- */
/*  Jumpgate                                                                 */
/* ------------------------------------------------------------------------- */

/// Prefix → entry-run directory over a sorted dictionary.
pub struct Jumpgate {
    buckets: FxHashMap<u32, (u32, u32)>,
}

impl Jumpgate {
    fn new() -> Self {
        Jumpgate {
            buckets: FxHashMap::default(),
        }
    }

    fn close_run(&mut self, prefix: u32, start: u32, end: u32) {
        debug_assert!(start < end);
        self.buckets.insert(prefix, (start, end));
    }

    /// The `[lo, hi)` dictionary slice whose entries carry `prefix`.
    #[inline]
    pub fn bucket(&self, prefix: u32) -> Option<Range<usize>> {
        self.buckets
            .get(&prefix)
            .map(|&(lo, hi)| lo as usize..hi as usize)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Incremental jumpgate construction over an entry stream sorted by
/// (prefix, low half): detects prefix changes and closes each run.
struct JumpgateBuilder {
    gate: Jumpgate,
    run_prefix: Option<u32>,
    run_start: u32,
}

impl JumpgateBuilder {
    fn new() -> Self {
        JumpgateBuilder {
            gate: Jumpgate::new(),
            run_prefix: None,
            run_start: 0,
        }
    }

    fn observe(&mut self, i: u32, prefix: u32) {
        match self.run_prefix {
            Some(p) if p == prefix => {}
            Some(p) => {
                self.gate.close_run(p, self.run_start, i);
                self.run_prefix = Some(prefix);
                self.run_start = i;
            }
            None => {
                self.run_prefix = Some(prefix);
                self.run_start = i;
            }
        }
    }

    fn finish(mut self, len: u32) -> Jumpgate {
        if let Some(p) = self.run_prefix {
            self.gate.close_run(p, self.run_start, len);
        }
        self.gate
    }
}

/* ------------------------------------------------------------------------- */
/*  Binary scalar readers                                                    */
/* ------------------------------------------------------------------------- */

pub(crate) fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u8<R: Read>(r: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

const DICT_MAX_ENTRIES: u64 = 1 << 32;

/* ------------------------------------------------------------------------- */
/*  Reference dictionary                                                     */
/* ------------------------------------------------------------------------- */

pub struct RefDict {
    pub entries: Vec<RefEntry>,
    pub aux: Vec<RefAuxRow>,
    jumpgate: Jumpgate,
    /// Highest absolute position seen across unique entries and aux rows;
    /// sizes the pileup table.
    pub max_pos: u32,
}

impl RefDict {
    pub fn load<R: Read>(r: &mut R) -> Result<RefDict> {
        let dict_size = read_u64(r).context("reading ref dict size")?;
        let aux_size = read_u64(r).context("reading ref aux size")?;

        if dict_size > DICT_MAX_ENTRIES {
            bail!("reference dictionary is too large (limit: {DICT_MAX_ENTRIES} 32-mers)");
        }

        let mut entries = Vec::with_capacity(dict_size as usize);
        let mut gate = JumpgateBuilder::new();
        let mut max_pos: u32 = 0;
        let mut last_kmer: Option<Kmer> = None;

        for i in 0..dict_size {
            let kmer = read_u64(r).context("reading ref dict entry")?;
            let pos = read_u32(r).context("reading ref dict entry")?;
            let flag = read_u8(r).context("reading ref dict entry")?;

            if let Some(last) = last_kmer {
                if kmer <= last {
                    bail!("reference dictionary is not sorted at entry {i}");
                }
            }
            last_kmer = Some(kmer);

            let placement = decode_placement(pos, flag)?;
            if let Placement::Unique(p) = placement {
                max_pos = max_pos.max(p);
            }

            gate.observe(i as u32, hi(kmer));
            entries.push(RefEntry {
                kmer_lo: lo(kmer),
                placement,
            });
        }

        let jumpgate = gate.finish(dict_size as u32);

        let mut aux = Vec::with_capacity(aux_size as usize);
        for _ in 0..aux_size {
            let mut row = RefAuxRow::default();
            for slot in row.pos.iter_mut() {
                *slot = read_u32(r).context("reading ref aux row")?;
                max_pos = max_pos.max(*slot);
            }
            aux.push(row);
        }

        log::debug!(
            "loaded ref dict: {} entries, {} aux rows, {} jumpgate buckets",
            entries.len(),
            aux.len(),
            jumpgate.bucket_count()
        );

        Ok(RefDict {
            entries,
            aux,
            jumpgate,
            max_pos,
        })
    }

    /// Exact-match query: jumpgate bucket, then binary search on the low
    /// half within the bucket. O(log bucket) compares.
    pub fn lookup(&self, kmer: Kmer) -> Option<&RefEntry> {
        let range = self.jumpgate.bucket(hi(kmer))?;
        let bucket = &self.entries[range.clone()];
        bucket
            .binary_search_by_key(&lo(kmer), |e| e.kmer_lo)
            .ok()
            .map(|i| &self.entries[range.start + i])
    }

    pub fn aux_row(&self, idx: u32) -> Option<&RefAuxRow> {
        self.aux.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/* ------------------------------------------------------------------------- */
/*  SNP dictionary                                                           */
/* ------------------------------------------------------------------------- */

pub struct SnpDict {
    pub entries: Vec<SnpEntry>,
    pub aux: Vec<SnpAuxRow>,
    jumpgate: Jumpgate,
}

impl SnpDict {
    /// Load the SNP dictionary and seed `pileup` with every unambiguous
    /// site: ref allele from the descriptor, alt allele read straight out
    /// of the entry's (alternate-substituted) k-mer.
    pub fn load<R: Read>(r: &mut R, pileup: &mut PileupTable) -> Result<SnpDict> {
        let dict_size = read_u64(r).context("reading SNP dict size")?;
        let aux_size = read_u64(r).context("reading SNP aux size")?;

        if dict_size > DICT_MAX_ENTRIES {
            bail!("SNP dictionary is too large (limit: {DICT_MAX_ENTRIES} 32-mers)");
        }

        let mut entries = Vec::with_capacity(dict_size as usize);
        let mut gate = JumpgateBuilder::new();
        let mut last_kmer: Option<Kmer> = None;

        for i in 0..dict_size {
            let kmer = read_u64(r).context("reading SNP dict entry")?;
            let pos = read_u32(r).context("reading SNP dict entry")?;
            let snp = SnpInfo::from_raw(read_u8(r).context("reading SNP dict entry")?);
            let flag = read_u8(r).context("reading SNP dict entry")?;
            let ref_freq = read_u8(r).context("reading SNP dict entry")?;
            let alt_freq = read_u8(r).context("reading SNP dict entry")?;

            if let Some(last) = last_kmer {
                if kmer <= last {
                    bail!("SNP dictionary is not sorted at entry {i}");
                }
            }
            last_kmer = Some(kmer);

            let placement = decode_placement(pos, flag)?;

            // A SNP site becomes a pileup site only when its placement is
            // certain and its reference allele is a concrete base.
            if let Placement::Unique(p) = placement {
                if (snp.ref_base() & BASE_N) == 0 {
                    let snp_pos = p as u64 + snp.offset() as u64;
                    pileup.set_site(
                        snp_pos,
                        snp.ref_base(),
                        base_at(kmer, snp.offset() as usize),
                        ref_freq,
                        alt_freq,
                    );
                }
            }

            gate.observe(i as u32, hi24(kmer));
            entries.push(SnpEntry {
                kmer_lo40: lo40(kmer),
                placement,
                snp,
                ref_freq,
                alt_freq,
            });
        }

        let jumpgate = gate.finish(dict_size as u32);

        let mut aux = Vec::with_capacity(aux_size as usize);
        for _ in 0..aux_size {
            // The row's own k-mer is written for self-containedness; the
            // in-memory row does not need it.
            let _kmer = read_u64(r).context("reading SNP aux row")?;

            let mut row = SnpAuxRow {
                pos: [0; AUX_TABLE_COLS],
                snp: [SnpInfo::from_raw(0); AUX_TABLE_COLS],
                ref_freq: [0; AUX_TABLE_COLS],
                alt_freq: [0; AUX_TABLE_COLS],
            };
            for c in 0..AUX_TABLE_COLS {
                row.pos[c] = read_u32(r).context("reading SNP aux row")?;
                row.snp[c] = SnpInfo::from_raw(read_u8(r).context("reading SNP aux row")?);
                row.ref_freq[c] = read_u8(r).context("reading SNP aux row")?;
                row.alt_freq[c] = read_u8(r).context("reading SNP aux row")?;
            }
            aux.push(row);
        }

        log::debug!(
            "loaded SNP dict: {} entries, {} aux rows, {} jumpgate buckets",
            entries.len(),
            aux.len(),
            jumpgate.bucket_count()
        );

        Ok(SnpDict {
            entries,
            aux,
            jumpgate,
        })
    }

    /// Exact-match query on the HI24/LO40 split.
    pub fn lookup(&self, kmer: Kmer) -> Option<&SnpEntry> {
        let range = self.jumpgate.bucket(hi24(kmer))?;
        let bucket = &self.entries[range.clone()];
        bucket
            .binary_search_by_key(&lo40(kmer), |e| e.kmer_lo40)
            .ok()
            .map(|i| &self.entries[range.start + i])
    }

    pub fn aux_row(&self, idx: u32) -> Option<&SnpAuxRow> {
        self.aux.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
