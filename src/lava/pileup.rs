//! Dense per-position SNP pileup.
//!
//! Indexed directly by absolute 1-based reference position (slot 0 stays
//! unused). An all-zero entry means "no SNP at this position"; a site is
//! any entry whose ref and alt codes differ.

use crate::lava::kmer_codec::KMER_LEN;
use crate::lava::MAX_COV;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PileupEntry {
    pub ref_base: u8,
    pub alt_base: u8,
    pub ref_freq: u8,
    pub alt_freq: u8,
    pub ref_cnt: u8,
    pub alt_cnt: u8,
}

impl PileupEntry {
    /// A known SNP site. ref == alt (both zero) marks an empty slot.
    #[inline]
    pub fn is_site(&self) -> bool {
        self.ref_base != self.alt_base
    }
}

/// How a single observed base related to the site it landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cover {
    NoSite,
    Ref,
    Alt,
    Other,
}

pub struct PileupTable {
    entries: Vec<PileupEntry>,
}

impl PileupTable {
    /// Table covering every position up to `max_pos` plus a full trailing
    /// window, so `pos + 31` stays in range for any recorded position.
    pub fn covering(max_pos: u32) -> Self {
        PileupTable {
            entries: vec![PileupEntry::default(); max_pos as usize + KMER_LEN + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entry(&self, pos: u64) -> Option<&PileupEntry> {
        self.entries.get(pos as usize)
    }

    /// True when no SNP is recorded at `pos`. Out-of-range positions count
    /// as blank; nothing was ever recorded there.
    #[inline]
    pub fn is_blank(&self, pos: u64) -> bool {
        match self.entries.get(pos as usize) {
            Some(e) => !e.is_site(),
            None => true,
        }
    }

    /// Register a SNP site, growing the table if `pos` lies past the end.
    pub fn set_site(&mut self, pos: u64, ref_base: u8, alt_base: u8, ref_freq: u8, alt_freq: u8) {
        let want = pos as usize + KMER_LEN + 1;
        if want > self.entries.len() {
            log::debug!("growing pileup table to {want} entries");
            self.entries.resize(want, PileupEntry::default());
        }
        let e = &mut self.entries[pos as usize];
        e.ref_base = ref_base;
        e.alt_base = alt_base;
        e.ref_freq = ref_freq;
        e.alt_freq = alt_freq;
    }

    /// Count one observed base at `pos`.
    ///
    /// Non-site positions are left untouched, as are bases matching neither
    /// allele. Counters saturate at MAX_COV; they never wrap.
    pub fn record_base(&mut self, pos: u64, base: u8) -> Cover {
        let Some(e) = self.entries.get_mut(pos as usize) else {
            return Cover::NoSite;
        };
        if !e.is_site() {
            return Cover::NoSite;
        }
        if base == e.ref_base {
            if e.ref_cnt != MAX_COV {
                e.ref_cnt += 1;
            }
            Cover::Ref
        } else if base == e.alt_base {
            if e.alt_cnt != MAX_COV {
                e.alt_cnt += 1;
            }
            Cover::Alt
        } else {
            Cover::Other
        }
    }

    /// All SNP sites in increasing absolute position order.
    pub fn sites(&self) -> impl Iterator<Item = (u64, &PileupEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_site())
            .map(|(i, e)| (i as u64, e))
    }
}
