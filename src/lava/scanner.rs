//! Read scanning: place each read by k-mer agreement, then harvest its
//! SNP-site evidence.
//!
//! Each read is cut into disjoint 32-mers. Every dictionary hit for a
//! k-mer (direct, or through one of its 96 Hamming-1 neighbors) implies a
//! read-start position; those votes go into the index table. A read is
//! processed only when at least two k-mers agree on the same placement and
//! no other placement ties it. Unplaced reads get exactly one retry on
//! their reverse complement.

use smallvec::SmallVec;

use crate::cli::counters::ScanCounters;
use crate::lava::dict::{Placement, RefDict, SnpDict};
use crate::lava::index_table::IndexTable;
use crate::lava::kmer_codec::{
    base_at, encode_kmer, hamming1_neighbors, reverse_complement, Kmer, KMER_LEN,
};
use crate::lava::pileup::{Cover, PileupTable};

/// One recorded dictionary hit: the k-mer as matched (for a neighbor hit,
/// the corrected form), the read placement it voted for, and where the
/// k-mer itself sits on the reference.
#[derive(Debug, Clone, Copy)]
struct KmerContext {
    kmer: Kmer,
    read_pos: u32,
    kmer_pos: u32,
}

/// Outcome of a single scan pass over one orientation of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Unique winning placement with at least two agreeing k-mers.
    Processed,
    /// The top vote count was shared by several placements.
    Multi,
    /// No placement reached two votes.
    NoPlacement,
    /// A window held a non-ACGT byte; the read is abandoned outright.
    BadBase,
}

pub struct ReadScanner<'d> {
    ref_dict: &'d RefDict,
    snp_dict: &'d SnpDict,
    votes: IndexTable,
    kmers: SmallVec<[Kmer; 8]>,
    ref_hits: Vec<KmerContext>,
    snp_hits: Vec<KmerContext>,
    /// Whether the current pass put at least one base on a SNP site.
    pass_good: bool,
    pub counters: ScanCounters,
}

impl<'d> ReadScanner<'d> {
    pub fn new(ref_dict: &'d RefDict, snp_dict: &'d SnpDict) -> Self {
        ReadScanner {
            ref_dict,
            snp_dict,
            votes: IndexTable::new(),
            kmers: SmallVec::new(),
            ref_hits: Vec::new(),
            snp_hits: Vec::new(),
            pass_good: false,
            counters: ScanCounters::default(),
        }
    }

    /// Scan one read and, if it places uniquely, fold its evidence into
    /// `pileup`. The voter is left empty afterwards either way.
    pub fn scan_read(&mut self, read: &[u8], pileup: &mut PileupTable) {
        self.counters.total += 1;

        // Only the largest 32-base-aligned prefix is scanned; a trailing
        // partial window is ignored.
        let len = (read.len() / KMER_LEN) * KMER_LEN;
        if len == 0 {
            self.counters.nohit += 1;
            return;
        }
        let read = &read[..len];

        let mut outcome = self.scan_pass(read, pileup);

        if matches!(outcome, Pass::Multi | Pass::NoPlacement) {
            // One reverse-complement retry. The forward pass encoded every
            // window, so the bytes are known-ACGT here; a failed mirror is
            // treated like any other bad base.
            self.votes.clear_best();
            outcome = match reverse_complement(read) {
                Some(rc) => self.scan_pass(&rc, pileup),
                None => Pass::BadBase,
            };
        }

        match outcome {
            Pass::Processed => {
                self.counters.matched += 1;
                if self.pass_good {
                    self.counters.good_reads += 1;
                } else {
                    self.counters.bad_reads += 1;
                }
            }
            Pass::Multi => {
                self.counters.multi += 1;
                self.counters.bad_reads += 1;
            }
            Pass::NoPlacement | Pass::BadBase => {
                self.counters.nohit += 1;
                self.counters.bad_reads += 1;
            }
        }

        self.votes.clear_best();
    }

    /// One orientation: encode, probe, decide, then walk the recorded hit
    /// contexts, scrubbing each voted slot and, for a processed read,
    /// updating the pileup from every context that supports the winner.
    fn scan_pass(&mut self, read: &[u8], pileup: &mut PileupTable) -> Pass {
        self.kmers.clear();
        for off in (0..read.len()).step_by(KMER_LEN) {
            let (kmer, had_n) = encode_kmer(&read[off..]);
            if had_n {
                return Pass::BadBase;
            }
            self.kmers.push(kmer);
        }

        self.ref_hits.clear();
        self.snp_hits.clear();
        self.pass_good = false;

        for i in 0..self.kmers.len() {
            let kmer = self.kmers[i];
            let off = (i * KMER_LEN) as u32;

            self.probe_ref(kmer, off, None, pileup);
            self.probe_snp(kmer, off, None);

            for (diff_pos, neighbor) in hamming1_neighbors(kmer) {
                self.probe_ref(neighbor, off, Some(diff_pos), pileup);
                self.probe_snp(neighbor, off, Some(diff_pos));
            }
        }

        let (outcome, winner) = match self.votes.best() {
            Some(best) if best.freq > 1 && !self.votes.is_ambiguous() => {
                (Pass::Processed, Some(best.index))
            }
            Some(best) if best.freq > 1 => (Pass::Multi, None),
            _ => (Pass::NoPlacement, None),
        };

        for i in 0..self.ref_hits.len() {
            let ctx = self.ref_hits[i];
            self.votes.clear_index(ctx.read_pos);
            if winner == Some(ctx.read_pos) {
                self.apply_context(ctx, pileup);
            }
        }
        for i in 0..self.snp_hits.len() {
            let ctx = self.snp_hits[i];
            self.votes.clear_index(ctx.read_pos);
            if winner == Some(ctx.read_pos) {
                self.apply_context(ctx, pileup);
            }
        }

        outcome
    }

    /// Probe the reference dictionary with `key` (a read k-mer or one of
    /// its neighbors) at read offset `off`.
    ///
    /// For a neighbor probe, `guard` carries the substituted offset: the
    /// hit only counts while the corresponding reference position holds no
    /// known SNP, so a mismatch is never silently scored as reference.
    fn probe_ref(&mut self, key: Kmer, off: u32, guard: Option<u8>, pileup: &PileupTable) {
        let dict = self.ref_dict;
        let Some(entry) = dict.lookup(key) else {
            return;
        };
        match entry.placement {
            Placement::Unique(pos) => {
                if let Some(d) = guard {
                    if !pileup.is_blank(pos as u64 + d as u64) {
                        return;
                    }
                }
                self.counters.unambig_hits += 1;
                self.vote_ref(key, pos, off);
            }
            Placement::Aux(row_idx) => {
                let Some(row) = dict.aux_row(row_idx) else {
                    debug_assert!(false, "aux row index out of range");
                    return;
                };
                for pos in row.positions() {
                    if let Some(d) = guard {
                        if !pileup.is_blank(pos as u64 + d as u64) {
                            continue;
                        }
                    }
                    self.vote_ref(key, pos, off);
                }
            }
            Placement::Dispersed => {
                self.counters.ambig_hits += 1;
            }
        }
    }

    /// Probe the SNP dictionary. For a neighbor probe, a hit whose own SNP
    /// offset equals the substituted offset is skipped: that neighbor
    /// merely restores the alternate allele the direct probe already
    /// counted.
    fn probe_snp(&mut self, key: Kmer, off: u32, guard: Option<u8>) {
        let dict = self.snp_dict;
        let Some(entry) = dict.lookup(key) else {
            return;
        };
        match entry.placement {
            Placement::Unique(pos) => {
                if guard == Some(entry.snp.offset()) {
                    return;
                }
                self.counters.unambig_hits += 1;
                self.vote_snp(key, pos, off);
            }
            Placement::Aux(row_idx) => {
                let Some(row) = dict.aux_row(row_idx) else {
                    debug_assert!(false, "aux row index out of range");
                    return;
                };
                for (pos, snp) in row.placements() {
                    if guard == Some(snp.offset()) {
                        continue;
                    }
                    self.vote_snp(key, pos, off);
                }
            }
            Placement::Dispersed => {
                self.counters.ambig_hits += 1;
            }
        }
    }

    fn vote_ref(&mut self, kmer: Kmer, pos: u32, off: u32) {
        // pos < off would place the read before the reference start; such
        // candidates are dropped rather than wrapped.
        let Some(read_pos) = pos.checked_sub(off) else {
            return;
        };
        self.ref_hits.push(KmerContext {
            kmer,
            read_pos,
            kmer_pos: pos,
        });
        self.votes.add(read_pos);
    }

    fn vote_snp(&mut self, kmer: Kmer, pos: u32, off: u32) {
        let Some(read_pos) = pos.checked_sub(off) else {
            return;
        };
        self.snp_hits.push(KmerContext {
            kmer,
            read_pos,
            kmer_pos: pos,
        });
        self.votes.add(read_pos);
    }

    /// Fold one winning context into the pileup: every base of the k-mer
    /// that lands on a known SNP site counts toward whichever allele it
    /// matches.
    fn apply_context(&mut self, ctx: KmerContext, pileup: &mut PileupTable) {
        for j in 0..KMER_LEN {
            let base = base_at(ctx.kmer, j);
            match pileup.record_base(ctx.kmer_pos as u64 + j as u64, base) {
                Cover::Ref => {
                    self.counters.ref_covs += 1;
                    self.pass_good = true;
                }
                Cover::Alt => {
                    self.counters.alt_covs += 1;
                    self.pass_good = true;
                }
                Cover::Other => {
                    self.counters.other_covs += 1;
                }
                Cover::NoSite => {}
            }
        }
    }
}
