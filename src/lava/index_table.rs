//! Placement voting for a single read.
//!
//! Every dictionary hit votes for the read-start position it implies. The
//! set of distinct candidates per read is small (at most a few hundred), so
//! a prime-modulo hash with a bounded per-slot list is collision-tolerant
//! while staying trivially scrubbable between reads.

use smallvec::SmallVec;

/// Slot count; prime, so consecutive positions spread out.
pub const SLOT_COUNT: usize = 1009;

/// Upper bound on distinct indices per slot.
pub const ENTRY_DEPTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub index: u32,
    pub freq: u8,
}

/// Vote tally over candidate read placements, tracking the running
/// unique-maximum entry.
pub struct IndexTable {
    slots: Box<[SmallVec<[IndexEntry; 8]>]>,
    /// (slot, entry) of the highest-frequency entry seen so far.
    best: Option<(usize, usize)>,
    /// Whether the current maximum is attained by more than one index.
    ambiguous: bool,
}

impl Default for IndexTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexTable {
    pub fn new() -> Self {
        IndexTable {
            slots: vec![SmallVec::new(); SLOT_COUNT].into_boxed_slice(),
            best: None,
            ambiguous: false,
        }
    }

    /// Cast one vote for `index`.
    ///
    /// Maintains `best`/`ambiguous`: incrementing the entry that already is
    /// the maximum restores a unique maximum; a different entry reaching the
    /// same frequency marks a tie; exceeding it replaces the maximum.
    pub fn add(&mut self, index: u32) {
        let slot_i = index as usize % SLOT_COUNT;
        let slot = &mut self.slots[slot_i];

        let entry_i = match slot.iter().position(|e| e.index == index) {
            Some(i) => {
                slot[i].freq = slot[i].freq.saturating_add(1);
                i
            }
            None => {
                debug_assert!(slot.len() < ENTRY_DEPTH, "index table slot overflow");
                if slot.len() >= ENTRY_DEPTH {
                    return; // drop the vote rather than grow unbounded
                }
                slot.push(IndexEntry { index, freq: 1 });
                slot.len() - 1
            }
        };

        let target = (slot_i, entry_i);
        let target_freq = self.slots[slot_i][entry_i].freq;

        match self.best {
            None => {
                self.best = Some(target);
                self.ambiguous = false;
            }
            Some(best) if best == target => {
                self.ambiguous = false;
            }
            Some(best) => {
                let best_freq = self.slots[best.0][best.1].freq;
                if target_freq == best_freq {
                    self.ambiguous = true;
                } else if target_freq > best_freq {
                    self.best = Some(target);
                    self.ambiguous = false;
                }
            }
        }
    }

    /// Current unique-maximum candidate, if any.
    ///
    /// Only meaningful before any `clear_index` scrubbing for the read.
    pub fn best(&self) -> Option<IndexEntry> {
        self.best.and_then(|(s, e)| self.slots[s].get(e).copied())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Zero the slot that `index` hashes to.
    ///
    /// Calling this for every index voted during a read restores the table
    /// to its empty state without touching the other 1000+ slots.
    pub fn clear_index(&mut self, index: u32) {
        self.slots[index as usize % SLOT_COUNT].clear();
    }

    /// Forget the running maximum (kept separate from the slots so a
    /// reverse-complement retry can rescan into an empty tally).
    pub fn clear_best(&mut self) {
        self.best = None;
        self.ambiguous = false;
    }

    /// Full reset of every slot and the maximum.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear();
        }
        self.clear_best();
    }

    /// True when no slot holds any entry.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_empty())
    }
}
