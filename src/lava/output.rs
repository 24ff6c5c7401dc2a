//! Mapping absolute positions back to chromosome coordinates and writing
//! the result lines.

use std::io::Write;

use anyhow::{Context, Result};

use crate::cli::counters::CallCounters;
use crate::lava::genotype::{Genotype, GenotypeModel};
use crate::lava::pileup::PileupTable;

/// Insertion-ordered chromosome name/length list, used only at output
/// time. Positions are absolute and 1-based across the concatenated
/// reference, in this list's order.
pub struct ChromLengths {
    entries: Vec<(String, u64)>,
}

impl ChromLengths {
    pub fn new(entries: Vec<(String, u64)>) -> Self {
        ChromLengths { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Translate an absolute 1-based position into (name, 1-based offset)
    /// by subtracting chromosome lengths in order. `None` when the
    /// position lies beyond the final chromosome.
    pub fn locate(&self, abs_pos: u64) -> Option<(&str, u64)> {
        let mut index = abs_pos;
        for (name, len) in &self.entries {
            if index <= *len {
                return Some((name.as_str(), index));
            }
            index -= len;
        }
        None
    }
}

/// Call every pileup site in increasing position order and write one
/// `"<chr> <pos> <confidence>"` line per alt or het call. Ref calls are
/// tallied but not written; no-calls are skipped.
pub fn write_calls<W: Write>(
    pileup: &PileupTable,
    model: &GenotypeModel,
    chrlens: &ChromLengths,
    out: &mut W,
) -> Result<CallCounters> {
    let mut counters = CallCounters::default();

    for (abs_pos, entry) in pileup.sites() {
        let call = model.call(entry.ref_cnt, entry.alt_cnt, entry.ref_freq, entry.alt_freq);

        let emit = match call.genotype {
            Genotype::None => continue,
            Genotype::Ref => {
                counters.ref_calls += 1;
                false
            }
            Genotype::Het => {
                counters.het_calls += 1;
                true
            }
            Genotype::Alt => {
                counters.alt_calls += 1;
                true
            }
        };

        if emit {
            let Some((name, index)) = chrlens.locate(abs_pos) else {
                log::warn!("site at absolute position {abs_pos} is past the chrlens list");
                continue;
            };
            writeln!(out, "{} {} {:.12e}", name, index, call.confidence)
                .context("writing call line")?;
        }
    }

    Ok(counters)
}
