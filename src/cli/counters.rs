//! Diagnostic counters, returned by the pipeline and logged at end of run.

/// Read-scanning statistics.
#[derive(Debug, Default)]
pub struct ScanCounters {
    /// FASTQ records seen.
    pub total: u64,
    /// Reads with a unique winning placement (two or more agreeing k-mers).
    pub matched: u64,
    /// Reads whose top vote count was tied between placements.
    pub multi: u64,
    /// Reads with no usable placement, including non-ACGT aborts.
    pub nohit: u64,
    /// Unambiguous dictionary hits (direct or neighbor).
    pub unambig_hits: u64,
    /// Hits on dispersed entries; informational only, never voted.
    pub ambig_hits: u64,
    /// Processed reads that covered at least one SNP site.
    pub good_reads: u64,
    /// Reads contributing no site evidence.
    pub bad_reads: u64,
    /// Base observations matching the site's reference allele.
    pub ref_covs: u64,
    /// Base observations matching the site's alternate allele.
    pub alt_covs: u64,
    /// Base observations on a site matching neither allele.
    pub other_covs: u64,
}

impl std::ops::AddAssign for ScanCounters {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.matched += other.matched;
        self.multi += other.multi;
        self.nohit += other.nohit;
        self.unambig_hits += other.unambig_hits;
        self.ambig_hits += other.ambig_hits;
        self.good_reads += other.good_reads;
        self.bad_reads += other.bad_reads;
        self.ref_covs += other.ref_covs;
        self.alt_covs += other.alt_covs;
        self.other_covs += other.other_covs;
    }
}

/// Per-genotype call totals. Ref calls are counted even though only alt
/// and het calls are written out.
#[derive(Debug, Default)]
pub struct CallCounters {
    pub ref_calls: u64,
    pub alt_calls: u64,
    pub het_calls: u64,
}

impl std::ops::AddAssign for CallCounters {
    fn add_assign(&mut self, other: Self) {
        self.ref_calls += other.ref_calls;
        self.alt_calls += other.alt_calls;
        self.het_calls += other.het_calls;
    }
}
