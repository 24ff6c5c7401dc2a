mod common;

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::BufReader;

    use crate::common::{other_base, random_seq, run_pipeline, snp_line};
    use lava::lava::dict::{Placement, RefDict};
    use lava::lava::kmer_codec::{encode_kmer, reverse_complement};
    use tempfile::tempdir;

    /// Fixture shared by the single-chromosome scenarios: a 1000 bp
    /// pseudo-random reference with one SNP at position 500 (p = 0.99,
    /// q = 0.01) and a 64-base read spanning positions 481..=544, whose
    /// first k-mer covers the SNP at offset 19.
    struct Fixture {
        reference: Vec<u8>,
        alt_allele: u8,
        catalog: String,
        read: Vec<u8>,
    }

    const SITE: usize = 499; // 0-based; catalog position 500
    const READ_START: usize = 480; // read covers 0-based 480..544

    fn fixture() -> Fixture {
        let reference = random_seq(42, 1000);
        let ref_allele = reference[SITE];
        let alt_allele = other_base(ref_allele);
        let catalog = snp_line("chr1", 500, ref_allele, alt_allele, 0.99, 0.01);
        let read = reference[READ_START..READ_START + 64].to_vec();
        Fixture {
            reference,
            alt_allele,
            catalog,
            read,
        }
    }

    /// In-read index of the SNP site.
    const SITE_IN_READ: usize = SITE - READ_START; // 19

    /* --------------------------------------------------------------------- */
    /*  scenario: unique placement, homozygous reference                     */
    /* --------------------------------------------------------------------- */

    #[test]
    fn unique_placement_calls_hom_ref() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let run = run_pipeline(
            dir.path(),
            &[("chr1", &fx.reference)],
            &fx.catalog,
            &[fx.read.clone()],
        );

        assert_eq!(run.summary.scan.total, 1);
        assert_eq!(run.summary.scan.matched, 1);
        assert_eq!(run.summary.scan.ref_covs, 1);
        assert_eq!(run.summary.scan.alt_covs, 0);

        assert_eq!(run.summary.calls.ref_calls, 1);
        assert_eq!(run.summary.calls.het_calls, 0);
        assert_eq!(run.summary.calls.alt_calls, 0);
        // ref calls are suppressed from the text output
        assert!(run.output.is_empty());
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: heterozygous call (and exact per-read counting)            */
    /* --------------------------------------------------------------------- */

    #[test]
    fn balanced_reads_call_het_at_the_right_coordinate() {
        let fx = fixture();
        let mut alt_read = fx.read.clone();
        alt_read[SITE_IN_READ] = fx.alt_allele;

        let mut reads = vec![fx.read.clone(); 10];
        reads.extend(vec![alt_read; 10]);

        let dir = tempdir().unwrap();
        let run = run_pipeline(dir.path(), &[("chr1", &fx.reference)], &fx.catalog, &reads);

        assert_eq!(run.summary.scan.matched, 20);
        // exactly one pileup contribution per read: the double-count
        // guards keep each k-mer's evidence singular
        assert_eq!(run.summary.scan.ref_covs, 10);
        assert_eq!(run.summary.scan.alt_covs, 10);

        assert_eq!(run.summary.calls.het_calls, 1);
        assert_eq!(run.summary.calls.ref_calls, 0);
        assert_eq!(run.summary.calls.alt_calls, 0);

        let lines: Vec<&str> = run.output.lines().collect();
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(fields[0], "chr1");
        assert_eq!(fields[1], "500");
        let confidence: f64 = fields[2].parse().unwrap();
        assert!(confidence > 0.0);
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: reverse-complement retry                                   */
    /* --------------------------------------------------------------------- */

    #[test]
    fn reverse_strand_read_places_on_the_retry() {
        let fx = fixture();
        let rc_read = reverse_complement(&fx.read).unwrap();

        let dir = tempdir().unwrap();
        let run = run_pipeline(
            dir.path(),
            &[("chr1", &fx.reference)],
            &fx.catalog,
            &[rc_read],
        );

        assert_eq!(run.summary.scan.matched, 1);
        // exactly one pileup update despite the two passes
        assert_eq!(run.summary.scan.ref_covs, 1);
        assert_eq!(run.summary.calls.ref_calls, 1);
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: ambiguous k-mer resolved through the aux table             */
    /* --------------------------------------------------------------------- */

    #[test]
    fn aux_candidates_lose_to_the_corroborated_placement() {
        // chr1 layout: 200 random | repeat (32) | 100 random | repeat | 232
        // random. The repeat sits at 1-based 201 and 333; a SNP at 240
        // falls under the read's second, unique k-mer.
        let repeat = random_seq(105, 32);
        let mut reference = random_seq(101, 200);
        reference.extend_from_slice(&repeat);
        reference.extend_from_slice(&random_seq(102, 100));
        reference.extend_from_slice(&repeat);
        reference.extend_from_slice(&random_seq(103, 232));

        let site = 239usize; // 0-based; catalog position 240
        let ref_allele = reference[site];
        let alt_allele = other_base(ref_allele);
        let catalog = snp_line("chr1", 240, ref_allele, alt_allele, 0.99, 0.01);

        // repeat k-mer + the unique k-mer right after it
        let read = reference[200..264].to_vec();

        let dir = tempdir().unwrap();
        let run = run_pipeline(dir.path(), &[("chr1", &reference)], &catalog, &[read]);

        // the aux row injected a decoy candidate (333), but only 201 is
        // corroborated by the second k-mer
        assert_eq!(run.summary.scan.matched, 1);
        assert_eq!(run.summary.scan.multi, 0);
        assert_eq!(run.summary.scan.ref_covs, 1);
        assert_eq!(run.summary.calls.ref_calls, 1);

        // and the repeat really went through the aux table
        let mut reader = BufReader::new(File::open(&run.refdict).unwrap());
        let dict = RefDict::load(&mut reader).unwrap();
        let (kmer, _) = encode_kmer(&repeat);
        let entry = dict.lookup(kmer).unwrap();
        let Placement::Aux(row) = entry.placement else {
            panic!("repeat should be aux, got {:?}", entry.placement);
        };
        let positions: Vec<u32> = dict.aux_row(row).unwrap().positions().collect();
        assert_eq!(positions, vec![201, 333]);
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: Hamming-1 rescue of a sequencing error                     */
    /* --------------------------------------------------------------------- */

    #[test]
    fn one_error_read_is_rescued_by_a_neighbor() {
        let fx = fixture();
        let mut read = fx.read.clone();
        // an error at a non-SNP base of the first k-mer
        read[5] = other_base(read[5]);

        let dir = tempdir().unwrap();
        let run = run_pipeline(
            dir.path(),
            &[("chr1", &fx.reference)],
            &fx.catalog,
            &[read],
        );

        assert_eq!(run.summary.scan.matched, 1);
        // the pileup was updated from the corrected k-mer
        assert_eq!(run.summary.scan.ref_covs, 1);
        assert_eq!(run.summary.scan.alt_covs, 0);
        assert_eq!(run.summary.calls.ref_calls, 1);
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: double-count guards                                        */
    /* --------------------------------------------------------------------- */

    #[test]
    fn single_kmer_reads_cannot_confirm_themselves() {
        // One k-mer casts one vote, whichever allele it carries: the
        // SNP-offset guard stops the alt-restoring neighbor, and the
        // pileup guard stops the ref-restoring neighbor. One vote is
        // never enough to place a read.
        let fx = fixture();
        let ref_read = fx.reference[READ_START..READ_START + 32].to_vec();
        let mut alt_read = ref_read.clone();
        alt_read[SITE_IN_READ] = fx.alt_allele;

        let dir = tempdir().unwrap();
        let run = run_pipeline(
            dir.path(),
            &[("chr1", &fx.reference)],
            &fx.catalog,
            &[ref_read, alt_read],
        );

        assert_eq!(run.summary.scan.total, 2);
        assert_eq!(run.summary.scan.matched, 0);
        assert_eq!(run.summary.scan.nohit, 2);
        assert_eq!(run.summary.scan.ref_covs, 0);
        assert_eq!(run.summary.scan.alt_covs, 0);
        assert!(run.output.is_empty());
    }

    /* --------------------------------------------------------------------- */
    /*  scenario: multi-chromosome output mapping                            */
    /* --------------------------------------------------------------------- */

    #[test]
    fn absolute_positions_map_back_through_the_chrlens_list() {
        let chr1 = random_seq(201, 100);
        let chr2 = random_seq(202, 100);

        let site = 49usize; // chr2, 0-based; catalog position 50
        let ref_allele = chr2[site];
        let alt_allele = other_base(ref_allele);
        let catalog = snp_line("chr2", 50, ref_allele, alt_allele, 0.99, 0.01);

        // 64-base read on chr2 covering the site in its second k-mer
        let mut read = chr2[16..80].to_vec();
        read[site - 16] = alt_allele;
        let reads = vec![read; 10];

        let dir = tempdir().unwrap();
        let run = run_pipeline(
            dir.path(),
            &[("chr1", &chr1), ("chr2", &chr2)],
            &catalog,
            &reads,
        );

        assert_eq!(run.summary.scan.matched, 10);
        assert_eq!(run.summary.scan.alt_covs, 10);
        assert_eq!(run.summary.calls.alt_calls, 1);

        // absolute position 150 prints as chr2 offset 50
        let lines: Vec<&str> = run.output.lines().collect();
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(&fields[..2], &["chr2", "50"]);
        assert!(fields[2].parse::<f64>().unwrap() > 0.0);
    }

    /* --------------------------------------------------------------------- */
    /*  boundaries: short reads and trailing bases                           */
    /* --------------------------------------------------------------------- */

    #[test]
    fn short_reads_and_lone_kmers_yield_nothing() {
        let fx = fixture();
        let reads = vec![
            fx.reference[READ_START..READ_START + 20].to_vec(), // < 32: no k-mers
            fx.reference[READ_START..READ_START + 40].to_vec(), // one k-mer, suffix ignored
        ];

        let dir = tempdir().unwrap();
        let run = run_pipeline(dir.path(), &[("chr1", &fx.reference)], &fx.catalog, &reads);

        assert_eq!(run.summary.scan.total, 2);
        assert_eq!(run.summary.scan.matched, 0);
        assert_eq!(run.summary.scan.nohit, 2);
        assert!(run.output.is_empty());
    }
}
