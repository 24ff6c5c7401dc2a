#[cfg(test)]
mod tests {
    use lava::lava::index_table::{IndexTable, SLOT_COUNT};

    /* --------------------------------------------------------------------- */
    /*  best / ambiguous tracking                                            */
    /* --------------------------------------------------------------------- */

    #[test]
    fn single_index_is_unique_best() {
        let mut t = IndexTable::new();
        t.add(400);
        let best = t.best().unwrap();
        assert_eq!(best.index, 400);
        assert_eq!(best.freq, 1);
        assert!(!t.is_ambiguous());
    }

    #[test]
    fn equal_frequencies_mark_a_tie() {
        let mut t = IndexTable::new();
        t.add(400);
        t.add(700);
        assert!(t.is_ambiguous());
        assert_eq!(t.best().unwrap().freq, 1);
    }

    #[test]
    fn reincrementing_the_best_restores_unique_max() {
        let mut t = IndexTable::new();
        t.add(400);
        t.add(700); // tie at freq 1
        assert!(t.is_ambiguous());
        t.add(400); // best pulls ahead again
        assert!(!t.is_ambiguous());
        let best = t.best().unwrap();
        assert_eq!(best.index, 400);
        assert_eq!(best.freq, 2);
    }

    #[test]
    fn higher_frequency_takes_over() {
        let mut t = IndexTable::new();
        t.add(400);
        t.add(700);
        t.add(700);
        let best = t.best().unwrap();
        assert_eq!(best.index, 700);
        assert_eq!(best.freq, 2);
        assert!(!t.is_ambiguous());
    }

    #[test]
    fn best_always_carries_the_max_frequency() {
        let mut t = IndexTable::new();
        let votes = [5u32, 9, 5, 13, 9, 5, 13, 13, 13];
        // expected (best index, best freq, ambiguous) after each vote
        let expect = [
            (5, 1, false),
            (5, 1, true),
            (5, 2, false),
            (5, 2, false),
            (5, 2, true),
            (5, 3, false),
            (5, 3, false),
            (5, 3, true),
            (13, 4, false),
        ];
        for (&v, &(index, freq, ambiguous)) in votes.iter().zip(expect.iter()) {
            t.add(v);
            let best = t.best().unwrap();
            assert_eq!((best.index, best.freq, t.is_ambiguous()), (index, freq, ambiguous));
        }
    }

    /* --------------------------------------------------------------------- */
    /*  slot collisions                                                      */
    /* --------------------------------------------------------------------- */

    #[test]
    fn colliding_indices_stay_distinct() {
        let mut t = IndexTable::new();
        let a = 42u32;
        let b = a + SLOT_COUNT as u32; // same slot, different index
        t.add(a);
        t.add(b);
        t.add(b);
        let best = t.best().unwrap();
        assert_eq!(best.index, b);
        assert_eq!(best.freq, 2);
    }

    /* --------------------------------------------------------------------- */
    /*  scrubbing                                                            */
    /* --------------------------------------------------------------------- */

    #[test]
    fn clear_index_for_every_vote_restores_empty_state() {
        let mut t = IndexTable::new();
        let votes = [400u32, 400, 700, 1009 + 400, 250];
        for &v in &votes {
            t.add(v);
        }
        assert!(!t.is_empty());
        for &v in &votes {
            t.clear_index(v);
        }
        t.clear_best();
        assert!(t.is_empty());
        assert!(t.best().is_none());
        assert!(!t.is_ambiguous());

        // the scrubbed table behaves like a fresh one
        t.add(900);
        let best = t.best().unwrap();
        assert_eq!(best.index, 900);
        assert_eq!(best.freq, 1);
    }

    #[test]
    fn full_clear_resets_everything() {
        let mut t = IndexTable::new();
        for v in 0..100u32 {
            t.add(v);
        }
        t.clear();
        assert!(t.is_empty());
        assert!(t.best().is_none());
    }
}
