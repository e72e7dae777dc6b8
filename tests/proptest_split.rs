//! Property tests for the seeded split assigner.

mod proptest_helpers;

use std::collections::BTreeSet;

use boardlabel::ir::SampleKey;
use boardlabel::split::{RatioSplitter, Split, SplitRatios};
use proptest::prelude::*;
use proptest_helpers::{arb_keys, arb_ratios, proptest_config};

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn every_key_lands_in_exactly_one_split(
        keys in arb_keys(200),
        (train, val, test) in arb_ratios(),
        seed in any::<u64>(),
    ) {
        let ratios = SplitRatios::new(train, val, test).expect("ratios sum to one");
        let assignment = RatioSplitter::new(ratios, seed).assign(&keys);

        let distinct: BTreeSet<&SampleKey> = keys.iter().collect();
        let mut assigned = BTreeSet::new();
        for (_, split_keys) in assignment.iter() {
            for key in split_keys {
                prop_assert!(assigned.insert(key), "key {} assigned twice", key);
            }
        }
        prop_assert_eq!(assigned, distinct);
        prop_assert_eq!(assignment.len(), keys.iter().collect::<BTreeSet<_>>().len());
        prop_assert_eq!(assignment.splits().contains(&Split::Test), test > 0.0);
    }

    #[test]
    fn assignment_ignores_input_order(
        keys in arb_keys(100),
        (train, val, test) in arb_ratios(),
        seed in any::<u64>(),
    ) {
        let ratios = SplitRatios::new(train, val, test).expect("ratios sum to one");
        let splitter = RatioSplitter::new(ratios, seed);

        let mut reversed = keys.clone();
        reversed.reverse();
        prop_assert_eq!(splitter.assign(&keys), splitter.assign(&reversed));
    }

    #[test]
    fn held_out_splits_are_never_undersized(
        keys in arb_keys(200),
        (train, val, test) in arb_ratios(),
        seed in any::<u64>(),
    ) {
        let ratios = SplitRatios::new(train, val, test).expect("ratios sum to one");
        let assignment = RatioSplitter::new(ratios, seed).assign(&keys);
        let n = assignment.len() as f64;

        let held_out = assignment.keys(Split::Val).len() + assignment.keys(Split::Test).len();
        prop_assert!(held_out as f64 + 1e-6 >= (val + test) * n);
    }
}
