//! Split assignment.
//!
//! Two policies produce a [`SplitAssignment`]:
//! - explicit membership lists (`<dir>/<split>.txt`, one key per line), and
//! - seeded ratio-based assignment ([`RatioSplitter`]).
//!
//! The ratio split runs in two stages: the keys are shuffled and the
//! remainder (`val + test` share) is cut off from train, then the remainder
//! is shuffled again and divided between val and test at the renormalized
//! ratio. Counts round up in favor of the held-out side, so
//! `(0.7, 0.15, 0.15)` over 1000 keys gives exactly `(700, 150, 150)`.

mod resplit;

pub use resplit::{resplit_yolo_dir, ResplitOptions, ResplitReport};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::error::BoardlabelError;
use crate::ir::SampleKey;

/// Tolerance for the ratio sum.
pub const RATIO_SUM_TOLERANCE: f64 = 1e-5;

// Absorbs float noise such as 0.3 * 1000 = 300.00000000000006.
const COUNT_EPSILON: f64 = 1e-9;

/// A named dataset partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Directory and list-file name of the split.
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Train/val/test shares. Each is finite and non-negative, and they sum to
/// one within [`RATIO_SUM_TOLERANCE`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SplitRatios {
    train: f64,
    val: f64,
    test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self, BoardlabelError> {
        for (name, value) in [("train", train), ("val", val), ("test", test)] {
            if !value.is_finite() || value < 0.0 {
                return Err(BoardlabelError::InvalidRatio {
                    message: format!("{name} ratio must be a finite non-negative number, got {value}"),
                });
            }
        }

        let sum = train + val + test;
        if (sum - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(BoardlabelError::InvalidRatio {
                message: format!(
                    "ratios must sum to 1.0, got {train} + {val} + {test} = {sum}"
                ),
            });
        }

        Ok(Self { train, val, test })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        self.test
    }

    /// Splits this policy produces. Test is present only with a positive share.
    pub fn splits(&self) -> Vec<Split> {
        if self.test > 0.0 {
            vec![Split::Train, Split::Val, Split::Test]
        } else {
            vec![Split::Train, Split::Val]
        }
    }
}

/// A partition of sample keys into splits.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SplitAssignment {
    splits: BTreeMap<Split, Vec<SampleKey>>,
}

impl SplitAssignment {
    /// Keys of `split`, sorted. Empty when the split is absent.
    pub fn keys(&self, split: Split) -> &[SampleKey] {
        self.splits.get(&split).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Splits present in this assignment, in `train, val, test` order.
    pub fn splits(&self) -> Vec<Split> {
        self.splits.keys().copied().collect()
    }

    /// `(split, keys)` pairs in `train, val, test` order.
    pub fn iter(&self) -> impl Iterator<Item = (Split, &[SampleKey])> {
        self.splits
            .iter()
            .map(|(split, keys)| (*split, keys.as_slice()))
    }

    /// Total number of assigned keys.
    pub fn len(&self) -> usize {
        self.splits.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The split holding `key`, if any.
    pub fn split_of(&self, key: &SampleKey) -> Option<Split> {
        self.splits
            .iter()
            .find(|(_, keys)| keys.binary_search(key).is_ok())
            .map(|(split, _)| *split)
    }

    fn insert(&mut self, split: Split, mut keys: Vec<SampleKey>) {
        keys.sort();
        self.splits.insert(split, keys);
    }
}

/// Seeded ratio-based split assigner.
#[derive(Clone, Copy, Debug)]
pub struct RatioSplitter {
    ratios: SplitRatios,
    seed: u64,
}

impl RatioSplitter {
    pub fn new(ratios: SplitRatios, seed: u64) -> Self {
        Self { ratios, seed }
    }

    /// Assign every distinct key to exactly one split.
    ///
    /// The result depends only on the key set, the ratios and the seed:
    /// input order and duplicates do not matter.
    pub fn assign(&self, keys: &[SampleKey]) -> SplitAssignment {
        let mut pool: Vec<SampleKey> = keys
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = pool.len();

        let mut rng = StdRng::seed_from_u64(self.seed);
        pool.shuffle(&mut rng);

        let rest_share = self.ratios.val + self.ratios.test;
        let n_rest = held_out_count(rest_share, n);
        let mut rest = pool.split_off(n - n_rest);

        let n_test = if rest_share > 0.0 {
            held_out_count(self.ratios.test / rest_share, n_rest)
        } else {
            0
        };
        rest.shuffle(&mut rng);
        let test = rest.split_off(n_rest - n_test);

        let mut assignment = SplitAssignment::default();
        assignment.insert(Split::Train, pool);
        assignment.insert(Split::Val, rest);
        if self.ratios.test > 0.0 {
            assignment.insert(Split::Test, test);
        }
        assignment
    }
}

fn held_out_count(share: f64, n: usize) -> usize {
    let count = (share * n as f64 - COUNT_EPSILON).ceil().max(0.0) as usize;
    count.min(n)
}

/// Read explicit split lists from `dir`, one `<split>.txt` per requested split.
///
/// A missing list file is fatal. Blank lines are ignored and a key listed
/// under more than one split stays in the first split that lists it.
pub fn assign_from_lists(dir: &Path, splits: &[Split]) -> Result<SplitAssignment, BoardlabelError> {
    let mut lists = Vec::with_capacity(splits.len());
    for split in splits {
        let path = dir.join(format!("{}.txt", split.name()));
        if !path.is_file() {
            return Err(BoardlabelError::MissingSplitList { path });
        }
        let content = fs::read_to_string(&path).map_err(BoardlabelError::Io)?;
        lists.push((*split, content));
    }

    let mut seen: BTreeMap<SampleKey, Split> = BTreeMap::new();
    let mut assignment = SplitAssignment::default();
    for (split, content) in lists {
        let mut keys = Vec::new();
        for line in content.lines() {
            let key = line.trim();
            if key.is_empty() {
                continue;
            }
            let key = SampleKey::new(key);
            match seen.get(&key) {
                Some(first) if *first == split => {}
                Some(first) => {
                    tracing::warn!(
                        key = %key,
                        "listed in both {first} and {split}; keeping it in {first}"
                    );
                }
                None => {
                    seen.insert(key.clone(), split);
                    keys.push(key);
                }
            }
        }
        assignment.insert(split, keys);
    }

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<SampleKey> {
        (0..n).map(|i| SampleKey::new(format!("img_{i:04}"))).collect()
    }

    fn counts(assignment: &SplitAssignment) -> (usize, usize, usize) {
        (
            assignment.keys(Split::Train).len(),
            assignment.keys(Split::Val).len(),
            assignment.keys(Split::Test).len(),
        )
    }

    #[test]
    fn ratios_must_sum_to_one() {
        assert!(SplitRatios::new(0.7, 0.15, 0.15).is_ok());
        assert!(SplitRatios::new(0.7, 0.15, 0.150001).is_ok());
        assert!(matches!(
            SplitRatios::new(0.7, 0.2, 0.2),
            Err(BoardlabelError::InvalidRatio { .. })
        ));
        assert!(SplitRatios::new(1.2, -0.1, -0.1).is_err());
        assert!(SplitRatios::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn thousand_keys_split_seventy_fifteen_fifteen() {
        let ratios = SplitRatios::new(0.7, 0.15, 0.15).expect("valid ratios");
        let splitter = RatioSplitter::new(ratios, 42);

        let first = splitter.assign(&keys(1000));
        let second = splitter.assign(&keys(1000));

        assert_eq!(counts(&first), (700, 150, 150));
        assert_eq!(first, second);
    }

    #[test]
    fn input_order_does_not_change_assignment() {
        let ratios = SplitRatios::new(0.6, 0.2, 0.2).expect("valid ratios");
        let splitter = RatioSplitter::new(ratios, 7);

        let mut reversed = keys(50);
        reversed.reverse();
        assert_eq!(splitter.assign(&keys(50)), splitter.assign(&reversed));
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        let ratios = SplitRatios::new(0.5, 0.5, 0.0).expect("valid ratios");
        let a = RatioSplitter::new(ratios, 1).assign(&keys(100));
        let b = RatioSplitter::new(ratios, 2).assign(&keys(100));
        assert_ne!(a.keys(Split::Train), b.keys(Split::Train));
    }

    #[test]
    fn zero_test_share_has_no_test_split() {
        let ratios = SplitRatios::new(0.8, 0.2, 0.0).expect("valid ratios");
        let assignment = RatioSplitter::new(ratios, 42).assign(&keys(10));
        assert_eq!(assignment.splits(), vec![Split::Train, Split::Val]);
        assert_eq!(counts(&assignment), (8, 2, 0));
    }

    #[test]
    fn small_sets_round_toward_held_out() {
        let ratios = SplitRatios::new(0.7, 0.15, 0.15).expect("valid ratios");
        let assignment = RatioSplitter::new(ratios, 42).assign(&keys(5));
        // ceil(0.3 * 5) = 2 held out, split evenly.
        assert_eq!(counts(&assignment), (3, 1, 1));
    }

    #[test]
    fn empty_input_yields_empty_splits() {
        let ratios = SplitRatios::new(0.7, 0.15, 0.15).expect("valid ratios");
        let assignment = RatioSplitter::new(ratios, 42).assign(&[]);
        assert!(assignment.is_empty());
        assert_eq!(assignment.splits().len(), 3);
    }

    #[test]
    fn lists_assign_and_keep_first_membership() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("train.txt"), "a\nb\n\nc\n").expect("write train");
        fs::write(temp.path().join("val.txt"), "d\nb\n").expect("write val");

        let assignment =
            assign_from_lists(temp.path(), &[Split::Train, Split::Val]).expect("read lists");
        assert_eq!(
            assignment.keys(Split::Train),
            &[SampleKey::new("a"), SampleKey::new("b"), SampleKey::new("c")]
        );
        assert_eq!(assignment.keys(Split::Val), &[SampleKey::new("d")]);
        assert_eq!(assignment.split_of(&SampleKey::new("b")), Some(Split::Train));
        assert_eq!(assignment.split_of(&SampleKey::new("z")), None);
    }

    #[test]
    fn missing_list_is_fatal() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("train.txt"), "a\n").expect("write train");

        let err = assign_from_lists(temp.path(), &[Split::Train, Split::Val]).unwrap_err();
        match err {
            BoardlabelError::MissingSplitList { path } => {
                assert!(path.ends_with("val.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
