//! Taint labels and binding environments for the leakage hunter

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Which side of a train/test split a value landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Train,
    Test,
}

/// Provenance of a data binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Taint {
    /// Un-split dataset: a suspected dataset constructor or a parameter
    Raw,
    /// One side of an observed split
    Split(Side),
    /// Already reported as fitted on contaminated data; silences duplicates
    FittedOnRaw,
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Taint::Raw => f.write_str("raw"),
            Taint::Split(Side::Train) => f.write_str("train"),
            Taint::Split(Side::Test) => f.write_str("test"),
            Taint::FittedOnRaw => f.write_str("fitted-on-raw"),
        }
    }
}

/// The labels currently attached to one binding. A straight-line binding has
/// exactly one label; branch merges union the outcomes, so the worst-case
/// label seen on any branch survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(BTreeSet<Taint>);

impl Labels {
    pub fn empty() -> Labels {
        Labels::default()
    }

    pub fn single(taint: Taint) -> Labels {
        let mut set = BTreeSet::new();
        set.insert(taint);
        Labels(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, taint: Taint) -> bool {
        self.0.contains(&taint)
    }

    pub fn contains_raw(&self) -> bool {
        self.contains(Taint::Raw)
    }

    pub fn contains_test(&self) -> bool {
        self.contains(Taint::Split(Side::Test))
    }

    pub fn contains_fitted(&self) -> bool {
        self.contains(Taint::FittedOnRaw)
    }

    pub fn union(mut self, other: &Labels) -> Labels {
        self.0.extend(other.0.iter().copied());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = Taint> + '_ {
        self.0.iter().copied()
    }
}

/// Name -> labels for one scope. Labels are replaced on reassignment, never
/// accumulated; only branch merges union.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: HashMap<String, Labels>,
}

impl Bindings {
    pub fn new() -> Bindings {
        Bindings::default()
    }

    pub fn get(&self, name: &str) -> Labels {
        self.map.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, name: impl Into<String>, labels: Labels) {
        let name = name.into();
        if labels.is_empty() {
            self.map.remove(&name);
        } else {
            self.map.insert(name, labels);
        }
    }

    /// Union another branch outcome into this one, key by key.
    pub fn merge(&mut self, other: Bindings) {
        for (name, labels) in other.map {
            let merged = self.map.remove(&name).unwrap_or_default().union(&labels);
            self.map.insert(name, merged);
        }
    }
}
