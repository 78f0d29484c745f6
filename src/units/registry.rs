//! Unit registry: name -> dimension resolution
//!
//! Resolution order, first hit wins:
//!
//! 1. custom units supplied by configuration
//! 2. physical constants (`c`, `G`, `hbar`, ...)
//! 3. the ML allow-list (`predictions`, `labels`, `indices`, ...), pinned to
//!    dimensionless so natural-language-like identifiers never produce a
//!    spurious physical type
//! 4. built-in variable-name patterns (`distance_m`, `dt`, `velocity`, ...)
//!
//! The registry is built once from configuration before any file is analyzed
//! and is read-only afterwards, so the parallel batch phase shares it freely.

use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::units::dimension::Dimension;

/// A custom unit from configuration.
#[derive(Debug, Clone)]
pub struct CustomUnit {
    pub name: String,
    pub dimension: Dimension,
}

pub struct UnitRegistry {
    custom: HashMap<String, Dimension>,
    constants: HashMap<&'static str, Dimension>,
    dimensionless_names: HashSet<String>,
    patterns: Vec<(Regex, Dimension)>,
    unit_names: HashMap<&'static str, Dimension>,
}

impl UnitRegistry {
    pub fn new(custom_units: Vec<CustomUnit>, extra_dimensionless: &[String]) -> UnitRegistry {
        let mut custom = HashMap::new();
        for unit in custom_units {
            custom.insert(unit.name, unit.dimension);
        }

        let mut dimensionless_names: HashSet<String> =
            ML_DIMENSIONLESS.iter().map(|s| (*s).to_string()).collect();
        dimensionless_names.extend(extra_dimensionless.iter().cloned());

        UnitRegistry {
            custom,
            constants: physical_constants(),
            dimensionless_names,
            patterns: name_patterns(),
            unit_names: unit_names(),
        }
    }

    /// Resolve a variable name to a dimension, if any source claims it.
    pub fn resolve(&self, name: &str) -> Option<Dimension> {
        if let Some(dim) = self.custom.get(name) {
            return Some(*dim);
        }
        if let Some(dim) = self.constants.get(name) {
            return Some(*dim);
        }
        let lowered = name.to_lowercase();
        if self.dimensionless_names.contains(lowered.as_str()) {
            return Some(Dimension::DIMENSIONLESS);
        }
        for (pattern, dim) in &self.patterns {
            if pattern.is_match(&lowered) {
                return Some(*dim);
            }
        }
        None
    }

    /// Resolve an explicit unit name from a declaration (`x: "m"`).
    pub fn resolve_unit_name(&self, unit: &str) -> Option<Dimension> {
        if let Some(dim) = self.custom.get(unit) {
            return Some(*dim);
        }
        self.unit_names.get(unit).copied()
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        UnitRegistry::new(Vec::new(), &[])
    }
}

/// ML-shape names deliberately treated as dimensionless. Without this list,
/// `labels` would pattern-match nothing today but near-miss identifiers
/// (`weights`, `times_seen`) drift into physical types as patterns grow.
const ML_DIMENSIONLESS: &[&str] = &[
    "predictions",
    "preds",
    "labels",
    "targets",
    "logits",
    "probs",
    "probabilities",
    "scores",
    "indices",
    "idx",
    "features",
    "weights",
    "epochs",
    "batch",
    "batch_size",
    "accuracy",
    "loss",
];

fn physical_constants() -> HashMap<&'static str, Dimension> {
    let mut m = HashMap::new();
    m.insert("c", Dimension::velocity());
    // Gravitational constant: L^3 M^-1 T^-2
    m.insert("G", Dimension::from_exponents([3, -1, -2, 0, 0, 0, 0]));
    // Planck constant: L^2 M T^-1
    m.insert("h", Dimension::from_exponents([2, 1, -1, 0, 0, 0, 0]));
    m.insert("hbar", Dimension::from_exponents([2, 1, -1, 0, 0, 0, 0]));
    // Boltzmann constant: L^2 M T^-2 Θ^-1
    m.insert("k_B", Dimension::from_exponents([2, 1, -2, 0, -1, 0, 0]));
    // Elementary charge: T I
    m.insert("e", Dimension::from_exponents([0, 0, 1, 1, 0, 0, 0]));
    m.insert("pi", Dimension::DIMENSIONLESS);
    m.insert("tau", Dimension::DIMENSIONLESS);
    m
}

/// Explicit unit names usable in declarations.
fn unit_names() -> HashMap<&'static str, Dimension> {
    let mut m = HashMap::new();
    for name in ["m", "meter", "metre", "km", "cm", "mm"] {
        m.insert(name, Dimension::length());
    }
    for name in ["kg", "g", "gram"] {
        m.insert(name, Dimension::mass());
    }
    for name in ["s", "sec", "second", "min", "minute", "h", "hour"] {
        m.insert(name, Dimension::time());
    }
    m.insert("A", Dimension::current());
    m.insert("K", Dimension::temperature());
    m.insert("mol", Dimension::amount());
    m.insert("cd", Dimension::luminosity());
    m.insert("N", Dimension::force());
    m.insert("J", Dimension::energy());
    m.insert("W", Dimension::power());
    m.insert("Pa", Dimension::pressure());
    m
}

/// Variable-name conventions. Patterns are matched against the lowercased
/// identifier; word boundaries are underscores or string ends.
fn name_patterns() -> Vec<(Regex, Dimension)> {
    let table: &[(&str, Dimension)] = &[
        (
            r"(?:^|_)(distance|length|height|width|depth|radius|diameter|position|displacement)(?:_|$)",
            Dimension::length(),
        ),
        (r"(?:^|_)(meter|metre)s?(?:_|$)", Dimension::length()),
        (r"(?:^|_)(km|cm|mm|nm|um|m)(?:_|$)", Dimension::length()),
        (r"(?:^|_)(mass)(?:_|$)", Dimension::mass()),
        (r"(?:^|_)(kg|gram|g)s?(?:_|$)", Dimension::mass()),
        (
            r"(?:^|_)(time|duration|period|dt|delta_t|elapsed)(?:_|$)",
            Dimension::time(),
        ),
        (
            r"(?:^|_)(second|sec|s|minute|min|hour|hr)s?(?:_|$)",
            Dimension::time(),
        ),
        (r"(?:^|_)(temp|temperature)(?:_|$)", Dimension::temperature()),
        (r"(?:^|_)(kelvin|celsius|k)(?:_|$)", Dimension::temperature()),
        (
            r"(?:^|_)(velocity|speed|vel|v)(?:_|$)",
            Dimension::velocity(),
        ),
        (r"(?:^|_)(m_per_s|mps)(?:_|$)", Dimension::velocity()),
        (
            r"(?:^|_)(acceleration|accel)(?:_|$)",
            Dimension::acceleration(),
        ),
        (r"(?:^|_)(force|newton)s?(?:_|$)", Dimension::force()),
        (r"(?:^|_)(energy|work|joule)s?(?:_|$)", Dimension::energy()),
        (r"(?:^|_)(power|watt)s?(?:_|$)", Dimension::power()),
        (
            r"(?:^|_)(pressure|stress|pascal)(?:_|$)",
            Dimension::pressure(),
        ),
        (
            r"(?:^|_)(ratio|factor|coefficient|count|index|num|n)(?:_|$)",
            Dimension::DIMENSIONLESS,
        ),
        (
            r"(?:^|_)(probability|prob|p_value|fraction|percent)(?:_|$)",
            Dimension::DIMENSIONLESS,
        ),
    ];
    table
        .iter()
        .map(|(pattern, dim)| {
            (
                Regex::new(pattern).expect("built-in unit pattern must compile"),
                *dim,
            )
        })
        .collect()
}
