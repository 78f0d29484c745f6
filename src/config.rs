//! Configuration loading and merging
//!
//! Settings come from `.mirador.toml` (or `--config <path>`) merged over
//! built-in defaults. A malformed override never aborts the run: the bad
//! value is reported once at load time and falls back to its default.
//!
//! ```toml
//! [guards.hypothesis]
//! enabled = false
//!
//! [guards.unit]
//! severity = "critical"
//!
//! [mirage]
//! min_confidence = 0.6
//! variance_window = 6
//!
//! [[units.custom]]
//! name = "flops"
//! exponents = [2, 1, -3, 0, 0, 0, 0]
//!
//! [suppress]
//! marker = "mirador:"
//!
//! [files]
//! ignore_dirs = ["venv", "checkpoints"]
//! timeout_secs = 10
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::diagnostics::{Guard, Severity};
use crate::hypothesis::HypothesisOptions;
use crate::leakage::LeakageOptions;
use crate::mirage::MirageOptions;
use crate::tensor::TensorOptions;
use crate::tree::SuppressLexicon;
use crate::units::{CustomUnit, Dimension, UnitRegistry};

pub const DEFAULT_CONFIG_FILE: &str = ".mirador.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub guards: GuardToggles,
    pub mirage: MirageSection,
    pub leakage: LeakageSection,
    pub hypothesis: HypothesisSection,
    pub tensor: TensorSection,
    pub units: UnitsSection,
    pub suppress: SuppressSection,
    pub files: FilesSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GuardToggles {
    pub mirage: GuardSwitch,
    pub leakage: GuardSwitch,
    pub hypothesis: GuardSwitch,
    pub unit: GuardSwitch,
    pub tensor: GuardSwitch,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardSwitch {
    pub enabled: bool,
    /// `critical` or `warning`; anything else falls back to the guard default
    pub severity: Option<String>,
}

impl Default for GuardSwitch {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirageSection {
    pub min_confidence: f32,
    pub variance_window: u32,
    pub max_hops: u32,
}

impl Default for MirageSection {
    fn default() -> Self {
        let defaults = MirageOptions::default();
        Self {
            min_confidence: defaults.min_confidence,
            variance_window: defaults.variance_window,
            max_hops: defaults.max_hops,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeakageSection {
    pub split_markers: Vec<String>,
    pub fit_methods: Vec<String>,
    pub dataset_prefixes: Vec<String>,
}

impl Default for LeakageSection {
    fn default() -> Self {
        let defaults = LeakageOptions::default();
        Self {
            split_markers: defaults.split_markers,
            fit_methods: defaults.fit_methods,
            dataset_prefixes: defaults.dataset_prefixes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HypothesisSection {
    pub max_uncorrected_tests: usize,
}

impl Default for HypothesisSection {
    fn default() -> Self {
        Self {
            max_uncorrected_tests: HypothesisOptions::default().max_uncorrected_tests,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TensorSection {
    pub min_stack_depth: usize,
}

impl Default for TensorSection {
    fn default() -> Self {
        Self {
            min_stack_depth: TensorOptions::default().min_stack_depth,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnitsSection {
    pub custom: Vec<CustomUnitSpec>,
    /// Extra names pinned dimensionless, merged into the ML allow-list
    pub dimensionless: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomUnitSpec {
    pub name: String,
    /// Seven integer exponents over (L, M, T, I, Θ, N, J)
    pub exponents: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuppressSection {
    pub marker: String,
}

impl Default for SuppressSection {
    fn default() -> Self {
        Self {
            marker: "mirador:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    pub ignore_dirs: Vec<String>,
    /// Per-file analysis budget in seconds
    pub timeout_secs: u64,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            ignore_dirs: vec![
                ".git".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                "__pycache__".to_string(),
                "node_modules".to_string(),
                ".tox".to_string(),
            ],
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration, never failing the run: any problem becomes a
    /// warning and the affected setting keeps its default.
    pub fn load(path: Option<&Path>) -> (Config, Vec<String>) {
        let mut warnings = Vec::new();

        let candidate = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf());

        let mut config = match std::fs::read_to_string(&candidate) {
            Ok(text) => match toml::from_str::<Config>(&text) {
                Ok(config) => config,
                Err(e) => {
                    warnings.push(format!(
                        "failed to parse {}: {e}; using defaults",
                        candidate.display()
                    ));
                    Config::default()
                }
            },
            Err(e) => {
                // An explicitly named file that cannot be read is worth a
                // warning; a missing default file is the normal case.
                if path.is_some() {
                    warnings.push(format!(
                        "failed to read {}: {e}; using defaults",
                        candidate.display()
                    ));
                }
                Config::default()
            }
        };

        warnings.extend(config.validate());
        (config, warnings)
    }

    /// Drop invalid overrides in place, returning one warning per fallback.
    fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        for guard in Guard::ANALYSES {
            let Some(switch) = self.switch_mut(guard) else {
                continue;
            };
            if let Some(text) = &switch.severity {
                if text.parse::<Severity>().is_err() {
                    warnings.push(format!(
                        "invalid severity '{text}' for guard '{guard}'; using default"
                    ));
                    switch.severity = None;
                }
            }
        }

        self.units.custom.retain(|unit| {
            if unit.name.is_empty() {
                warnings.push("custom unit with empty name dropped".to_string());
                return false;
            }
            if unit.exponents.len() != 7 {
                warnings.push(format!(
                    "custom unit '{}' needs exactly 7 exponents, got {}; dropped",
                    unit.name,
                    unit.exponents.len()
                ));
                return false;
            }
            true
        });

        if !(0.0..=1.0).contains(&self.mirage.min_confidence) {
            warnings.push(format!(
                "mirage.min_confidence {} outside [0, 1]; using default",
                self.mirage.min_confidence
            ));
            self.mirage.min_confidence = MirageOptions::default().min_confidence;
        }

        warnings
    }

    fn switch(&self, guard: Guard) -> Option<&GuardSwitch> {
        match guard {
            Guard::Mirage => Some(&self.guards.mirage),
            Guard::Leakage => Some(&self.guards.leakage),
            Guard::Hypothesis => Some(&self.guards.hypothesis),
            Guard::Unit => Some(&self.guards.unit),
            Guard::Tensor => Some(&self.guards.tensor),
            Guard::Parse | Guard::Timeout => None,
        }
    }

    fn switch_mut(&mut self, guard: Guard) -> Option<&mut GuardSwitch> {
        match guard {
            Guard::Mirage => Some(&mut self.guards.mirage),
            Guard::Leakage => Some(&mut self.guards.leakage),
            Guard::Hypothesis => Some(&mut self.guards.hypothesis),
            Guard::Unit => Some(&mut self.guards.unit),
            Guard::Tensor => Some(&mut self.guards.tensor),
            Guard::Parse | Guard::Timeout => None,
        }
    }

    /// Parse/timeout records are not toggleable; the five analyses are.
    pub fn enabled(&self, guard: Guard) -> bool {
        self.switch(guard).map(|s| s.enabled).unwrap_or(true)
    }

    /// Effective severity: the validated override, else the guard default.
    pub fn severity(&self, guard: Guard) -> Severity {
        self.switch(guard)
            .and_then(|s| s.severity.as_deref())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| default_severity(guard))
    }

    pub fn mirage_options(&self) -> MirageOptions {
        MirageOptions {
            min_confidence: self.mirage.min_confidence,
            variance_window: self.mirage.variance_window,
            max_hops: self.mirage.max_hops,
        }
    }

    pub fn leakage_options(&self) -> LeakageOptions {
        LeakageOptions {
            split_markers: self.leakage.split_markers.clone(),
            fit_methods: self.leakage.fit_methods.clone(),
            dataset_prefixes: self.leakage.dataset_prefixes.clone(),
        }
    }

    pub fn hypothesis_options(&self) -> HypothesisOptions {
        HypothesisOptions {
            max_uncorrected_tests: self.hypothesis.max_uncorrected_tests,
        }
    }

    pub fn tensor_options(&self) -> TensorOptions {
        TensorOptions {
            min_stack_depth: self.tensor.min_stack_depth,
        }
    }

    pub fn suppress_lexicon(&self) -> SuppressLexicon {
        SuppressLexicon::new(self.suppress.marker.clone())
    }

    /// Build the process-wide registry; `validate` already dropped malformed
    /// entries, so this cannot fail.
    pub fn unit_registry(&self) -> UnitRegistry {
        let custom = self
            .units
            .custom
            .iter()
            .map(|unit| {
                let mut exponents = [0i32; 7];
                exponents.copy_from_slice(&unit.exponents);
                CustomUnit {
                    name: unit.name.clone(),
                    dimension: Dimension::from_exponents(exponents),
                }
            })
            .collect();
        UnitRegistry::new(custom, &self.units.dimensionless)
    }
}

fn default_severity(guard: Guard) -> Severity {
    match guard {
        Guard::Mirage | Guard::Leakage | Guard::Tensor => Severity::Critical,
        Guard::Hypothesis | Guard::Unit => Severity::Warning,
        Guard::Parse | Guard::Timeout => Severity::Critical,
    }
}
