//! Per-file analysis driver
//!
//! Parses each file once, runs every enabled guard as a pure function of the
//! shared tree, merges and sorts the findings, and applies the suppression
//! filter. Guards never see each other's output and carry no state between
//! files, so two runs over the same text and configuration always produce
//! identical diagnostic lists.

use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::diagnostics::{self, Diagnostic, Guard, Severity};
use crate::hypothesis::{self, HypothesisOptions};
use crate::leakage::{self, LeakageOptions};
use crate::mirage::{self, MirageOptions};
use crate::tensor::{self, TensorOptions};
use crate::tree::{SourceTree, SuppressLexicon, SuppressionIndex};
use crate::units::{self, UnitRegistry};

/// Everything one file's analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl AnalysisResult {
    pub fn has_critical(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Critical)
    }
}

/// One configured analysis pipeline, reusable across files. The unit
/// registry and suppression lexicon are built once here, before any
/// parallel fan-out, and are read-only afterwards.
pub struct Analyzer {
    config: Config,
    registry: UnitRegistry,
    lexicon: SuppressLexicon,
    mirage_options: MirageOptions,
    leakage_options: LeakageOptions,
    hypothesis_options: HypothesisOptions,
    tensor_options: TensorOptions,
}

impl Analyzer {
    pub fn new(config: Config) -> Analyzer {
        let registry = config.unit_registry();
        let lexicon = config.suppress_lexicon();
        let mirage_options = config.mirage_options();
        let leakage_options = config.leakage_options();
        let hypothesis_options = config.hypothesis_options();
        let tensor_options = config.tensor_options();
        Analyzer {
            config,
            registry,
            lexicon,
            mirage_options,
            leakage_options,
            hypothesis_options,
            tensor_options,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-file wall-clock budget for the batch driver.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.files.timeout_secs)
    }

    /// Analyze one file's source text.
    ///
    /// A parse failure isolates to this file: the result carries a single
    /// `parse` diagnostic and the error text, and no guard runs.
    pub fn analyze(&self, source: &str) -> AnalysisResult {
        let tree = match SourceTree::parse(source) {
            Ok(tree) => tree,
            Err(e) => {
                return AnalysisResult {
                    diagnostics: vec![Diagnostic::new(
                        Guard::Parse,
                        Severity::Critical,
                        e.line(),
                        format!("file could not be analyzed: {e}"),
                    )],
                    parse_error: Some(e.to_string()),
                };
            }
        };

        let mut diagnostics = Vec::new();
        if self.config.enabled(Guard::Mirage) {
            diagnostics.extend(mirage::run(
                &tree,
                &self.mirage_options,
                self.config.severity(Guard::Mirage),
            ));
        }
        if self.config.enabled(Guard::Leakage) {
            diagnostics.extend(leakage::run(
                &tree,
                &self.leakage_options,
                self.config.severity(Guard::Leakage),
            ));
        }
        if self.config.enabled(Guard::Hypothesis) {
            diagnostics.extend(hypothesis::run(
                &tree,
                &self.hypothesis_options,
                self.config.severity(Guard::Hypothesis),
            ));
        }
        if self.config.enabled(Guard::Unit) {
            diagnostics.extend(units::run(
                &tree,
                &self.registry,
                self.config.severity(Guard::Unit),
            ));
        }
        if self.config.enabled(Guard::Tensor) {
            diagnostics.extend(tensor::run(
                &tree,
                &self.tensor_options,
                self.config.severity(Guard::Tensor),
            ));
        }

        diagnostics::sort_diagnostics(&mut diagnostics);
        let suppression = SuppressionIndex::scan(&tree, &self.lexicon);
        AnalysisResult {
            diagnostics: suppression.filter(diagnostics),
            parse_error: None,
        }
    }
}

/// The dedicated record for a file that exceeded its budget; partial results
/// are never reported.
pub fn timed_out_result(budget: Duration) -> AnalysisResult {
    AnalysisResult {
        diagnostics: vec![Diagnostic::new(
            Guard::Timeout,
            Severity::Critical,
            1,
            format!("analysis timed out after {}s", budget.as_secs()),
        )],
        parse_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAKY: &str = "\
def train(X, y):
    scaler = StandardScaler()
    X_scaled = scaler.fit_transform(X)
    X_train, X_test = train_test_split(X_scaled)
    total = distance_m + time_s
    avg = np.mean(X_scaled)
";

    #[test]
    fn analyze_runs_all_guards_and_sorts() {
        let analyzer = Analyzer::new(Config::default());
        let result = analyzer.analyze(LEAKY);
        assert!(result.parse_error.is_none());

        let guards: Vec<Guard> = result.diagnostics.iter().map(|d| d.guard).collect();
        assert!(guards.contains(&Guard::Leakage));
        assert!(guards.contains(&Guard::Unit));
        assert!(guards.contains(&Guard::Mirage));

        let mut sorted = result.diagnostics.clone();
        diagnostics::sort_diagnostics(&mut sorted);
        assert_eq!(sorted, result.diagnostics);
    }

    #[test]
    fn analysis_is_idempotent() {
        let analyzer = Analyzer::new(Config::default());
        let first = analyzer.analyze(LEAKY);
        let second = analyzer.analyze(LEAKY);
        assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn disabled_guards_produce_nothing() {
        let mut config = Config::default();
        config.guards.leakage.enabled = false;
        config.guards.unit.enabled = false;
        config.guards.mirage.enabled = false;
        let analyzer = Analyzer::new(config);
        assert!(analyzer.analyze(LEAKY).diagnostics.is_empty());
    }

    #[test]
    fn severity_override_applies() {
        let mut config = Config::default();
        config.guards.unit.severity = Some("critical".to_string());
        let analyzer = Analyzer::new(config);
        let result = analyzer.analyze("total = distance_m + time_s\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].severity, Severity::Critical);
    }

    #[test]
    fn parse_failure_yields_single_parse_diagnostic() {
        let analyzer = Analyzer::new(Config::default());
        let result = analyzer.analyze("def broken(:\n    pass\n");
        assert!(result.parse_error.is_some());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].guard, Guard::Parse);
        assert_eq!(result.diagnostics[0].severity, Severity::Critical);
    }

    #[test]
    fn suppression_removes_exactly_the_named_guard_line() {
        let source = "\
total = distance_m + time_s  # mirador: ignore-unit
again = distance_m + time_s
";
        let analyzer = Analyzer::new(Config::default());
        let result = analyzer.analyze(source);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].line, 2);
    }

    #[test]
    fn timed_out_result_is_the_only_record() {
        let result = timed_out_result(Duration::from_secs(10));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].guard, Guard::Timeout);
        assert!(result.diagnostics[0].message.contains("10s"));
    }
}
