//! Diagnostic records shared by every guard
//!
//! Each guard is a pure function of a parsed [`crate::tree::SourceTree`]
//! returning a list of [`Diagnostic`]s. The driver merges the lists, applies
//! severity overrides and suppression directives, and sorts by `(line, guard)`
//! so reports are stable across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tree::NodeId;

/// Which analysis produced a diagnostic.
///
/// `Parse` and `Timeout` are the dedicated kinds for a file that could not
/// be analyzed at all; they are not part of the suppression universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// Variance-destroying aggregation (mean/sum/arg-extremum)
    Mirage,
    /// Train/test data contamination
    Leakage,
    /// Uncorrected multiple-hypothesis testing
    Hypothesis,
    /// Dimensional inconsistency
    Unit,
    /// Deep-learning gradient pathology
    Tensor,
    /// File failed to parse
    Parse,
    /// File exceeded its analysis budget
    Timeout,
}

impl Guard {
    /// The five analysis guards, in reporting order. `ignore` (without a
    /// guard suffix) suppresses exactly these.
    pub const ANALYSES: [Guard; 5] = [
        Guard::Mirage,
        Guard::Leakage,
        Guard::Hypothesis,
        Guard::Unit,
        Guard::Tensor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Guard::Mirage => "mirage",
            Guard::Leakage => "leakage",
            Guard::Hypothesis => "hypothesis",
            Guard::Unit => "unit",
            Guard::Tensor => "tensor",
            Guard::Parse => "parse",
            Guard::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Guard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mirage" => Ok(Guard::Mirage),
            "leakage" => Ok(Guard::Leakage),
            "hypothesis" => Ok(Guard::Hypothesis),
            "unit" | "units" => Ok(Guard::Unit),
            "tensor" => Ok(Guard::Tensor),
            other => Err(format!(
                "unknown guard: {other}. Valid: mirage, leakage, hypothesis, unit, tensor"
            )),
        }
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => f.write_str("critical"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            other => Err(format!("unknown severity: {other}. Valid: critical, warning")),
        }
    }
}

/// How a flagged reduction is rewritten by the fix engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStyle {
    /// Wrap in `VariationTensor(data, ...).collapse('<op>')`
    Collapse,
    /// Wrap in `VariationTensor(data).discretize('<op>')`
    Discretize,
}

/// A structured description of a format-preserving rewrite for one call site.
///
/// Created by the Mirage detector alongside its diagnostic, consumed once by
/// the fix engine. `target` identifies the call node in the source tree; the
/// engine re-derives the data/axis/keepdims sub-expressions from the node
/// itself when instantiating the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSpec {
    /// The call node to rewrite
    pub target: NodeId,
    /// Reduction or discretization kind (`mean`, `sum`, `argmax`, `int`, ...)
    pub op: String,
    /// Replacement template family
    pub style: FixStyle,
    /// One-line explanation attached to reports
    pub rationale: String,
}

/// A single finding, produced by exactly one guard and immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub guard: Guard,
    pub severity: Severity,
    /// 1-based source line
    pub line: u32,
    pub message: String,
    /// Present only for findings the fix engine can rewrite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixSpec>,
}

impl Diagnostic {
    pub fn new(guard: Guard, severity: Severity, line: u32, message: impl Into<String>) -> Self {
        Self {
            guard,
            severity,
            line,
            message: message.into(),
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: FixSpec) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Stable report ordering: line first, then guard declaration order.
    pub fn sort_key(&self) -> (u32, Guard) {
        (self.line, self.guard)
    }
}

/// Sort a merged diagnostic list into stable reporting order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.sort_key());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_round_trips_through_str() {
        for guard in Guard::ANALYSES {
            assert_eq!(guard.as_str().parse::<Guard>().unwrap(), guard);
        }
    }

    #[test]
    fn unknown_guard_is_rejected() {
        assert!("gradient".parse::<Guard>().is_err());
    }

    #[test]
    fn diagnostics_sort_by_line_then_guard() {
        let mut diags = vec![
            Diagnostic::new(Guard::Unit, Severity::Warning, 9, "c"),
            Diagnostic::new(Guard::Mirage, Severity::Critical, 9, "b"),
            Diagnostic::new(Guard::Leakage, Severity::Critical, 3, "a"),
        ];
        sort_diagnostics(&mut diags);
        let order: Vec<(u32, Guard)> = diags.iter().map(|d| d.sort_key()).collect();
        assert_eq!(
            order,
            vec![(3, Guard::Leakage), (9, Guard::Mirage), (9, Guard::Unit)]
        );
    }

    #[test]
    fn diagnostic_serializes_with_snake_case_guard() {
        let d = Diagnostic::new(Guard::Mirage, Severity::Critical, 12, "mean() collapses variance");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["guard"], "mirage");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["line"], 12);
        assert!(json.get("fix").is_none());
    }
}
