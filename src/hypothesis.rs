//! Hypothesis guard: uncorrected multiple testing
//!
//! Pattern matcher over the shared tree, same substrate as the mirage
//! detector but without a def-use walk: count recognized statistical test
//! calls, look for any multiple-comparison correction, and flag every test
//! site when the file runs several tests with no correction. A test call
//! inside a loop is flagged on its own: sweeping a test across conditions is
//! the canonical p-hacking shape regardless of how many sites the file has.

use crate::diagnostics::{Diagnostic, Guard, Severity};
use crate::tree::{NodeId, SourceTree};

/// Statistical test entry points (scipy.stats and friends).
const STAT_TESTS: &[&str] = &[
    "ttest_ind",
    "ttest_rel",
    "ttest_1samp",
    "mannwhitneyu",
    "wilcoxon",
    "kruskal",
    "f_oneway",
    "chi2_contingency",
    "pearsonr",
    "spearmanr",
    "ks_2samp",
    "fisher_exact",
];

/// Calls that apply a multiple-comparison correction.
const CORRECTIONS: &[&str] = &[
    "multipletests",
    "bonferroni_correction",
    "fdr_correction",
    "false_discovery_control",
];

#[derive(Debug, Clone)]
pub struct HypothesisOptions {
    /// Number of uncorrected tests at which the family-wise error rate is
    /// considered misleading.
    pub max_uncorrected_tests: usize,
}

impl Default for HypothesisOptions {
    fn default() -> Self {
        Self {
            max_uncorrected_tests: 1,
        }
    }
}

pub fn run(tree: &SourceTree, options: &HypothesisOptions, severity: Severity) -> Vec<Diagnostic> {
    let mut test_sites: Vec<(NodeId, &str)> = Vec::new();
    let mut corrected = false;

    for call in tree.nodes_of_kind("call") {
        let Some(name) = callee_name(tree, call) else {
            continue;
        };
        if STAT_TESTS.contains(&name) {
            test_sites.push((call, name));
        } else if CORRECTIONS.contains(&name) {
            corrected = true;
        }
    }

    let mut diagnostics = Vec::new();
    for (call, name) in &test_sites {
        if in_loop(tree, *call) {
            diagnostics.push(Diagnostic::new(
                Guard::Hypothesis,
                severity,
                tree.line(*call),
                format!(
                    "{name}() runs inside a loop; repeated testing without correction invites p-hacking"
                ),
            ));
        }
    }

    if !corrected && test_sites.len() > options.max_uncorrected_tests {
        let total = test_sites.len();
        for (call, name) in &test_sites {
            if in_loop(tree, *call) {
                continue; // already reported above
            }
            diagnostics.push(Diagnostic::new(
                Guard::Hypothesis,
                severity,
                tree.line(*call),
                format!(
                    "{name}() is one of {total} hypothesis tests with no multiple-comparison correction"
                ),
            ));
        }
    }

    diagnostics
}

fn callee_name<'t>(tree: &'t SourceTree, call: NodeId) -> Option<&'t str> {
    let func = tree.child_by_field(call, "function")?;
    match tree.kind(func) {
        "identifier" => Some(tree.text(func)),
        "attribute" => tree.child_by_field(func, "attribute").map(|a| tree.text(a)),
        _ => None,
    }
}

fn in_loop(tree: &SourceTree, node: NodeId) -> bool {
    let mut cur = tree.parent(node);
    while let Some(p) = cur {
        match tree.kind(p) {
            "for_statement" | "while_statement" => return true,
            "function_definition" | "class_definition" => return false,
            _ => cur = tree.parent(p),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let tree = SourceTree::parse(source).unwrap();
        run(&tree, &HypothesisOptions::default(), Severity::Warning)
    }

    #[test]
    fn single_test_is_fine() {
        assert!(check("p = ttest_ind(a, b)\n").is_empty());
    }

    #[test]
    fn multiple_uncorrected_tests_flag_each_site() {
        let source = "\
p1 = stats.ttest_ind(a, b)
p2 = stats.mannwhitneyu(a, c)
";
        let diags = check(source);
        assert_eq!(diags.len(), 2);
        assert!(diags[0].message.contains("2 hypothesis tests"));
    }

    #[test]
    fn correction_call_silences_the_family() {
        let source = "\
p1 = stats.ttest_ind(a, b)
p2 = stats.mannwhitneyu(a, c)
reject, pvals = multipletests(pvalues)
";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_inside_loop_is_flagged_alone() {
        let source = "\
for col in columns:
    p = stats.ttest_ind(data[col], control)
";
        let diags = check(source);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("inside a loop"));
    }

    #[test]
    fn loop_in_enclosing_function_only_counts_local_loops() {
        let source = "\
for item in items:
    process(item)

def analyze(a, b):
    return stats.ttest_ind(a, b)
";
        assert!(check(source).is_empty());
    }
}
