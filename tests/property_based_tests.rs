//! Property-based tests for ordering, suppression, splice preservation, and
//! dimension algebra.

use proptest::prelude::*;

use mirador::diagnostics::{sort_diagnostics, Diagnostic, Guard, Severity};
use mirador::fixer::{apply_fixes, FixMode};
use mirador::mirage::{self, MirageOptions};
use mirador::tree::{SourceTree, SuppressLexicon, SuppressionIndex};
use mirador::units::{Dimension, Ratio};

fn arb_guard() -> impl Strategy<Value = Guard> {
    prop_oneof![
        Just(Guard::Mirage),
        Just(Guard::Leakage),
        Just(Guard::Hypothesis),
        Just(Guard::Unit),
        Just(Guard::Tensor),
    ]
}

fn arb_diagnostic() -> impl Strategy<Value = Diagnostic> {
    (arb_guard(), 1u32..50).prop_map(|(guard, line)| {
        Diagnostic::new(guard, Severity::Warning, line, "finding")
    })
}

proptest! {
    #[test]
    fn sorting_is_idempotent_and_ordered(mut diags in prop::collection::vec(arb_diagnostic(), 0..40)) {
        sort_diagnostics(&mut diags);
        let once = diags.clone();
        sort_diagnostics(&mut diags);
        prop_assert_eq!(&once, &diags);
        for pair in diags.windows(2) {
            prop_assert!(pair[0].sort_key() <= pair[1].sort_key());
        }
    }

    /// An `ignore-<guard>` directive on line L removes exactly the
    /// diagnostics with that guard and line, and nothing else.
    #[test]
    fn suppression_removes_exactly_the_directed_findings(
        directive_line in 1u32..20,
        guard in arb_guard(),
        diags in prop::collection::vec(arb_diagnostic(), 0..30),
    ) {
        let mut lines: Vec<String> = (1..20).map(|_| "x = 1".to_string()).collect();
        lines[directive_line as usize - 1] =
            format!("x = 1  # mirador: ignore-{guard}");
        let source = lines.join("\n") + "\n";

        let tree = SourceTree::parse(&source).unwrap();
        let index = SuppressionIndex::scan(&tree, &SuppressLexicon::default());
        let kept = index.filter(diags.clone());

        for d in &diags {
            let should_drop = d.guard == guard && d.line == directive_line;
            let was_kept = kept.contains(d);
            prop_assert_eq!(was_kept, !should_drop);
        }
    }

    /// The splice only changes bytes inside the flagged call spans.
    #[test]
    fn splice_preserves_bytes_outside_targets(
        prefix_lines in 0usize..8,
        suffix_lines in 0usize..8,
    ) {
        let mut source = String::new();
        for i in 0..prefix_lines {
            source.push_str(&format!("before_{i} = {i}\n"));
        }
        source.push_str("data = np.ones(6)\n");
        source.push_str("m = np.mean(data)\n");
        for i in 0..suffix_lines {
            source.push_str(&format!("after_{i} = {i}\n"));
        }

        let tree = SourceTree::parse(&source).unwrap();
        let diags = mirage::run(&tree, &MirageOptions::default(), Severity::Critical);
        prop_assert_eq!(diags.len(), 1);
        let (start, end) = tree.span(diags[0].fix.as_ref().unwrap().target);

        let outcome = apply_fixes(&source, &diags, FixMode::Write).unwrap();
        let growth = outcome.new_text.len() - (source.len() - (end - start));
        prop_assert_eq!(&outcome.new_text[..start], &source[..start]);
        prop_assert_eq!(&outcome.new_text[start + growth..], &source[end..]);
    }

    #[test]
    fn dimension_mul_div_invert(exps in prop::array::uniform7(-6i32..=6)) {
        let d = Dimension::from_exponents(exps);
        prop_assert_eq!(d.mul(d).div(d), d);
        prop_assert_eq!(d.div(d), Dimension::DIMENSIONLESS);
    }

    #[test]
    fn dimension_pow_roundtrip(exps in prop::array::uniform7(-4i32..=4), n in 1i32..=4) {
        let d = Dimension::from_exponents(exps);
        let scaled = d.powi(n);
        prop_assert_eq!(scaled.pow_ratio(Ratio::new(1, n)), d);
    }

    #[test]
    fn ratio_add_sub_cancel(a in -40i32..=40, b in 1i32..=12, c in -40i32..=40, d in 1i32..=12) {
        let x = Ratio::new(a, b);
        let y = Ratio::new(c, d);
        prop_assert_eq!(x.add(y).sub(y), x);
    }
}
