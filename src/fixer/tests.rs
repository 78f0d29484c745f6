use super::*;
use crate::diagnostics::Severity;
use crate::mirage::{self, MirageOptions};
use crate::tree::SourceTree;

fn mirage_diagnostics(source: &str) -> Vec<Diagnostic> {
    let tree = SourceTree::parse(source).unwrap();
    mirage::run(&tree, &MirageOptions::default(), Severity::Critical)
}

#[test]
fn mean_call_is_wrapped_in_variation_tensor() {
    let source = "\
data = np.ones((3, 3))
m = np.mean(data, axis=1, keepdims=True)
";
    let diags = mirage_diagnostics(source);
    assert_eq!(diags.len(), 1);

    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert_eq!(outcome.applied, 1);
    assert!(outcome
        .new_text
        .contains("VariationTensor(data, axis=1, keepdims=True).collapse('mean')"));
}

#[test]
fn method_form_threads_receiver_into_template() {
    let source = "\
def summarize(values):
    return values.mean(axis=0)
";
    let diags = mirage_diagnostics(source);
    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert!(outcome
        .new_text
        .contains("VariationTensor(values, axis=0).collapse('mean')"));
}

#[test]
fn bytes_outside_target_spans_are_untouched() {
    let source = "\
# preamble comment   with odd   spacing
scores = [1.0]*999 + [0.0]
avg   =   mean(scores)   # trailing note
tail = 'unchanged'
";
    let diags = mirage_diagnostics(source);
    assert_eq!(diags.len(), 1);
    let spec = diags[0].fix.as_ref().unwrap();

    let tree = SourceTree::parse(source).unwrap();
    let (start, end) = tree.span(spec.target);

    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();

    // Mask the rewritten span in both texts; everything else must be
    // byte-for-byte identical.
    let replacement_len = outcome.new_text.len() - (source.len() - (end - start));
    assert_eq!(&outcome.new_text[..start], &source[..start]);
    assert_eq!(&outcome.new_text[start + replacement_len..], &source[end..]);
}

#[test]
fn fixed_source_reanalyzes_clean() {
    let source = "\
scores = [1.0]*999 + [0.0]
avg = mean(scores)
";
    let diags = mirage_diagnostics(source);
    assert_eq!(diags.len(), 1);

    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    // The rewrite must itself parse and carry no remaining mirages.
    let reanalyzed = mirage_diagnostics(&outcome.new_text);
    assert!(reanalyzed.is_empty(), "diagnostics after fix: {reanalyzed:?}");
}

#[test]
fn multiple_disjoint_fixes_apply_in_one_pass() {
    let source = "\
a = np.zeros(10)
b = np.ones(10)
m1 = np.mean(a)
m2 = np.sum(b)
";
    let diags = mirage_diagnostics(source);
    assert_eq!(diags.len(), 2);

    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert_eq!(outcome.applied, 2);
    assert!(outcome.new_text.contains(".collapse('mean')"));
    assert!(outcome.new_text.contains(".collapse('sum')"));
}

#[test]
fn nested_reduction_targets_overlap_and_fail_loudly() {
    let source = "\
x = np.zeros(10)
v = np.mean(np.cumsum(x).sum())
";
    let diags = mirage_diagnostics(source);
    assert!(diags.len() >= 2, "expected nested findings: {diags:?}");

    let err = apply_fixes(source, &diags, FixMode::Write).unwrap_err();
    assert!(matches!(err, FixError::Overlapping { .. }));
}

#[test]
fn preview_renders_diff_and_write_does_not() {
    let source = "\
data = np.ones(5)
m = np.mean(data)
";
    let diags = mirage_diagnostics(source);

    let preview = apply_fixes(source, &diags, FixMode::Preview).unwrap();
    assert!(preview.diff.contains("-m = np.mean(data)"));
    assert!(preview.diff.contains("+m = VariationTensor(data).collapse('mean')"));

    let write = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert!(write.diff.is_empty());
    assert_eq!(write.new_text, preview.new_text);
}

#[test]
fn interactive_filter_can_reject_every_fix() {
    let source = "\
data = np.ones(5)
m = np.mean(data)
";
    let diags = mirage_diagnostics(source);
    let outcome =
        apply_fixes_filtered(source, &diags, FixMode::Write, |_, _| false).unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.new_text, source);
}

#[test]
fn discretization_fix_uses_discretize_template() {
    let source = "\
levels = np.linspace(0, 1, 5)
q = round(levels)
";
    let diags = mirage_diagnostics(source);
    assert_eq!(diags.len(), 1);
    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert!(outcome
        .new_text
        .contains("VariationTensor(levels).discretize('round')"));
}

#[test]
fn diagnostics_without_fixes_are_ignored() {
    let source = "x = 1\n";
    let diags = vec![Diagnostic::new(
        crate::diagnostics::Guard::Unit,
        Severity::Warning,
        1,
        "no fix attached",
    )];
    let outcome = apply_fixes(source, &diags, FixMode::Write).unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.new_text, source);
}
