//! Mirage detector: variance-destroying aggregations
//!
//! A "mirage" is a reduction that collapses an array-like value into a
//! scalar (`mean`, `sum`, `argmax`, `argmin`) and silently discards the
//! distribution behind it. Each reduction call site is classified by walking
//! the def-use chain of its data argument backwards through the enclosing
//! scope for a bounded number of hops; provable array origins score high,
//! unknown origins are still flagged at reduced confidence. A nearby
//! variance computation (`std`/`var` on the same data, within a configurable
//! line window and the same scope) suppresses mean/sum findings: the code
//! demonstrably tracks spread, so the reduction is not destroying it.
//!
//! Premature discretization (`int(x)`, `round(x)` on array-like data) is
//! reported through the same path with a `discretize` fix template.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, FixSpec, FixStyle, Guard, Severity};
use crate::tree::{NodeId, SourceTree};

/// Reduction operations that collapse distributions.
const REDUCTIONS: &[&str] = &[
    "mean", "sum", "argmax", "argmin", "nanmean", "nansum", "nanargmax", "nanargmin",
];

/// Bare-call names treated as reductions without a module qualifier.
const BARE_REDUCTIONS: &[&str] = &["mean", "sum", "argmax", "argmin"];

/// Operations that compute spread and therefore preserve uncertainty.
const VARIANCE_OPS: &[&str] = &["std", "var", "nanstd", "nanvar"];

/// Constructor calls whose result is definitely array-like.
const ARRAY_CONSTRUCTORS: &[&str] = &[
    "array", "asarray", "ones", "zeros", "ones_like", "zeros_like", "full", "empty", "arange",
    "linspace", "logspace", "cumsum", "cumprod", "rand", "randn", "randint", "normal", "uniform",
    "random", "choice",
];

/// Module aliases: `alias.mean(x)` reduces its first argument, not the alias.
const MODULE_ALIASES: &[&str] = &["np", "numpy", "torch", "tf", "jnp", "jax", "scipy", "pd", "pandas"];

const DISCRETIZERS: &[&str] = &["int", "round"];

/// Tunables for mirage detection.
#[derive(Debug, Clone)]
pub struct MirageOptions {
    /// Findings below this confidence are dropped; this is the tunable
    /// false-positive ceiling.
    pub min_confidence: f32,
    /// Line distance within which a variance computation on the same data
    /// suppresses a mean/sum finding.
    pub variance_window: u32,
    /// Maximum def-use hops when classifying a data argument.
    pub max_hops: u32,
}

impl Default for MirageOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            variance_window: 10,
            max_hops: 5,
        }
    }
}

/// What the backward def-use walk concluded about a data expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataOrigin {
    /// Built by a known array constructor call
    Constructor,
    /// List literal, comprehension, or list arithmetic
    ListLike,
    /// Parameter annotated as an array type
    AnnotatedArray,
    /// Unannotated parameter
    Parameter,
    Unknown,
}

impl DataOrigin {
    fn confidence(self) -> f32 {
        match self {
            DataOrigin::Constructor | DataOrigin::ListLike | DataOrigin::AnnotatedArray => 0.9,
            DataOrigin::Parameter => 0.7,
            DataOrigin::Unknown => 0.5,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DataOrigin::Constructor => "array constructor",
            DataOrigin::ListLike => "list literal",
            DataOrigin::AnnotatedArray => "annotated array parameter",
            DataOrigin::Parameter => "function parameter",
            DataOrigin::Unknown => "unknown origin",
        }
    }
}

/// How the reduction was spelled; module-qualified calls score slightly
/// higher because the numpy namespace removes naming ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallForm {
    ModuleQualified,
    Method,
    Bare,
}

struct Reduction {
    call: NodeId,
    op: String,
    form: CallForm,
    data: Option<NodeId>,
}

/// Detect variance-destroying reductions and premature discretization.
pub fn run(tree: &SourceTree, options: &MirageOptions, severity: Severity) -> Vec<Diagnostic> {
    let variance_index = collect_variance_context(tree);
    let mut diagnostics = Vec::new();

    for call in tree.nodes_of_kind("call") {
        if let Some(reduction) = classify_reduction(tree, call) {
            if let Some(d) =
                assess_reduction(tree, &reduction, options, severity, &variance_index)
            {
                diagnostics.push(d);
            }
            continue;
        }
        if let Some(d) = assess_discretization(tree, call, options, severity) {
            diagnostics.push(d);
        }
    }

    diagnostics
}

/// `(enclosing function, variable name) -> lines where std/var is computed`.
type VarianceIndex = HashMap<(Option<NodeId>, String), Vec<u32>>;

fn collect_variance_context(tree: &SourceTree) -> VarianceIndex {
    let mut index: VarianceIndex = HashMap::new();
    for call in tree.nodes_of_kind("call") {
        let Some((op, data)) = call_op_and_data(tree, call) else {
            continue;
        };
        if !VARIANCE_OPS.contains(&op) {
            continue;
        }
        let Some(data) = data else { continue };
        if tree.kind(data) != "identifier" {
            continue;
        }
        let key = (tree.enclosing_function(call), tree.text(data).to_string());
        index.entry(key).or_default().push(tree.line(call));
    }
    index
}

/// Resolve a call's operation name and the expression it operates on:
/// `np.mean(x)` -> (`mean`, `x`), `x.mean()` -> (`mean`, `x`),
/// `mean(x)` -> (`mean`, `x`). The fixer reuses this to recover the data
/// argument it threads into the replacement template.
pub(crate) fn call_op_and_data<'t>(
    tree: &'t SourceTree,
    call: NodeId,
) -> Option<(&'t str, Option<NodeId>)> {
    let func = tree.child_by_field(call, "function")?;
    match tree.kind(func) {
        "identifier" => Some((tree.text(func), first_positional_arg(tree, call))),
        "attribute" => {
            let attr = tree.child_by_field(func, "attribute")?;
            let object = tree.child_by_field(func, "object")?;
            let is_module = tree.kind(object) == "identifier"
                && MODULE_ALIASES.contains(&tree.text(object));
            if is_module {
                Some((tree.text(attr), first_positional_arg(tree, call)))
            } else {
                Some((tree.text(attr), Some(object)))
            }
        }
        _ => None,
    }
}

fn first_positional_arg(tree: &SourceTree, call: NodeId) -> Option<NodeId> {
    let args = tree.child_by_field(call, "arguments")?;
    tree.named_children(args)
        .find(|a| tree.kind(*a) != "keyword_argument")
}

fn classify_reduction(tree: &SourceTree, call: NodeId) -> Option<Reduction> {
    let func = tree.child_by_field(call, "function")?;
    match tree.kind(func) {
        "identifier" => {
            let name = tree.text(func);
            if !BARE_REDUCTIONS.contains(&name) {
                return None;
            }
            Some(Reduction {
                call,
                op: name.to_string(),
                form: CallForm::Bare,
                data: first_positional_arg(tree, call),
            })
        }
        "attribute" => {
            let attr = tree.child_by_field(func, "attribute")?;
            let name = tree.text(attr);
            if !REDUCTIONS.contains(&name) {
                return None;
            }
            let object = tree.child_by_field(func, "object")?;
            let is_module = tree.kind(object) == "identifier"
                && MODULE_ALIASES.contains(&tree.text(object));
            if is_module {
                Some(Reduction {
                    call,
                    op: name.to_string(),
                    form: CallForm::ModuleQualified,
                    data: first_positional_arg(tree, call),
                })
            } else {
                Some(Reduction {
                    call,
                    op: name.to_string(),
                    form: CallForm::Method,
                    data: Some(object),
                })
            }
        }
        _ => None,
    }
}

fn assess_reduction(
    tree: &SourceTree,
    reduction: &Reduction,
    options: &MirageOptions,
    severity: Severity,
    variance_index: &VarianceIndex,
) -> Option<Diagnostic> {
    let line = tree.line(reduction.call);

    // mean/sum with tracked spread nearby is a deliberate, informed collapse.
    let preserves_spread = reduction.op.contains("mean") || reduction.op.contains("sum");
    if preserves_spread {
        if let Some(data) = reduction.data {
            if tree.kind(data) == "identifier" {
                let key = (
                    tree.enclosing_function(reduction.call),
                    tree.text(data).to_string(),
                );
                if let Some(lines) = variance_index.get(&key) {
                    if lines
                        .iter()
                        .any(|l| l.abs_diff(line) <= options.variance_window)
                    {
                        return None;
                    }
                }
            }
        }
    }

    let origin = reduction
        .data
        .map(|d| resolve_origin(tree, d, options.max_hops))
        .unwrap_or(DataOrigin::Unknown);
    let mut confidence = origin.confidence();
    if reduction.form == CallForm::ModuleQualified {
        confidence = (confidence + 0.05).min(0.95);
    }
    if confidence < options.min_confidence {
        return None;
    }

    let subject = reduction
        .data
        .map(|d| format!("'{}'", tree.text(d)))
        .unwrap_or_else(|| "its input".to_string());
    let message = format!(
        "{}() collapses {} into a scalar and discards its distribution ({}, confidence {:.2})",
        reduction.op,
        subject,
        origin.describe(),
        confidence
    );

    let fix = FixSpec {
        target: reduction.call,
        op: reduction.op.clone(),
        style: FixStyle::Collapse,
        rationale: format!(
            "wrap the {} in a VariationTensor so variance survives the collapse",
            reduction.op
        ),
    };
    Some(Diagnostic::new(Guard::Mirage, severity, line, message).with_fix(fix))
}

fn assess_discretization(
    tree: &SourceTree,
    call: NodeId,
    options: &MirageOptions,
    severity: Severity,
) -> Option<Diagnostic> {
    let func = tree.child_by_field(call, "function")?;
    if tree.kind(func) != "identifier" || !DISCRETIZERS.contains(&tree.text(func)) {
        return None;
    }
    let data = first_positional_arg(tree, call)?;
    let origin = resolve_origin(tree, data, options.max_hops);
    // int()/round() on scalars is ordinary; only provable arrays are flagged.
    if !matches!(
        origin,
        DataOrigin::Constructor | DataOrigin::ListLike | DataOrigin::AnnotatedArray
    ) {
        return None;
    }
    let op = tree.text(func).to_string();
    if origin.confidence() < options.min_confidence {
        return None;
    }

    let message = format!(
        "{}() prematurely discretizes '{}' ({}, confidence {:.2})",
        op,
        tree.text(data),
        origin.describe(),
        origin.confidence()
    );
    let fix = FixSpec {
        target: call,
        op: op.clone(),
        style: FixStyle::Discretize,
        rationale: "defer discretization so continuous structure is preserved".to_string(),
    };
    Some(Diagnostic::new(Guard::Mirage, severity, tree.line(call), message).with_fix(fix))
}

/// Bounded backward walk over the def-use chain of a data expression.
fn resolve_origin(tree: &SourceTree, expr: NodeId, hops: u32) -> DataOrigin {
    if hops == 0 {
        return DataOrigin::Unknown;
    }
    match tree.kind(expr) {
        "list" | "list_comprehension" => DataOrigin::ListLike,
        "parenthesized_expression" => tree
            .named_children(expr)
            .next()
            .map(|inner| resolve_origin(tree, inner, hops - 1))
            .unwrap_or(DataOrigin::Unknown),
        "binary_operator" => {
            // List arithmetic like `[1.0]*999 + [0.0]` stays list-like.
            let sides = ["left", "right"]
                .iter()
                .filter_map(|f| tree.child_by_field(expr, f));
            for side in sides {
                match resolve_origin(tree, side, hops - 1) {
                    DataOrigin::Unknown | DataOrigin::Parameter => continue,
                    origin => return origin,
                }
            }
            DataOrigin::Unknown
        }
        "call" => {
            let Some(func) = tree.child_by_field(expr, "function") else {
                return DataOrigin::Unknown;
            };
            let name = match tree.kind(func) {
                "identifier" => tree.text(func),
                "attribute" => tree
                    .child_by_field(func, "attribute")
                    .map(|a| tree.text(a))
                    .unwrap_or(""),
                _ => "",
            };
            if ARRAY_CONSTRUCTORS.contains(&name) || name == "list" {
                DataOrigin::Constructor
            } else {
                DataOrigin::Unknown
            }
        }
        "identifier" => resolve_name_origin(tree, expr, hops),
        _ => DataOrigin::Unknown,
    }
}

/// Find the most recent binding of a name before its use, in the same scope.
fn resolve_name_origin(tree: &SourceTree, ident: NodeId, hops: u32) -> DataOrigin {
    let name = tree.text(ident);
    let scope = tree.enclosing_function(ident);

    let mut latest: Option<NodeId> = None;
    for assign in tree.nodes_of_kind("assignment") {
        if assign >= ident {
            break;
        }
        if tree.enclosing_function(assign) != scope {
            continue;
        }
        let Some(left) = tree.child_by_field(assign, "left") else {
            continue;
        };
        if tree.kind(left) == "identifier" && tree.text(left) == name {
            latest = Some(assign);
        }
    }
    if let Some(assign) = latest {
        if let Some(right) = tree.child_by_field(assign, "right") {
            return resolve_origin(tree, right, hops - 1);
        }
    }

    // No assignment in scope: a parameter of the enclosing function?
    if let Some(func) = scope {
        if let Some(params) = tree.child_by_field(func, "parameters") {
            for param in tree.named_children(params) {
                match tree.kind(param) {
                    "identifier" if tree.text(param) == name => return DataOrigin::Parameter,
                    "typed_parameter" | "typed_default_parameter" | "default_parameter" => {
                        let pname = tree
                            .named_children(param)
                            .find(|c| tree.kind(*c) == "identifier")
                            .or_else(|| tree.child_by_field(param, "name"));
                        if pname.map(|p| tree.text(p)) != Some(name) {
                            continue;
                        }
                        let annotated_array = tree
                            .child_by_field(param, "type")
                            .map(|t| {
                                let text = tree.text(t);
                                text.contains("ndarray")
                                    || text.contains("Array")
                                    || text.contains("array")
                                    || text.contains("List")
                                    || text.contains("Sequence")
                            })
                            .unwrap_or(false);
                        return if annotated_array {
                            DataOrigin::AnnotatedArray
                        } else {
                            DataOrigin::Parameter
                        };
                    }
                    _ => {}
                }
            }
        }
    }
    DataOrigin::Unknown
}
