//! Auto-fix transform engine for mirage findings
//!
//! Rewrites only the byte spans of flagged call nodes, leaving every other
//! byte of the file untouched: the splice walks the fix targets in ascending
//! span order and copies the original text verbatim between them. Overlapping
//! targets (e.g. a reduction nested inside another flagged reduction) are an
//! invariant violation and abort the whole rewrite for the file; a partial or
//! arbitrarily-ordered rewrite is never emitted.
//!
//! Dry-run and interactive confirmation are thin wrappers over the same
//! rebuild: dry-run renders the unified diff without writing anything, and
//! interactive mode filters the fix list through a per-fix approval callback
//! before the splice.

#[cfg(test)]
mod tests;

use similar::TextDiff;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, FixSpec, FixStyle};
use crate::mirage;
use crate::tree::{NodeId, ParseError, SourceTree};

/// Whether the caller intends to persist the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMode {
    /// Dry run: render the would-be diff, write nothing.
    Preview,
    /// Produce the new text for the caller to write out.
    Write,
}

/// Result of a rewrite. `diff` is rendered in [`FixMode::Preview`] and empty
/// in [`FixMode::Write`].
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub new_text: String,
    pub diff: String,
    pub applied: usize,
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("overlapping fix targets at lines {first} and {second}; refusing to rewrite")]
    Overlapping { first: u32, second: u32 },
    #[error("fix target at line {line} is not a rewritable call")]
    InvalidTarget { line: u32 },
    #[error("source failed to parse: {0}")]
    Unparseable(#[from] ParseError),
}

/// Apply every fix carried by `diagnostics` to `source`.
pub fn apply_fixes(
    source: &str,
    diagnostics: &[Diagnostic],
    mode: FixMode,
) -> Result<FixOutcome, FixError> {
    apply_fixes_filtered(source, diagnostics, mode, |_, _| true)
}

/// Same rebuild, but each fix is offered to `approve` (diagnostic plus the
/// rendered replacement text) before inclusion. Backs `--interactive`.
pub fn apply_fixes_filtered(
    source: &str,
    diagnostics: &[Diagnostic],
    mode: FixMode,
    mut approve: impl FnMut(&Diagnostic, &str) -> bool,
) -> Result<FixOutcome, FixError> {
    // Parsing is deterministic, so node ids from the analysis tree resolve
    // identically here; the kind check below catches a mismatched source.
    let tree = SourceTree::parse(source)?;

    let mut patches: Vec<Patch> = Vec::new();
    for diagnostic in diagnostics {
        let Some(spec) = &diagnostic.fix else { continue };
        let patch = render_patch(&tree, spec)?;
        if approve(diagnostic, &patch.replacement) {
            patches.push(patch);
        }
    }

    patches.sort_by_key(|p| p.start);
    for pair in patches.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(FixError::Overlapping {
                first: pair[0].line,
                second: pair[1].line,
            });
        }
    }

    let mut new_text = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for patch in &patches {
        new_text.push_str(&source[cursor..patch.start]);
        new_text.push_str(&patch.replacement);
        cursor = patch.end;
    }
    new_text.push_str(&source[cursor..]);

    let diff = match mode {
        FixMode::Preview => render_diff(source, &new_text),
        FixMode::Write => String::new(),
    };

    Ok(FixOutcome {
        new_text,
        diff,
        applied: patches.len(),
    })
}

struct Patch {
    start: usize,
    end: usize,
    line: u32,
    replacement: String,
}

fn render_patch(tree: &SourceTree, spec: &FixSpec) -> Result<Patch, FixError> {
    let target = spec.target;
    if target.0 as usize >= tree.node_count() || tree.kind(target) != "call" {
        return Err(FixError::InvalidTarget {
            line: line_or_zero(tree, target),
        });
    }
    let line = tree.line(target);
    let (_, data) =
        mirage::call_op_and_data(tree, target).ok_or(FixError::InvalidTarget { line })?;
    let data = data.ok_or(FixError::InvalidTarget { line })?;

    let replacement = match spec.style {
        FixStyle::Collapse => {
            // Thread the original axis/keepdims arguments through verbatim.
            let kwargs: Vec<&str> = keyword_args(tree, target)
                .into_iter()
                .filter(|(name, _)| *name == "axis" || *name == "keepdims")
                .map(|(_, text)| text)
                .collect();
            let mut inner = tree.text(data).to_string();
            for kw in kwargs {
                inner.push_str(", ");
                inner.push_str(kw);
            }
            format!("VariationTensor({inner}).collapse('{}')", spec.op)
        }
        FixStyle::Discretize => {
            format!("VariationTensor({}).discretize('{}')", tree.text(data), spec.op)
        }
    };

    let (start, end) = tree.span(target);
    Ok(Patch {
        start,
        end,
        line,
        replacement,
    })
}

fn keyword_args<'t>(tree: &'t SourceTree, call: NodeId) -> Vec<(&'t str, &'t str)> {
    let Some(args) = tree.child_by_field(call, "arguments") else {
        return Vec::new();
    };
    tree.named_children(args)
        .filter(|a| tree.kind(*a) == "keyword_argument")
        .filter_map(|kw| {
            let name = tree.child_by_field(kw, "name")?;
            Some((tree.text(name), tree.text(kw)))
        })
        .collect()
}

fn line_or_zero(tree: &SourceTree, id: NodeId) -> u32 {
    if (id.0 as usize) < tree.node_count() {
        tree.line(id)
    } else {
        0
    }
}

fn render_diff(original: &str, fixed: &str) -> String {
    TextDiff::from_lines(original, fixed)
        .unified_diff()
        .context_radius(3)
        .header("original", "fixed")
        .to_string()
}
