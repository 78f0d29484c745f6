//! Tensor guard: deep-learning gradient pathologies
//!
//! Two pattern checks over the shared tree:
//!
//! 1. A training loop that calls `backward()` but never `zero_grad()` in the
//!    same loop body: gradients accumulate across iterations and every step
//!    after the first descends a corrupted direction.
//! 2. A saturating activation (`Sigmoid`/`Tanh`) inside a deep
//!    `nn.Sequential` stack: gradients vanish through repeated saturation.

use crate::diagnostics::{Diagnostic, Guard, Severity};
use crate::tree::{NodeId, SourceTree};

const SATURATING: &[&str] = &["Sigmoid", "Tanh", "sigmoid", "tanh"];

#[derive(Debug, Clone)]
pub struct TensorOptions {
    /// Sequential stacks at or above this depth are checked for saturating
    /// activations.
    pub min_stack_depth: usize,
}

impl Default for TensorOptions {
    fn default() -> Self {
        Self { min_stack_depth: 5 }
    }
}

pub fn run(tree: &SourceTree, options: &TensorOptions, severity: Severity) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_gradient_accumulation(tree, severity, &mut diagnostics);
    check_saturating_stacks(tree, options, severity, &mut diagnostics);
    diagnostics
}

fn check_gradient_accumulation(tree: &SourceTree, severity: Severity, out: &mut Vec<Diagnostic>) {
    for loop_node in tree
        .nodes_of_kind("for_statement")
        .chain(tree.nodes_of_kind("while_statement"))
    {
        let Some(body) = tree.child_by_field(loop_node, "body") else {
            continue;
        };
        let mut backward_at: Option<NodeId> = None;
        let mut zeroed = false;
        for node in tree.descendants(body) {
            if tree.kind(node) != "call" {
                continue;
            }
            match method_name(tree, node) {
                // Attribute the call to its innermost loop so nested training
                // loops report once.
                Some("backward") if nearest_loop(tree, node) == Some(loop_node) => {
                    backward_at = backward_at.or(Some(node));
                }
                Some("zero_grad") => zeroed = true,
                _ => {}
            }
        }
        if let (Some(call), false) = (backward_at, zeroed) {
            out.push(Diagnostic::new(
                Guard::Tensor,
                severity,
                tree.line(call),
                "backward() in a loop with no zero_grad(); gradients accumulate across iterations",
            ));
        }
    }
}

fn check_saturating_stacks(
    tree: &SourceTree,
    options: &TensorOptions,
    severity: Severity,
    out: &mut Vec<Diagnostic>,
) {
    for call in tree.nodes_of_kind("call") {
        if method_name(tree, call) != Some("Sequential") {
            continue;
        }
        let Some(args) = tree.child_by_field(call, "arguments") else {
            continue;
        };
        let layers: Vec<NodeId> = tree
            .named_children(args)
            .filter(|a| tree.kind(*a) != "keyword_argument")
            .collect();
        let layer_count = layers.len();
        if layer_count < options.min_stack_depth {
            continue;
        }
        for layer in layers {
            if tree.kind(layer) != "call" {
                continue;
            }
            if let Some(name) = method_name(tree, layer) {
                if SATURATING.contains(&name) {
                    out.push(Diagnostic::new(
                        Guard::Tensor,
                        severity,
                        tree.line(layer),
                        format!(
                            "{name}() inside a {}-layer Sequential; saturating activations this deep starve gradients",
                            layer_count
                        ),
                    ));
                }
            }
        }
    }
}

fn nearest_loop(tree: &SourceTree, node: NodeId) -> Option<NodeId> {
    let mut cur = tree.parent(node);
    while let Some(p) = cur {
        match tree.kind(p) {
            "for_statement" | "while_statement" => return Some(p),
            "function_definition" | "class_definition" => return None,
            _ => cur = tree.parent(p),
        }
    }
    None
}

/// Last path component of the callee: `opt.zero_grad` -> `zero_grad`.
fn method_name<'t>(tree: &'t SourceTree, call: NodeId) -> Option<&'t str> {
    let func = tree.child_by_field(call, "function")?;
    match tree.kind(func) {
        "identifier" => Some(tree.text(func)),
        "attribute" => tree.child_by_field(func, "attribute").map(|a| tree.text(a)),
        _ => None,
    }
}
