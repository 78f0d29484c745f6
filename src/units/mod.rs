//! Unit guard: dimensional consistency of arithmetic
//!
//! Infers a [`Dimension`] for expressions from explicit declarations,
//! the [`UnitRegistry`], and assignment history, then checks every additive
//! operation (and comparison) for component-wise equality. Multiplicative
//! operations always combine cleanly and only propagate. An operand whose
//! dimension cannot be resolved is unknown and never diagnosed: silence on
//! uncertainty is what keeps the false-positive rate bounded.

mod dimension;
mod registry;

#[cfg(test)]
mod tests;

pub use dimension::{Dimension, Ratio};
pub use registry::{CustomUnit, UnitRegistry};

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, Guard, Severity};
use crate::tree::{NodeId, SourceTree};

/// Where a quantity's dimension came from; declared beats inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Name convention, registry pattern, or propagation
    Inferred,
    /// Explicit annotation such as `x: "m"`
    Declared,
}

#[derive(Debug, Clone, Copy)]
struct Quantity {
    dim: Dimension,
    origin: Origin,
}

/// Check a file for dimensional inconsistencies.
pub fn run(tree: &SourceTree, registry: &UnitRegistry, severity: Severity) -> Vec<Diagnostic> {
    let mut walker = Walker {
        tree,
        registry,
        severity,
        env: HashMap::new(),
        diagnostics: Vec::new(),
    };
    walker.walk();
    walker.diagnostics
}

/// Final dimension bound to each name after walking the file in order.
/// Exposed for verbose output and inspection.
pub fn inferred_dimensions(tree: &SourceTree, registry: &UnitRegistry) -> HashMap<String, Dimension> {
    let mut walker = Walker {
        tree,
        registry,
        severity: Severity::Warning,
        env: HashMap::new(),
        diagnostics: Vec::new(),
    };
    walker.walk();
    walker
        .env
        .into_iter()
        .map(|(name, q)| (name, q.dim))
        .collect()
}

struct Walker<'a> {
    tree: &'a SourceTree,
    registry: &'a UnitRegistry,
    severity: Severity,
    env: HashMap<String, Quantity>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Walker<'a> {
    /// Single pass in pre-order, which is source order: parameters are seen
    /// before the bodies that use them, assignments before later reads.
    fn walk(&mut self) {
        let root = self.tree.root();
        for id in self.tree.descendants(root) {
            match self.tree.kind(id) {
                "function_definition" => self.register_parameters(id),
                "assignment" => self.visit_assignment(id),
                "augmented_assignment" => self.visit_augmented(id),
                "binary_operator" => self.visit_binary(id),
                "comparison_operator" => self.visit_comparison(id),
                _ => {}
            }
        }
    }

    fn register_parameters(&mut self, func: NodeId) {
        let Some(params) = self.tree.child_by_field(func, "parameters") else {
            return;
        };
        for param in self.tree.named_children(params) {
            match self.tree.kind(param) {
                "identifier" => self.register_by_name(param),
                "typed_parameter" | "typed_default_parameter" => {
                    let name = self
                        .tree
                        .named_children(param)
                        .find(|c| self.tree.kind(*c) == "identifier")
                        .or_else(|| self.tree.child_by_field(param, "name"));
                    let declared = self
                        .tree
                        .child_by_field(param, "type")
                        .and_then(|t| self.declared_dimension(t));
                    if let Some(name) = name {
                        let name = self.tree.text(name).to_string();
                        if let Some(dim) = declared {
                            self.env.insert(name, Quantity { dim, origin: Origin::Declared });
                        } else if let Some(dim) = self.registry.resolve(&name) {
                            self.env.insert(name, Quantity { dim, origin: Origin::Inferred });
                        }
                    }
                }
                "default_parameter" => {
                    if let Some(name) = self.tree.child_by_field(param, "name") {
                        self.register_by_name(name);
                    }
                }
                _ => {}
            }
        }
    }

    fn register_by_name(&mut self, ident: NodeId) {
        let name = self.tree.text(ident).to_string();
        if let Some(dim) = self.registry.resolve(&name) {
            self.env.insert(name, Quantity { dim, origin: Origin::Inferred });
        }
    }

    /// An annotation declares a unit when it is a string literal naming one,
    /// e.g. `wavelength: "m"`.
    fn declared_dimension(&self, type_node: NodeId) -> Option<Dimension> {
        let literal = std::iter::once(type_node)
            .chain(self.tree.descendants(type_node))
            .find(|n| self.tree.kind(*n) == "string")?;
        let text = self.tree.text(literal).trim_matches(['"', '\'']).to_string();
        self.registry.resolve_unit_name(&text)
    }

    fn visit_assignment(&mut self, assign: NodeId) {
        let Some(left) = self.tree.child_by_field(assign, "left") else {
            return;
        };
        if self.tree.kind(left) != "identifier" {
            return;
        }
        let name = self.tree.text(left).to_string();

        let declared = self
            .tree
            .child_by_field(assign, "type")
            .and_then(|t| self.declared_dimension(t));
        let value_dim = self
            .tree
            .child_by_field(assign, "right")
            .and_then(|r| self.infer(r));

        if let Some(dim) = declared {
            self.env.insert(name, Quantity { dim, origin: Origin::Declared });
            return;
        }

        // A name that itself implies a unit, assigned a value of a different
        // known dimension, is usually a missed conversion. An earlier explicit
        // declaration takes precedence over the name convention.
        let expected = match self.env.get(&name) {
            Some(q) if q.origin == Origin::Declared => Some(q.dim),
            _ => self.registry.resolve(&name),
        };
        if let (Some(expected), Some(actual)) = (expected, value_dim) {
            if expected != actual {
                let line = self.tree.line(assign);
                self.diagnostics.push(Diagnostic::new(
                    Guard::Unit,
                    self.severity,
                    line,
                    format!(
                        "variable '{name}' suggests dimension {expected} but is assigned a value with dimension {actual}"
                    ),
                ));
            }
        }

        if let Some(dim) = value_dim {
            self.env.insert(name, Quantity { dim, origin: Origin::Inferred });
        } else if let Some(dim) = expected {
            self.env.insert(name, Quantity { dim, origin: Origin::Inferred });
        }
    }

    fn visit_augmented(&mut self, assign: NodeId) {
        let op = self.operator(assign);
        if op != "+=" && op != "-=" {
            return;
        }
        let left = self.tree.child_by_field(assign, "left").and_then(|n| self.infer(n));
        let right = self.tree.child_by_field(assign, "right").and_then(|n| self.infer(n));
        if let (Some(l), Some(r)) = (left, right) {
            if l != r {
                self.diagnostics.push(Diagnostic::new(
                    Guard::Unit,
                    self.severity,
                    self.tree.line(assign),
                    format!("cannot accumulate dimension {r} into a quantity of dimension {l}"),
                ));
            }
        }
    }

    fn visit_binary(&mut self, binop: NodeId) {
        let op = self.operator(binop);
        if op != "+" && op != "-" {
            return;
        }
        let left = self.tree.child_by_field(binop, "left").and_then(|n| self.infer(n));
        let right = self.tree.child_by_field(binop, "right").and_then(|n| self.infer(n));
        if let (Some(l), Some(r)) = (left, right) {
            if l != r {
                let verb = if op == "+" { "add" } else { "subtract" };
                self.diagnostics.push(Diagnostic::new(
                    Guard::Unit,
                    self.severity,
                    self.tree.line(binop),
                    format!("cannot {verb} quantities with dimensions {l} and {r}"),
                ));
            }
        }
    }

    fn visit_comparison(&mut self, cmp: NodeId) {
        let operands: Vec<NodeId> = self.tree.named_children(cmp).collect();
        for pair in operands.windows(2) {
            let left = self.infer(pair[0]);
            let right = self.infer(pair[1]);
            if let (Some(l), Some(r)) = (left, right) {
                if l != r {
                    self.diagnostics.push(Diagnostic::new(
                        Guard::Unit,
                        self.severity,
                        self.tree.line(cmp),
                        format!("comparing quantities with incompatible dimensions: {l} vs {r}"),
                    ));
                }
            }
        }
    }

    fn operator(&self, binop: NodeId) -> &str {
        self.tree
            .child_by_field(binop, "operator")
            .map(|n| self.tree.text(n))
            .unwrap_or("")
    }

    fn infer(&self, node: NodeId) -> Option<Dimension> {
        match self.tree.kind(node) {
            "identifier" => {
                let name = self.tree.text(node);
                self.env
                    .get(name)
                    .map(|q| q.dim)
                    .or_else(|| self.registry.resolve(name))
            }
            "integer" | "float" => Some(Dimension::DIMENSIONLESS),
            "parenthesized_expression" => {
                self.tree.named_children(node).next().and_then(|n| self.infer(n))
            }
            "unary_operator" => self
                .tree
                .child_by_field(node, "argument")
                .and_then(|n| self.infer(n)),
            "attribute" => self
                .tree
                .child_by_field(node, "attribute")
                .and_then(|attr| self.registry.resolve(self.tree.text(attr))),
            "subscript" => self
                .tree
                .child_by_field(node, "value")
                .and_then(|n| self.infer(n)),
            "binary_operator" => self.infer_binary(node),
            "call" => self.infer_call(node),
            _ => None,
        }
    }

    fn infer_binary(&self, binop: NodeId) -> Option<Dimension> {
        let left = self.tree.child_by_field(binop, "left")?;
        let right = self.tree.child_by_field(binop, "right")?;
        match self.operator(binop) {
            "+" | "-" => {
                let l = self.infer(left)?;
                let r = self.infer(right)?;
                if l == r {
                    Some(l)
                } else {
                    None
                }
            }
            "*" => Some(self.infer(left)?.mul(self.infer(right)?)),
            "/" | "//" => Some(self.infer(left)?.div(self.infer(right)?)),
            "**" => {
                let base = self.infer(left)?;
                let exponent = self.constant_exponent(right)?;
                Some(base.powi(exponent))
            }
            _ => None,
        }
    }

    /// Only compile-time-constant integer exponents scale a dimension.
    fn constant_exponent(&self, node: NodeId) -> Option<i32> {
        match self.tree.kind(node) {
            "integer" => self.tree.text(node).parse().ok(),
            "unary_operator" => {
                let inner = self.tree.child_by_field(node, "argument")?;
                let value: i32 = match self.tree.kind(inner) {
                    "integer" => self.tree.text(inner).parse().ok()?,
                    _ => return None,
                };
                match self.operator(node) {
                    "-" => Some(-value),
                    "+" => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn infer_call(&self, call: NodeId) -> Option<Dimension> {
        let func = self.tree.child_by_field(call, "function")?;
        let func_name = match self.tree.kind(func) {
            "identifier" => self.tree.text(func),
            "attribute" => self
                .tree
                .child_by_field(func, "attribute")
                .map(|a| self.tree.text(a))?,
            _ => return None,
        };
        let first_arg = self
            .tree
            .child_by_field(call, "arguments")
            .and_then(|args| {
                self.tree
                    .named_children(args)
                    .find(|a| self.tree.kind(*a) != "keyword_argument")
            });

        match func_name {
            // Transcendental functions require and yield dimensionless values
            "sin" | "cos" | "tan" | "exp" | "log" | "log10" | "log2" => {
                Some(Dimension::DIMENSIONLESS)
            }
            "sqrt" => first_arg.and_then(|a| self.infer(a)).map(Dimension::sqrt),
            // Elementwise and reducing operations preserve the argument's dimension
            "abs" | "mean" | "sum" | "median" | "min" | "max" | "cumsum" | "floor" | "ceil"
            | "round" => first_arg.and_then(|a| self.infer(a)),
            _ => None,
        }
    }
}
