//! Leakage hunter: train/test contamination via taint analysis
//!
//! Tracks the provenance of data bindings through one function body (or the
//! module top level) in statement order. Parameters and suspected dataset
//! constructors start [`Taint::Raw`]; an observed split relabels the unpacked
//! names; a `fit`-family call whose receiver or argument is still raw, or is
//! the test partition, is a critical finding. After a flagged call the
//! receiver binding becomes [`Taint::FittedOnRaw`] so the same contaminated
//! object is reported once, not at every downstream use.
//!
//! The analysis is deliberately not control-flow complete: each branch of a
//! conditional is walked once and the outcomes are unioned at the merge
//! point, and loop bodies are walked once with no fixpoint. Leakage that only
//! materializes on a second loop iteration is therefore missed; tightening
//! this would change the detector's precision/recall contract, so the
//! approximation is kept and tested as-is. Calls into functions this file
//! cannot resolve are treated as identity over their arguments, the most
//! permissive (lowest-false-positive) choice.

mod state;

#[cfg(test)]
mod tests;

pub use state::{Bindings, Labels, Side, Taint};

use crate::diagnostics::{Diagnostic, Guard, Severity};
use crate::tree::{NodeId, SourceTree};

/// Tunables for leakage detection.
#[derive(Debug, Clone)]
pub struct LeakageOptions {
    /// Substrings identifying a split call (`train_test_split`, ...)
    pub split_markers: Vec<String>,
    /// Method names that fit an estimator to data
    pub fit_methods: Vec<String>,
    /// Call-name prefixes that produce a fresh, un-split dataset
    pub dataset_prefixes: Vec<String>,
}

impl Default for LeakageOptions {
    fn default() -> Self {
        Self {
            split_markers: vec!["train_test_split".to_string()],
            fit_methods: vec![
                "fit".to_string(),
                "fit_transform".to_string(),
                "fit_predict".to_string(),
                "fit_resample".to_string(),
            ],
            dataset_prefixes: vec![
                "load_".to_string(),
                "read_".to_string(),
                "fetch_".to_string(),
                "make_".to_string(),
            ],
        }
    }
}

/// Detect train/test contamination in every scope of the file.
pub fn run(tree: &SourceTree, options: &LeakageOptions, severity: Severity) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    // Module top level: no parameters, datasets appear via constructors.
    let mut module_env = Bindings::new();
    let mut walker = Walker {
        tree,
        options,
        severity,
        diagnostics: &mut diagnostics,
    };
    walker.walk_block(tree.root(), &mut module_env);

    // Each function body is its own scope with parameters starting Raw.
    for func in tree.nodes_of_kind("function_definition") {
        let mut env = Bindings::new();
        seed_parameters(tree, func, &mut env);
        if let Some(body) = tree.child_by_field(func, "body") {
            let mut walker = Walker {
                tree,
                options,
                severity,
                diagnostics: &mut diagnostics,
            };
            walker.walk_block(body, &mut env);
        }
    }

    diagnostics
}

fn seed_parameters(tree: &SourceTree, func: NodeId, env: &mut Bindings) {
    let Some(params) = tree.child_by_field(func, "parameters") else {
        return;
    };
    for param in tree.named_children(params) {
        let name = match tree.kind(param) {
            "identifier" => Some(tree.text(param)),
            "typed_parameter" | "typed_default_parameter" | "default_parameter" => tree
                .named_children(param)
                .find(|c| tree.kind(*c) == "identifier")
                .or_else(|| tree.child_by_field(param, "name"))
                .map(|n| tree.text(n)),
            _ => None,
        };
        if let Some(name) = name {
            if name != "self" && name != "cls" {
                env.set(name, Labels::single(Taint::Raw));
            }
        }
    }
}

struct Walker<'a> {
    tree: &'a SourceTree,
    options: &'a LeakageOptions,
    severity: Severity,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Walker<'a> {
    fn walk_block(&mut self, block: NodeId, env: &mut Bindings) {
        let children: Vec<NodeId> = self.tree.named_children(block).collect();
        for stmt in children {
            self.walk_statement(stmt, env);
        }
    }

    fn walk_statement(&mut self, stmt: NodeId, env: &mut Bindings) {
        match self.tree.kind(stmt) {
            // Nested scopes are analyzed separately.
            "function_definition" | "class_definition" | "decorated_definition" => {}
            "expression_statement" => {
                let children: Vec<NodeId> = self.tree.named_children(stmt).collect();
                for child in children {
                    match self.tree.kind(child) {
                        "assignment" => self.handle_assignment(child, env),
                        "augmented_assignment" => self.handle_augmented(child, env),
                        _ => {
                            self.eval(child, env);
                        }
                    }
                }
            }
            "if_statement" => self.handle_if(stmt, env),
            "for_statement" => self.handle_for(stmt, env),
            "while_statement" => {
                if let Some(cond) = self.tree.child_by_field(stmt, "condition") {
                    self.eval(cond, env);
                }
                if let Some(body) = self.tree.child_by_field(stmt, "body") {
                    // Walked once, no fixpoint.
                    self.walk_block(body, env);
                }
            }
            "with_statement" | "try_statement" => {
                // Bodies and handler clauses execute in textual order here.
                let children: Vec<NodeId> = self.tree.named_children(stmt).collect();
                for child in children {
                    match self.tree.kind(child) {
                        "block" => self.walk_block(child, env),
                        "except_clause" | "finally_clause" | "else_clause" => {
                            let blocks: Vec<NodeId> = self
                                .tree
                                .named_children(child)
                                .filter(|c| self.tree.kind(*c) == "block")
                                .collect();
                            for block in blocks {
                                self.walk_block(block, env);
                            }
                        }
                        "with_clause" => {
                            self.eval(child, env);
                        }
                        _ => {}
                    }
                }
            }
            _ => {
                // return / assert / raise / ...: evaluate for fit calls.
                let children: Vec<NodeId> = self.tree.named_children(stmt).collect();
                for child in children {
                    self.eval(child, env);
                }
            }
        }
    }

    fn handle_if(&mut self, stmt: NodeId, env: &mut Bindings) {
        if let Some(cond) = self.tree.child_by_field(stmt, "condition") {
            self.eval(cond, env);
        }
        let base = env.clone();
        // The pre-branch state stays in the union: with a non-exhaustive
        // conditional the fallthrough labels survive the merge.
        let mut merged = base.clone();
        if let Some(consequence) = self.tree.child_by_field(stmt, "consequence") {
            let mut branch = base.clone();
            self.walk_block(consequence, &mut branch);
            merged.merge(branch);
        }
        let alternatives: Vec<NodeId> = self
            .tree
            .children(stmt)
            .iter()
            .copied()
            .filter(|c| matches!(self.tree.kind(*c), "elif_clause" | "else_clause"))
            .collect();
        for alt in alternatives {
            match self.tree.kind(alt) {
                "elif_clause" => {
                    if let Some(cond) = self.tree.child_by_field(alt, "condition") {
                        self.eval(cond, env);
                    }
                    if let Some(consequence) = self.tree.child_by_field(alt, "consequence") {
                        let mut branch = base.clone();
                        self.walk_block(consequence, &mut branch);
                        merged.merge(branch);
                    }
                }
                "else_clause" => {
                    if let Some(body) = self.tree.child_by_field(alt, "body") {
                        let mut branch = base.clone();
                        self.walk_block(body, &mut branch);
                        merged.merge(branch);
                    }
                }
                _ => {}
            }
        }
        *env = merged;
    }

    fn handle_for(&mut self, stmt: NodeId, env: &mut Bindings) {
        let iterable_labels = self
            .tree
            .child_by_field(stmt, "right")
            .map(|r| self.eval(r, env))
            .unwrap_or_default();
        if let Some(left) = self.tree.child_by_field(stmt, "left") {
            if self.tree.kind(left) == "identifier" {
                env.set(self.tree.text(left), iterable_labels);
            }
        }
        if let Some(body) = self.tree.child_by_field(stmt, "body") {
            // Walked once, no fixpoint.
            self.walk_block(body, env);
        }
    }

    fn handle_assignment(&mut self, assign: NodeId, env: &mut Bindings) {
        let left = self.tree.child_by_field(assign, "left");
        let right = self.tree.child_by_field(assign, "right");
        let (Some(left), Some(right)) = (left, right) else {
            // Annotation-only statement: nothing binds.
            return;
        };

        if self.try_split(left, right, env) {
            return;
        }

        let labels = self.eval(right, env);
        match self.tree.kind(left) {
            "identifier" => env.set(self.tree.text(left), labels),
            "pattern_list" | "tuple_pattern" => {
                let targets: Vec<NodeId> = self
                    .tree
                    .named_children(left)
                    .filter(|t| self.tree.kind(*t) == "identifier")
                    .collect();
                for target in targets {
                    env.set(self.tree.text(target), labels.clone());
                }
            }
            _ => {}
        }
    }

    fn handle_augmented(&mut self, assign: NodeId, env: &mut Bindings) {
        let right_labels = self
            .tree
            .child_by_field(assign, "right")
            .map(|r| self.eval(r, env))
            .unwrap_or_default();
        if let Some(left) = self.tree.child_by_field(assign, "left") {
            if self.tree.kind(left) == "identifier" {
                let name = self.tree.text(left).to_string();
                let merged = env.get(&name).union(&right_labels);
                env.set(name, merged);
            }
        }
    }

    /// Recognize `a, b = train_test_split(...)` (or the four-way form) and
    /// relabel the targets, regardless of the source expression's labels.
    fn try_split(&mut self, left: NodeId, right: NodeId, env: &mut Bindings) -> bool {
        if self.tree.kind(right) != "call" || !self.is_split_call(right) {
            return false;
        }
        if !matches!(self.tree.kind(left), "pattern_list" | "tuple_pattern") {
            return false;
        }
        let targets: Vec<NodeId> = self
            .tree
            .named_children(left)
            .filter(|t| self.tree.kind(*t) == "identifier")
            .collect();
        if targets.len() != 2 && targets.len() != 4 {
            return false;
        }

        // Arguments may themselves contain fit calls; evaluate them first.
        self.eval(right, env);

        for (i, target) in targets.iter().enumerate() {
            let name = self.tree.text(*target);
            let side = split_side(name, i, targets.len());
            env.set(name, Labels::single(Taint::Split(side)));
        }
        true
    }

    fn is_split_call(&self, call: NodeId) -> bool {
        let Some(name) = self.callee_name(call) else {
            return false;
        };
        self.options
            .split_markers
            .iter()
            .any(|marker| name.contains(marker.as_str()))
    }

    fn callee_name(&self, call: NodeId) -> Option<&str> {
        let func = self.tree.child_by_field(call, "function")?;
        match self.tree.kind(func) {
            "identifier" => Some(self.tree.text(func)),
            "attribute" => self
                .tree
                .child_by_field(func, "attribute")
                .map(|a| self.tree.text(a)),
            _ => None,
        }
    }

    /// Compute the labels of an expression, emitting diagnostics for any fit
    /// calls encountered along the way.
    fn eval(&mut self, expr: NodeId, env: &mut Bindings) -> Labels {
        match self.tree.kind(expr) {
            "identifier" => env.get(self.tree.text(expr)),
            "call" => self.eval_call(expr, env),
            "attribute" => self
                .tree
                .child_by_field(expr, "object")
                .map(|o| self.eval(o, env))
                .unwrap_or_default(),
            "subscript" => self
                .tree
                .child_by_field(expr, "value")
                .map(|v| self.eval(v, env))
                .unwrap_or_default(),
            "string" | "integer" | "float" | "true" | "false" | "none" => Labels::empty(),
            _ => {
                // Operators, containers, comprehensions: identity over parts.
                let children: Vec<NodeId> = self.tree.named_children(expr).collect();
                let mut labels = Labels::empty();
                for child in children {
                    labels = labels.union(&self.eval(child, env));
                }
                labels
            }
        }
    }

    fn eval_call(&mut self, call: NodeId, env: &mut Bindings) -> Labels {
        let arg_labels = self.eval_arguments(call, env);

        let Some(func) = self.tree.child_by_field(call, "function") else {
            return arg_labels;
        };
        match self.tree.kind(func) {
            "identifier" => {
                let name = self.tree.text(func);
                if self.is_dataset_constructor(name) {
                    Labels::single(Taint::Raw)
                } else {
                    // Unresolvable function: label-preserving identity.
                    arg_labels
                }
            }
            "attribute" => {
                let attr = self
                    .tree
                    .child_by_field(func, "attribute")
                    .map(|a| self.tree.text(a))
                    .unwrap_or("");
                let object = self.tree.child_by_field(func, "object");

                if self.options.fit_methods.iter().any(|m| m == attr) {
                    return self.check_fit(call, attr, object, arg_labels, env);
                }
                if self.is_dataset_constructor(attr) {
                    return Labels::single(Taint::Raw);
                }
                let receiver = object.map(|o| self.eval(o, env)).unwrap_or_default();
                receiver.union(&arg_labels)
            }
            _ => arg_labels,
        }
    }

    fn eval_arguments(&mut self, call: NodeId, env: &mut Bindings) -> Labels {
        let Some(args) = self.tree.child_by_field(call, "arguments") else {
            return Labels::empty();
        };
        let children: Vec<NodeId> = self.tree.named_children(args).collect();
        let mut labels = Labels::empty();
        for arg in children {
            let arg_labels = match self.tree.kind(arg) {
                "keyword_argument" => self
                    .tree
                    .child_by_field(arg, "value")
                    .map(|v| self.eval(v, env))
                    .unwrap_or_default(),
                _ => self.eval(arg, env),
            };
            labels = labels.union(&arg_labels);
        }
        labels
    }

    fn check_fit(
        &mut self,
        call: NodeId,
        method: &str,
        object: Option<NodeId>,
        arg_labels: Labels,
        env: &mut Bindings,
    ) -> Labels {
        let receiver_labels = object.map(|o| self.eval(o, env)).unwrap_or_default();
        let combined = receiver_labels.union(&arg_labels);

        // Already reported for this object; stay quiet downstream.
        if combined.contains_fitted() {
            return arg_labels;
        }

        let flagged = combined.contains_raw() || combined.contains_test();
        if flagged {
            let message = if combined.contains_test() {
                format!(
                    "{method}() is fitted on the test partition; the estimator sees held-out data"
                )
            } else {
                format!(
                    "{method}() is fitted on data that has not been split; statistics leak into the evaluation"
                )
            };
            self.diagnostics.push(Diagnostic::new(
                Guard::Leakage,
                self.severity,
                self.tree.line(call),
                message,
            ));
            if let Some(object) = object {
                if self.tree.kind(object) == "identifier" {
                    env.set(self.tree.text(object), Labels::single(Taint::FittedOnRaw));
                }
            }
        }
        arg_labels
    }

    fn is_dataset_constructor(&self, name: &str) -> bool {
        self.options
            .dataset_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Side assignment for split targets: names win, position is the fallback
/// (first half train, second half test).
fn split_side(name: &str, index: usize, total: usize) -> Side {
    let lowered = name.to_lowercase();
    if lowered.contains("test") || lowered.contains("val") || lowered.contains("holdout") {
        return Side::Test;
    }
    if lowered.contains("train") {
        return Side::Train;
    }
    if index < total / 2 {
        Side::Train
    } else {
        Side::Test
    }
}
