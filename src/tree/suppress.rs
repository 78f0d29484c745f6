//! Inline suppression directives
//!
//! A trailing comment opts one line out of reporting:
//!
//! ```python
//! np.mean(x)  # mirador: ignore-mirage
//! scaler.fit_transform(X)  # mirador: ignore
//! ```
//!
//! `ignore` suppresses every analysis guard on that line; `ignore-<guard>`
//! suppresses one. The comment scan touches each comment token exactly once,
//! so its cost is bounded by the number of comments, not the tree size.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, Guard};
use crate::tree::SourceTree;

/// The comment vocabulary that activates suppression.
#[derive(Debug, Clone)]
pub struct SuppressLexicon {
    /// Marker introducing a directive inside a comment, e.g. `mirador:`
    marker: String,
}

impl Default for SuppressLexicon {
    fn default() -> Self {
        Self {
            marker: "mirador:".to_string(),
        }
    }
}

impl SuppressLexicon {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Parse one comment's text into a directive, if it carries the marker.
    fn parse(&self, comment: &str) -> Option<Directive> {
        let rest = comment.split_once(&self.marker)?.1;
        let mut directive = Directive::default();
        for token in rest.split(|c: char| c.is_whitespace() || c == ',') {
            match token {
                "" => {}
                "ignore" => directive.all = true,
                _ => {
                    if let Some(name) = token.strip_prefix("ignore-") {
                        if let Ok(guard) = name.parse::<Guard>() {
                            directive.guards.insert(guard);
                        }
                    }
                }
            }
        }
        if directive.all || !directive.guards.is_empty() {
            Some(directive)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Directive {
    all: bool,
    guards: HashSet<Guard>,
}

impl Directive {
    fn merge(&mut self, other: Directive) {
        self.all |= other.all;
        self.guards.extend(other.guards);
    }

    fn suppresses(&self, guard: Guard) -> bool {
        if self.guards.contains(&guard) {
            return true;
        }
        // Bare `ignore` covers the analysis guards, never parse/timeout.
        self.all && Guard::ANALYSES.contains(&guard)
    }
}

/// Line -> directive map for one file, built once per analysis.
#[derive(Debug, Default)]
pub struct SuppressionIndex {
    by_line: HashMap<u32, Directive>,
}

impl SuppressionIndex {
    /// Scan every comment in the tree for suppression directives.
    pub fn scan(tree: &SourceTree, lexicon: &SuppressLexicon) -> SuppressionIndex {
        let mut by_line: HashMap<u32, Directive> = HashMap::new();
        for id in tree.nodes_of_kind("comment") {
            if let Some(directive) = lexicon.parse(tree.text(id)) {
                by_line.entry(tree.line(id)).or_default().merge(directive);
            }
        }
        SuppressionIndex { by_line }
    }

    pub fn suppresses(&self, diagnostic: &Diagnostic) -> bool {
        self.by_line
            .get(&diagnostic.line)
            .is_some_and(|d| d.suppresses(diagnostic.guard))
    }

    /// Post-filter a merged diagnostic list. Never mutates the survivors.
    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter(|d| !self.suppresses(d))
            .collect()
    }
}
