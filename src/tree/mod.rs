//! Lossless source tree for one Python file
//!
//! Wraps a tree-sitter parse into a flat, immutable node table. Children
//! reference their parent by index into the table (no owning back-references,
//! so parent links cost nothing to drop), and every node keeps its exact byte
//! span in the original text, which is what makes format-preserving rewrites
//! possible: any node's original bytes can be reproduced verbatim.
//!
//! The table is built once per file and never mutated; every guard reads the
//! same tree, so per-file analysis can fan out without locking.

mod suppress;


pub use suppress::{SuppressLexicon, SuppressionIndex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tree_sitter::{Language, Node, Parser, TreeCursor};

/// Stable identity of a node in a [`SourceTree`]. Ids are assigned in
/// pre-order, so a node's id is always smaller than its descendants'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: &'static str,
    named: bool,
    /// Field name of this node within its parent (`left`, `right`, ...)
    field: Option<&'static str>,
    start_byte: usize,
    end_byte: usize,
    /// 1-based start line
    line: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// One past the last pre-order id in this node's subtree
    subtree_end: u32,
}

/// Why a file could not be parsed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}")]
    Syntax { line: u32 },
    #[error("source contains a NUL byte at offset {0}")]
    NulByte(usize),
    #[error("python grammar failed to load: {0}")]
    Grammar(String),
    #[error("parser produced no tree")]
    Empty,
}

impl ParseError {
    /// Line to anchor the `parse` diagnostic at.
    pub fn line(&self) -> u32 {
        match self {
            ParseError::Syntax { line } => *line,
            _ => 1,
        }
    }
}

/// Immutable, parent-linked syntax tree plus the source text it was built
/// from. Owned by the analysis pass that requested it.
#[derive(Debug)]
pub struct SourceTree {
    source: String,
    nodes: Vec<NodeData>,
}

impl SourceTree {
    /// Parse Python source into a node table.
    ///
    /// Any syntax error anywhere in the file rejects the whole file: a tree
    /// with error nodes would make span-based rewrites unreliable, and the
    /// driver reports the file with a single `parse` diagnostic instead.
    pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
        if let Some(pos) = source.bytes().position(|b| b == 0) {
            return Err(ParseError::NulByte(pos));
        }

        let mut parser = Parser::new();
        let language: Language = tree_sitter_python::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| ParseError::Grammar(e.to_string()))?;

        let ts_tree = parser.parse(source, None).ok_or(ParseError::Empty)?;
        let root = ts_tree.root_node();
        if let Some(line) = first_error_line(root) {
            return Err(ParseError::Syntax { line });
        }

        let mut nodes = Vec::with_capacity(root.descendant_count());
        let mut cursor = root.walk();
        flatten(&mut cursor, None, None, &mut nodes);

        Ok(SourceTree {
            source: source.to_string(),
            nodes,
        })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> &str {
        self.nodes[id.index()].kind
    }

    pub fn is_named(&self, id: NodeId) -> bool {
        self.nodes[id.index()].named
    }

    /// Exact original bytes of the node.
    pub fn text(&self, id: NodeId) -> &str {
        let n = &self.nodes[id.index()];
        &self.source[n.start_byte..n.end_byte]
    }

    /// 1-based start line.
    pub fn line(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].line
    }

    /// Byte span `(start, end)` in the original text.
    pub fn span(&self, id: NodeId) -> (usize, usize) {
        let n = &self.nodes[id.index()];
        (n.start_byte, n.end_byte)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.index()]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_named(*c))
    }

    /// First child carrying the given tree-sitter field name.
    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.index()].field == Some(field))
    }

    /// Pre-order iterator over the subtree rooted at `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self.nodes[id.index()].subtree_end;
        (id.0 + 1..end).map(NodeId)
    }

    /// Pre-order iterator over every node of the given kind.
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(move |id| self.kind(*id) == kind)
    }

    /// Nearest enclosing `function_definition`, if any.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if self.kind(p) == "function_definition" {
                return Some(p);
            }
            cur = self.parent(p);
        }
        None
    }

    /// Name of a `function_definition` node.
    pub fn function_name(&self, func: NodeId) -> Option<&str> {
        self.child_by_field(func, "name").map(|n| self.text(n))
    }

    /// True if `inner` is `outer` or lies inside `outer`'s subtree.
    pub fn is_within(&self, inner: NodeId, outer: NodeId) -> bool {
        inner.0 >= outer.0 && inner.0 < self.nodes[outer.index()].subtree_end
    }
}

fn first_error_line(root: Node) -> Option<u32> {
    if !root.has_error() {
        return None;
    }
    let mut cursor = root.walk();
    let line = find_error(&mut cursor);
    // has_error() was true, so an ERROR or MISSING node must exist; fall back
    // to the root's line if the walk somehow misses it.
    Some(line.unwrap_or(root.start_position().row as u32 + 1))
}

fn find_error(cursor: &mut TreeCursor) -> Option<u32> {
    let node = cursor.node();
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    if !node.has_error() {
        return None;
    }
    if cursor.goto_first_child() {
        loop {
            if let Some(line) = find_error(cursor) {
                return Some(line);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
    None
}

fn flatten(
    cursor: &mut TreeCursor,
    parent: Option<NodeId>,
    field: Option<&'static str>,
    nodes: &mut Vec<NodeData>,
) -> NodeId {
    let node = cursor.node();
    let id = NodeId(nodes.len() as u32);
    nodes.push(NodeData {
        kind: node.kind(),
        named: node.is_named(),
        field,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        line: node.start_position().row as u32 + 1,
        parent,
        children: Vec::new(),
        subtree_end: 0,
    });

    if cursor.goto_first_child() {
        loop {
            let child_field = cursor.field_name();
            let child = flatten(cursor, Some(id), child_field, nodes);
            nodes[id.index()].children.push(child);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }

    nodes[id.index()].subtree_end = nodes.len() as u32;
    id
}
