//! Shared document trees.
//!
//! A [`Tree`] is either an atomic string label or a tagged node with an
//! ordered list of children. Trees are immutable and structurally shared:
//! cloning is a reference-count bump and every "edit" builds a new tree.

mod reader;
mod tag;

use std::fmt;
use std::sync::Arc;

pub use reader::parse;
pub use tag::{Arity, Tag};

/// A path of child indices from a root tree to one of its subtrees.
pub type Path = Vec<usize>;

/// A document or expression tree.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Tree {
    /// An atomic string label.
    Atom(Arc<str>),
    /// A tagged node.
    Node(Arc<Node>),
}

/// The payload of a compound tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub tag: Tag,
    pub children: Vec<Tree>,
}

impl Tree {
    /// Create an atomic tree.
    pub fn atom(label: impl AsRef<str>) -> Self {
        Tree::Atom(Arc::from(label.as_ref()))
    }

    /// Create a compound tree.
    pub fn node(tag: Tag, children: Vec<Tree>) -> Self {
        Tree::Node(Arc::new(Node { tag, children }))
    }

    /// Create an application of the user macro `name`.
    pub fn user(name: &str, children: Vec<Tree>) -> Self {
        Tree::node(Tag::from_name(name), children)
    }

    /// The sentinel returned for variables that were never set.
    pub fn uninit() -> Self {
        Tree::node(Tag::Uninit, Vec::new())
    }

    /// An error marker carrying a message.
    pub fn error(message: impl AsRef<str>) -> Self {
        Tree::node(Tag::Error, vec![Tree::atom(message)])
    }

    /// The empty string.
    pub fn empty() -> Self {
        Tree::atom("")
    }

    /// The boolean atoms `true` and `false`.
    pub fn truth(value: bool) -> Self {
        Tree::atom(if value { "true" } else { "false" })
    }

    /// Parse a tree from its s-expression form.
    pub fn parse(source: &str) -> Result<Tree, crate::utils::error::ParseError> {
        reader::parse(source)
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Tree::Atom(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Tree::Node(_))
    }

    /// The string label of an atomic tree.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::Atom(s) => Some(s),
            Tree::Node(_) => None,
        }
    }

    /// The tag of a compound tree.
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Tree::Atom(_) => None,
            Tree::Node(node) => Some(&node.tag),
        }
    }

    /// Whether this is a node tagged `tag`.
    pub fn is(&self, tag: &Tag) -> bool {
        self.tag() == Some(tag)
    }

    /// Whether this is a node tagged `tag` with exactly `arity` children.
    pub fn is_func(&self, tag: &Tag, arity: usize) -> bool {
        self.is(tag) && self.arity() == arity
    }

    pub fn is_uninit(&self) -> bool {
        self.is(&Tag::Uninit)
    }

    pub fn is_error(&self) -> bool {
        self.is(&Tag::Error)
    }

    /// The message carried by an `(error ...)` tree.
    pub fn error_message(&self) -> String {
        match self.child(0) {
            Some(Tree::Atom(msg)) if self.is_error() => msg.to_string(),
            _ => "error".to_string(),
        }
    }

    pub fn is_tuple(&self) -> bool {
        self.is(&Tag::Tuple)
    }

    /// The children of a compound tree; empty for atoms.
    pub fn children(&self) -> &[Tree] {
        match self {
            Tree::Atom(_) => &[],
            Tree::Node(node) => &node.children,
        }
    }

    /// Number of children.
    pub fn arity(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, index: usize) -> Option<&Tree> {
        self.children().get(index)
    }

    /// The label used by `get-label`: the tag name, or `string` for atoms.
    pub fn label(&self) -> &str {
        match self {
            Tree::Atom(_) => "string",
            Tree::Node(node) => node.tag.name(),
        }
    }

    /// A node with the same tag and new children. Atoms are returned as is.
    pub fn with_children(&self, children: Vec<Tree>) -> Tree {
        match self {
            Tree::Atom(_) => self.clone(),
            Tree::Node(node) => Tree::node(node.tag.clone(), children),
        }
    }

    /// Follow `path` down from this tree.
    pub fn subtree(&self, path: &[usize]) -> Option<&Tree> {
        path.iter().try_fold(self, |t, &i| t.child(i))
    }

    /// Total number of nodes and atoms in this tree.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Tree::size).sum::<usize>()
    }

    /// JSON rendering: atoms become strings, nodes `{"tag", "children"}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Tree::Atom(s) => serde_json::Value::String(s.to_string()),
            Tree::Node(node) => serde_json::json!({
                "tag": node.tag.name(),
                "children": node.children.iter().map(Tree::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::uninit()
    }
}

impl From<&str> for Tree {
    fn from(label: &str) -> Self {
        Tree::atom(label)
    }
}

impl From<String> for Tree {
    fn from(label: String) -> Self {
        Tree::Atom(Arc::from(label))
    }
}

/// Whether an atom can be written without quotes.
fn is_bare(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '\\' | ';'))
}

fn write_atom(f: &mut fmt::Formatter<'_>, label: &str) -> fmt::Result {
    if is_bare(label) {
        return f.write_str(label);
    }
    f.write_str("\"")?;
    for c in label.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Atom(s) => write_atom(f, s),
            Tree::Node(node) => {
                write!(f, "({}", node.tag)?;
                for child in &node.children {
                    write!(f, " {}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
