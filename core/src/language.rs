use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interner::Symbol;
use crate::numeric::{Literal, Number};

// ============================================================================
// Node ids and source coordinates
// ============================================================================

/// Index of a node in the pool. Id 0 is reserved for "absent node".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(u32::try_from(index).expect("node pool exceeds u32 ids"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line/column position as consumed by host editors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub ch: u32,
}

/// Source range of a token or node on a single line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(line: u32, start: u32, end: u32) -> Self {
        Span { line, start, end }
    }

    pub fn from_pos(&self) -> Pos {
        Pos {
            line: self.line,
            ch: self.start,
        }
    }

    pub fn to_pos(&self) -> Pos {
        Pos {
            line: self.line,
            ch: self.end,
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Num,
    Str,
    Ident,
    Bool,
    Null,
    Prog,
    Exprs,
    Paren,
    Lambda,
    Apply,
    List,
    Record,
    Binding,
    Case,
    Of,
    Add,
    Sub,
    Div,
    Mod,
    Pow,
    Concat,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Neg,
    /// Late-application indirection: element `elts[0]` of `elts[1]`
    Val,
    /// Late-application argument reference by position
    Arg,
}

const TAG_NAMES: &[(Tag, &str)] = &[
    (Tag::Num, "NUM"),
    (Tag::Str, "STR"),
    (Tag::Ident, "IDENT"),
    (Tag::Bool, "BOOL"),
    (Tag::Null, "NULL"),
    (Tag::Prog, "PROG"),
    (Tag::Exprs, "EXPRS"),
    (Tag::Paren, "PAREN"),
    (Tag::Lambda, "LAMBDA"),
    (Tag::Apply, "APPLY"),
    (Tag::List, "LIST"),
    (Tag::Record, "RECORD"),
    (Tag::Binding, "BINDING"),
    (Tag::Case, "CASE"),
    (Tag::Of, "OF"),
    (Tag::Add, "ADD"),
    (Tag::Sub, "SUB"),
    (Tag::Div, "DIV"),
    (Tag::Mod, "MOD"),
    (Tag::Pow, "POW"),
    (Tag::Concat, "CONCAT"),
    (Tag::Or, "OR"),
    (Tag::And, "AND"),
    (Tag::Eq, "EQ"),
    (Tag::Ne, "NE"),
    (Tag::Lt, "LT"),
    (Tag::Gt, "GT"),
    (Tag::Le, "LE"),
    (Tag::Ge, "GE"),
    (Tag::Neg, "NEG"),
    (Tag::Val, "VAL"),
    (Tag::Arg, "ARG"),
];

impl Tag {
    pub fn name(self) -> &'static str {
        TAG_NAMES
            .iter()
            .find(|(tag, _)| *tag == self)
            .map(|(_, name)| *name)
            .unwrap_or("?")
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        TAG_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(tag, _)| *tag)
    }

    /// Tags whose node carries a scalar payload (or nothing) instead of children
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Tag::Num | Tag::Str | Tag::Ident | Tag::Bool | Tag::Null
        )
    }

    /// Binding power of a binary operator; `None` for everything else.
    pub fn precedence(self) -> Option<u8> {
        match self {
            Tag::Or => Some(1),
            Tag::And => Some(2),
            Tag::Eq | Tag::Ne => Some(3),
            Tag::Lt | Tag::Gt | Tag::Le | Tag::Ge => Some(4),
            Tag::Concat | Tag::Add | Tag::Sub => Some(5),
            Tag::Div | Tag::Mod => Some(6),
            Tag::Pow => Some(7),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Interned nodes
// ============================================================================

/// A node as stored in the pool: leaves carry their payload, interior nodes
/// carry the ids of already-interned children.
///
/// The node itself is the structural interning key, so two nodes are the same
/// entry exactly when tag, payload and ordered child ids agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Num(Number),
    Str(String),
    Ident(Symbol),
    Bool(bool),
    Null,
    Branch { tag: Tag, elts: Vec<NodeId> },
}

impl Node {
    pub fn branch(tag: Tag, elts: Vec<NodeId>) -> Self {
        debug_assert!(!tag.is_leaf(), "{tag} is a leaf tag");
        Node::Branch { tag, elts }
    }

    pub fn tag(&self) -> Tag {
        match self {
            Node::Num(_) => Tag::Num,
            Node::Str(_) => Tag::Str,
            Node::Ident(_) => Tag::Ident,
            Node::Bool(_) => Tag::Bool,
            Node::Null => Tag::Null,
            Node::Branch { tag, .. } => *tag,
        }
    }

    pub fn elts(&self) -> &[NodeId] {
        match self {
            Node::Branch { elts, .. } => elts,
            _ => &[],
        }
    }

    /// Raw payload for the comparison operators, if this is a literal
    pub fn literal(&self) -> Option<Literal> {
        match self {
            Node::Num(n) => Some(Literal::Text(n.to_string())),
            Node::Str(s) => Some(Literal::Text(s.clone())),
            Node::Bool(b) => Some(Literal::Bool(*b)),
            Node::Null => Some(Literal::Null),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Node::Num(n) => Some(*n),
            _ => None,
        }
    }
}

// ============================================================================
// Nested trees
// ============================================================================

/// The logical, fully nested shape of a node, as reconstructed from the pool
/// or written by hand before interning.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Num(Number),
    Str(String),
    Ident(String),
    Bool(bool),
    Null,
    Node { tag: Tag, elts: Vec<Tree> },
}

impl Tree {
    pub fn num(value: impl Into<Number>) -> Self {
        Tree::Num(value.into())
    }

    pub fn str(s: &str) -> Self {
        Tree::Str(s.to_string())
    }

    pub fn ident(name: &str) -> Self {
        Tree::Ident(name.to_string())
    }

    pub fn node(tag: Tag, elts: Vec<Tree>) -> Self {
        Tree::Node { tag, elts }
    }

    pub fn tag(&self) -> Tag {
        match self {
            Tree::Num(_) => Tag::Num,
            Tree::Str(_) => Tag::Str,
            Tree::Ident(_) => Tag::Ident,
            Tree::Bool(_) => Tag::Bool,
            Tree::Null => Tag::Null,
            Tree::Node { tag, .. } => *tag,
        }
    }

    pub fn elts(&self) -> &[Tree] {
        match self {
            Tree::Node { elts, .. } => elts,
            _ => &[],
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result
}

/// Compact s-expression rendering: `(ADD 1 x)`, `"str"`, `true`, `null`.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tree::Num(n) => write!(f, "{n}"),
            Tree::Str(s) => write!(f, "\"{}\"", escape_string(s)),
            Tree::Ident(name) => write!(f, "{name}"),
            Tree::Bool(b) => write!(f, "{b}"),
            Tree::Null => write!(f, "null"),
            Tree::Node { tag, elts } => {
                write!(f, "({tag}")?;
                for elt in elts {
                    write!(f, " {elt}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names_round_trip() {
        for (tag, name) in TAG_NAMES {
            assert_eq!(tag.name(), *name);
            assert_eq!(Tag::from_name(name), Some(*tag));
        }
        assert_eq!(Tag::from_name("MUL"), None);
    }

    #[test]
    fn test_precedence_table() {
        assert_eq!(Tag::Or.precedence(), Some(1));
        assert_eq!(Tag::Ge.precedence(), Some(4));
        assert_eq!(Tag::Concat.precedence(), Tag::Add.precedence());
        assert!(Tag::Pow.precedence() > Tag::Div.precedence());
        assert_eq!(Tag::Neg.precedence(), None);
    }

    #[test]
    fn test_tree_display() {
        let tree = Tree::node(
            Tag::Add,
            vec![Tree::num(1.0), Tree::node(Tag::Paren, vec![Tree::ident("x")])],
        );
        assert_eq!(tree.to_string(), "(ADD 1 (PAREN x))");
        assert_eq!(Tree::str("a\"b").to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_literal_payloads() {
        assert_eq!(
            Node::Num(Number::new(2.0)).literal(),
            Some(Literal::Text("2".into()))
        );
        assert_eq!(Node::Null.literal(), Some(Literal::Null));
        assert_eq!(Node::Ident(Symbol::new("x")).literal(), None);
    }
}
