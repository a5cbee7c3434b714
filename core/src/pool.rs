//! Append-only, hash-consed node store.
//!
//! Every node is interned exactly once: asking for a structurally identical
//! node returns the id it was first given. Ids are dense (1..=len) in interning
//! order and nodes are never mutated or removed, so ids can be shared freely
//! between the parser, the folder and the exported table.

use rustc_hash::FxHashMap;

use crate::interner::Symbol;
use crate::language::{Node, NodeId, Span, Tag, Tree};
use crate::numeric::Number;

#[derive(Debug, Clone, Default)]
pub struct NodePool {
    nodes: Vec<Node>,
    index: FxHashMap<Node, NodeId>,
    coords: FxHashMap<NodeId, Span>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned nodes; also the largest id.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Intern a node whose children are already interned.
    pub fn intern(&mut self, node: Node) -> NodeId {
        if let Some(&id) = self.index.get(&node) {
            return id;
        }
        self.nodes.push(node.clone());
        let id = NodeId::from_index(self.nodes.len());
        self.index.insert(node, id);
        id
    }

    /// Intern a node and record its source range. The range sticks to the
    /// first occurrence only.
    pub fn intern_at(&mut self, node: Node, span: Option<Span>) -> NodeId {
        let id = self.intern(node);
        if let Some(span) = span {
            self.coords.entry(id).or_insert(span);
        }
        id
    }

    /// Intern a nested tree, children first.
    pub fn intern_tree(&mut self, tree: &Tree) -> NodeId {
        let node = match tree {
            Tree::Num(n) => Node::Num(*n),
            Tree::Str(s) => Node::Str(s.clone()),
            Tree::Ident(name) => Node::Ident(Symbol::new(name)),
            Tree::Bool(b) => Node::Bool(*b),
            Tree::Null => Node::Null,
            Tree::Node { tag, elts } => {
                let elts = elts.iter().map(|elt| self.intern_tree(elt)).collect();
                Node::branch(*tag, elts)
            }
        };
        self.intern(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.index() - 1)
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.get(id).map(Node::tag)
    }

    /// Reconstruct the logical nested shape of a node.
    pub fn tree(&self, id: NodeId) -> Option<Tree> {
        let tree = match self.get(id)? {
            Node::Num(n) => Tree::Num(*n),
            Node::Str(s) => Tree::Str(s.clone()),
            Node::Ident(name) => Tree::Ident(name.resolve()),
            Node::Bool(b) => Tree::Bool(*b),
            Node::Null => Tree::Null,
            Node::Branch { tag, elts } => {
                let elts = elts
                    .iter()
                    .map(|elt| self.tree(*elt))
                    .collect::<Option<Vec<_>>>()?;
                Tree::node(*tag, elts)
            }
        };
        Some(tree)
    }

    pub fn coord(&self, id: NodeId) -> Option<Span> {
        self.coords.get(&id).copied()
    }

    /// All interned nodes with their ids, in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::from_index(i + 1), node))
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn number(&mut self, value: Number) -> NodeId {
        self.intern(Node::Num(value))
    }

    pub fn string(&mut self, s: &str) -> NodeId {
        self.intern(Node::Str(s.to_string()))
    }

    pub fn ident(&mut self, name: Symbol) -> NodeId {
        self.intern(Node::Ident(name))
    }

    pub fn boolean(&mut self, b: bool) -> NodeId {
        self.intern(Node::Bool(b))
    }

    pub fn null(&mut self) -> NodeId {
        self.intern(Node::Null)
    }

    pub fn branch(&mut self, tag: Tag, elts: Vec<NodeId>) -> NodeId {
        self.intern(Node::branch(tag, elts))
    }

    // ========================================================================
    // Literal views
    // ========================================================================

    /// Look through grouping: a PAREN or EXPRS with exactly one child stands
    /// for that child.
    pub fn unwrap_group(&self, mut id: NodeId) -> NodeId {
        while let Some(Node::Branch {
            tag: Tag::Paren | Tag::Exprs,
            elts,
        }) = self.get(id)
        {
            match elts.as_slice() {
                [inner] => id = *inner,
                _ => break,
            }
        }
        id
    }

    /// The numeric value of a NUM literal, seen through grouping
    pub fn number_of(&self, id: NodeId) -> Option<Number> {
        self.get(self.unwrap_group(id)).and_then(Node::as_number)
    }

    pub fn is_literal(&self, id: NodeId) -> bool {
        self.get(self.unwrap_group(id))
            .is_some_and(|node| node.literal().is_some())
    }

    /// True when a node is built from literals and data constructors only,
    /// so its id is already its final value. Record keys are names and do
    /// not count.
    pub fn is_ground(&self, id: NodeId) -> bool {
        match self.get(id) {
            Some(Node::Branch {
                tag: Tag::List | Tag::Record | Tag::Paren | Tag::Exprs,
                elts,
            }) => elts.iter().all(|&elt| self.is_ground(elt)),
            Some(Node::Branch {
                tag: Tag::Binding,
                elts,
            }) => matches!(elts.as_slice(), [_, value] if self.is_ground(*value)),
            Some(node) => node.literal().is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_are_dense() {
        let mut pool = NodePool::new();
        let a = pool.number(Number::new(1.0));
        let b = pool.string("x");
        let c = pool.branch(Tag::List, vec![a, b]);
        assert_eq!((a.index(), b.index(), c.index()), (1, 2, 3));
        assert_eq!(pool.len(), 3);
        assert!(pool.get(NodeId::NONE).is_none());
    }

    #[test]
    fn test_intern_returns_existing_id() {
        let mut pool = NodePool::new();
        let a = pool.number(Number::new(7.0));
        let b = pool.number(Number::new(7.0));
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_coord_sticks_to_first_occurrence() {
        let mut pool = NodePool::new();
        let first = Span::new(0, 0, 1);
        let id = pool.intern_at(Node::Num(Number::new(1.0)), Some(first));
        pool.intern_at(Node::Num(Number::new(1.0)), Some(Span::new(3, 4, 5)));
        assert_eq!(pool.coord(id), Some(first));
    }

    #[test]
    fn test_unwrap_group() {
        let mut pool = NodePool::new();
        let three = pool.number(Number::new(3.0));
        let exprs = pool.branch(Tag::Exprs, vec![three]);
        let paren = pool.branch(Tag::Paren, vec![exprs]);
        assert_eq!(pool.unwrap_group(paren), three);
        assert_eq!(pool.number_of(paren), Some(Number::new(3.0)));

        let two = pool.number(Number::new(2.0));
        let pair = pool.branch(Tag::Exprs, vec![three, two]);
        assert_eq!(pool.unwrap_group(pair), pair);
        assert!(!pool.is_literal(pair));
    }

    #[test]
    fn test_ground_data() {
        let mut pool = NodePool::new();
        let one = pool.number(Number::new(1.0));
        let key = pool.ident(Symbol::new("k"));
        let binding = pool.branch(Tag::Binding, vec![key, one]);
        let record = pool.branch(Tag::Record, vec![binding]);
        let list = pool.branch(Tag::List, vec![one, record]);
        assert!(pool.is_ground(list));

        let free = pool.ident(Symbol::new("x"));
        let open = pool.branch(Tag::List, vec![one, free]);
        assert!(!pool.is_ground(open));
        let sum = pool.branch(Tag::Add, vec![one, one]);
        assert!(!pool.is_ground(sum));
    }
}
