//! Partial evaluation over interned trees
//!
//! The folder walks a node and leaves its reduced form on an operand stack.
//! Expression lists are visited back to front, so when a function value is
//! reached the values of the expressions that follow it are already on the
//! stack and become its arguments. Parentheses, lists and operator operands
//! are folded inside scratch frames so they cannot capture outer operands.
//!
//! Like the parser, the walk is driven by an explicit stack of pending
//! [`Task`]s instead of native recursion. Only the scope limit of the
//! environment bounds how deep applications nest.

use tracing::{debug, trace};

use crate::environment::{Environment, Lexicon, Word, WordClass};
use crate::error::{Error, Result};
use crate::interner::Symbol;
use crate::language::{Node, NodeId, Tag};
use crate::numeric::{Literal, Number, loose_eq};
use crate::pool::NodePool;

/// Numeric result of an arithmetic operator, `None` for every other tag.
pub fn arithmetic(tag: Tag, a: Number, b: Number) -> Option<Number> {
    match tag {
        Tag::Add => Some(a.add(b)),
        Tag::Sub => Some(a.sub(b)),
        Tag::Div => Some(a.div(b)),
        Tag::Mod => Some(a.rem(b)),
        Tag::Pow => Some(a.pow(b)),
        _ => None,
    }
}

/// Result of a comparison between two literal payloads.
///
/// `EQ` compares raw payloads loosely; the other comparisons coerce both
/// sides to numbers first.
pub fn compare(tag: Tag, a: &Literal, b: &Literal) -> Option<bool> {
    let (x, y) = (a.to_number(), b.to_number());
    match tag {
        Tag::Eq => Some(loose_eq(a, b)),
        Tag::Ne => Some(x != y),
        Tag::Lt => Some(x < y),
        Tag::Gt => Some(x > y),
        Tag::Le => Some(x <= y),
        Tag::Ge => Some(x >= y),
        _ => None,
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Text(s) => s.clone(),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "null".to_string(),
    }
}

// ============================================================================
// Operand stack
// ============================================================================

/// Operand stack with scratch frames.
#[derive(Debug, Clone, Default)]
pub struct OperandStack {
    items: Vec<NodeId>,
    frames: Vec<usize>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn base(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    pub fn push(&mut self, id: NodeId) {
        self.items.push(id);
    }

    /// Pop from the current frame; never reaches into an outer frame.
    pub fn pop(&mut self) -> Option<NodeId> {
        if self.items.len() > self.base() {
            self.items.pop()
        } else {
            None
        }
    }

    /// Number of operands in the current frame
    pub fn frame_len(&self) -> usize {
        self.items.len() - self.base()
    }

    pub fn open(&mut self) {
        self.frames.push(self.items.len());
    }

    /// Close the current frame and return its operands, bottom first
    pub fn close(&mut self) -> Vec<NodeId> {
        let base = self.frames.pop().unwrap_or(0);
        self.items.split_off(base.min(self.items.len()))
    }
}

// ============================================================================
// Callees
// ============================================================================

/// A function value ready to be applied: a `let` definition or a LAMBDA node.
struct Callee {
    name: Symbol,
    body: NodeId,
    /// One entry per argument: an IDENT or a LIST pattern
    pattern: Vec<NodeId>,
    lexicon: Option<Lexicon>,
}

impl Callee {
    fn arity(&self) -> usize {
        self.pattern.len()
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Pending folding work. Tasks run last in, first out and leave their
/// values on the operand stack, so nesting depth costs heap, not native
/// stack.
#[derive(Debug, Clone, PartialEq)]
enum Task {
    Visit(NodeId),
    /// Fold a node in a scratch frame and leave a single value behind
    Operand(NodeId),
    CloseOperand,
    /// Close a scratch frame and wrap its values in a PROG, PAREN or LIST
    Close(Tag),
    Push(NodeId),
    /// Replace the top `arity` operands with one `tag` node over them
    Build { tag: Tag, arity: usize },
    Arithmetic(Tag),
    Concat,
    Compare(Tag),
    Negate,
    /// Wrap the folded body on the stack in a LAMBDA
    Lambda { names: NodeId, pattern: NodeId },
    /// The folded scrutinee is on the stack; try the clauses in order
    Case { nid: NodeId },
    /// The folded pattern of clause `index` is on the stack
    Clause {
        nid: NodeId,
        index: usize,
        scrutinee: NodeId,
    },
    /// Open a scope where `name` is a pattern variable with no value yet
    Enter { name: Symbol },
    Exit,
}

/// The parts of an OF clause. Clauses that bind their pattern carry the
/// bound names as a third child.
struct Clause {
    pattern: NodeId,
    body: NodeId,
    names: Option<NodeId>,
}

// ============================================================================
// Folder
// ============================================================================

pub struct Folder<'a> {
    pool: &'a mut NodePool,
    env: &'a mut Environment,
    stack: OperandStack,
    tasks: Vec<Task>,
}

impl<'a> Folder<'a> {
    pub fn new(pool: &'a mut NodePool, env: &'a mut Environment) -> Self {
        Folder {
            pool,
            env,
            stack: OperandStack::new(),
            tasks: Vec::new(),
        }
    }

    /// Fold a node and return the id of its reduced form.
    pub fn fold(&mut self, nid: NodeId) -> Result<NodeId> {
        let depth = self.env.depth();
        self.stack.open();
        self.tasks.push(Task::Operand(nid));
        if let Err(err) = self.run() {
            self.tasks.clear();
            self.stack = OperandStack::new();
            while self.env.depth() > depth {
                self.env.exit();
            }
            return Err(err);
        }
        match self.stack.close().as_slice() {
            [folded] => {
                debug!(from = %nid, to = %folded, "folded");
                Ok(*folded)
            }
            _ => Err(Error::Internal("fold left an unbalanced stack".into())),
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some(task) = self.tasks.pop() {
            self.resume(task)?;
        }
        Ok(())
    }

    /// Schedule tasks to run in the given order.
    fn seq<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = Task>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.tasks.extend(tasks.into_iter().rev());
    }

    fn push(&mut self, id: NodeId) {
        self.stack.push(id);
    }

    fn pop(&mut self) -> Result<NodeId> {
        self.stack
            .pop()
            .ok_or_else(|| Error::Internal("operand stack underflow".into()))
    }

    fn node(&self, nid: NodeId) -> Result<&Node> {
        self.pool
            .get(nid)
            .ok_or_else(|| Error::Internal(format!("node {nid} is not in the pool")))
    }

    fn elts(&self, nid: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(nid)?.elts().to_vec())
    }

    /// Close the current frame and return its values in source order.
    fn close_frame(&mut self) -> Vec<NodeId> {
        let mut values = self.stack.close();
        values.reverse();
        values
    }

    /// Several values stand for themselves as an EXPRS.
    fn single(&mut self, values: Vec<NodeId>) -> NodeId {
        match values.as_slice() {
            [only] => *only,
            _ => self.pool.branch(Tag::Exprs, values),
        }
    }

    fn literal(&self, nid: NodeId) -> Option<Literal> {
        self.pool
            .get(self.pool.unwrap_group(nid))
            .and_then(Node::literal)
    }

    fn resume(&mut self, task: Task) -> Result<()> {
        match task {
            Task::Visit(nid) => self.visit(nid)?,
            Task::Operand(nid) => {
                self.stack.open();
                self.seq([Task::Visit(nid), Task::CloseOperand]);
            }
            Task::CloseOperand => {
                let values = self.close_frame();
                let id = self.single(values);
                self.push(id);
            }
            Task::Close(tag) => {
                let values = self.close_frame();
                let id = match tag {
                    Tag::Prog => {
                        let exprs = self.pool.branch(Tag::Exprs, values);
                        self.pool.branch(Tag::Prog, vec![exprs])
                    }
                    Tag::Paren => {
                        let inner = self.single(values);
                        self.pool.branch(Tag::Paren, vec![inner])
                    }
                    _ => self.pool.branch(tag, values),
                };
                self.push(id);
            }
            Task::Push(id) => self.push(id),
            Task::Build { tag, arity } => {
                let mut elts = (0..arity).map(|_| self.pop()).collect::<Result<Vec<_>>>()?;
                elts.reverse();
                let id = self.pool.branch(tag, elts);
                self.push(id);
            }
            Task::Arithmetic(tag) => {
                let (a, b) = self.pop_pair()?;
                let id = match (self.pool.number_of(a), self.pool.number_of(b)) {
                    (Some(x), Some(y)) => match arithmetic(tag, x, y) {
                        Some(n) => self.pool.number(n),
                        None => self.pool.branch(tag, vec![a, b]),
                    },
                    _ => self.pool.branch(tag, vec![a, b]),
                };
                self.push(id);
            }
            Task::Concat => {
                let (a, b) = self.pop_pair()?;
                let id = match (self.literal(a), self.literal(b)) {
                    (Some(x), Some(y)) => {
                        let text = literal_text(&x) + &literal_text(&y);
                        self.pool.string(&text)
                    }
                    _ => self.pool.branch(Tag::Concat, vec![a, b]),
                };
                self.push(id);
            }
            Task::Compare(tag) => {
                let (a, b) = self.pop_pair()?;
                let result = match (self.literal(a), self.literal(b)) {
                    (Some(x), Some(y)) => compare(tag, &x, &y),
                    _ => None,
                };
                let id = match result {
                    Some(b) => self.pool.boolean(b),
                    None => self.pool.branch(tag, vec![a, b]),
                };
                self.push(id);
            }
            Task::Negate => {
                let operand = self.pop()?;
                let id = match self.pool.number_of(operand) {
                    Some(n) => self.pool.number(n.neg()),
                    None => self.pool.branch(Tag::Neg, vec![operand]),
                };
                self.push(id);
            }
            Task::Lambda { names, pattern } => {
                let body = self.pop()?;
                let id = self.pool.branch(Tag::Lambda, vec![names, body, pattern]);
                self.push(id);
            }
            Task::Case { nid } => {
                let scrutinee = self.pop()?;
                self.select(nid, scrutinee, 1)?;
            }
            Task::Clause {
                nid,
                index,
                scrutinee,
            } => {
                let pattern = self.pop()?;
                self.try_clause(nid, index, scrutinee, pattern)?;
            }
            Task::Enter { name } => {
                self.env.enter(Symbol::new("case"))?;
                self.env.bind(name, Word::value(name, 0));
            }
            Task::Exit => {
                self.env.exit();
            }
        }
        Ok(())
    }

    fn pop_pair(&mut self) -> Result<(NodeId, NodeId)> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    fn visit(&mut self, nid: NodeId) -> Result<()> {
        let (tag, elts) = match self.node(nid)? {
            Node::Num(_) | Node::Str(_) | Node::Bool(_) | Node::Null => {
                self.push(nid);
                return Ok(());
            }
            &Node::Ident(name) => return self.ident(nid, name),
            Node::Branch { tag, elts } => (*tag, elts.clone()),
        };
        trace!(nid = %nid, tag = %tag, "visit");

        match tag {
            Tag::Prog => {
                self.stack.open();
                self.tasks.push(Task::Close(Tag::Prog));
                if let Some(&exprs) = elts.first() {
                    self.tasks.push(Task::Visit(exprs));
                }
            }
            // Last expression first, so a function finds its arguments
            // already folded on the stack.
            Tag::Exprs => self.seq(elts.iter().rev().map(|&elt| Task::Visit(elt))),
            Tag::Paren | Tag::List => {
                self.stack.open();
                self.tasks.push(Task::Close(tag));
                self.tasks.extend(elts.iter().map(|&elt| Task::Visit(elt)));
            }
            Tag::Record | Tag::Apply | Tag::Val | Tag::Arg | Tag::Of => {
                let arity = elts.len();
                self.seq(
                    elts.iter()
                        .map(|&elt| Task::Operand(elt))
                        .chain([Task::Build { tag, arity }]),
                );
            }
            Tag::Binding => match elts.as_slice() {
                [key, value] => self.seq([
                    Task::Push(*key),
                    Task::Operand(*value),
                    Task::Build {
                        tag: Tag::Binding,
                        arity: 2,
                    },
                ]),
                _ => return Err(Error::Internal("malformed binding".into())),
            },
            Tag::Lambda => {
                let callee = self.lambda(&elts)?;
                self.apply(callee)?;
            }
            Tag::Case => match elts.first() {
                Some(&scrutinee) => self.seq([Task::Operand(scrutinee), Task::Case { nid }]),
                None => return Err(Error::Internal("CASE without scrutinee".into())),
            },
            Tag::Add
            | Tag::Sub
            | Tag::Div
            | Tag::Mod
            | Tag::Pow
            | Tag::Concat
            | Tag::Eq
            | Tag::Ne
            | Tag::Lt
            | Tag::Gt
            | Tag::Le
            | Tag::Ge => {
                let [a, b] = match elts.as_slice() {
                    [a, b] => [*a, *b],
                    _ => return Err(Error::Internal("binary operator needs two operands".into())),
                };
                let reduce = match tag {
                    Tag::Concat => Task::Concat,
                    Tag::Eq | Tag::Ne | Tag::Lt | Tag::Gt | Tag::Le | Tag::Ge => Task::Compare(tag),
                    _ => Task::Arithmetic(tag),
                };
                self.seq([Task::Operand(a), Task::Operand(b), reduce]);
            }
            Tag::Or | Tag::And => return Err(Error::Unimplemented(tag)),
            Tag::Neg => match elts.first() {
                Some(&elt) => self.seq([Task::Operand(elt), Task::Negate]),
                None => return Err(Error::Internal("NEG without operand".into())),
            },
            Tag::Num | Tag::Str | Tag::Ident | Tag::Bool | Tag::Null => {
                return Err(Error::Internal(format!("{tag} node with children")));
            }
        }
        Ok(())
    }

    fn ident(&mut self, nid: NodeId, name: Symbol) -> Result<()> {
        let Some(word) = self.env.lookup(name).cloned() else {
            self.push(nid);
            return Ok(());
        };
        match word.class {
            WordClass::Value if word.nid.is_none() => self.push(nid),
            WordClass::Value => self.push(word.nid),
            WordClass::Function => match word.closure {
                Some(closure) if !word.nid.is_none() => self.apply(Callee {
                    name,
                    body: word.nid,
                    pattern: closure.pattern,
                    lexicon: Some(closure.lexicon),
                })?,
                _ => self.push(nid),
            },
            WordClass::Operator(tag) => {
                let mut args = Vec::new();
                while args.len() < 2 {
                    match self.stack.pop() {
                        Some(arg) => args.push(arg),
                        None => break,
                    }
                }
                let complete = args.len() == 2;
                let id = self.pool.branch(tag, args);
                if complete {
                    self.tasks.push(Task::Visit(id));
                } else {
                    self.push(id);
                }
            }
        }
        Ok(())
    }

    fn lambda(&self, elts: &[NodeId]) -> Result<Callee> {
        match elts {
            [_, body, pattern] => Ok(Callee {
                name: Symbol::new("lambda"),
                body: *body,
                pattern: self.elts(*pattern)?,
                lexicon: None,
            }),
            _ => Err(Error::Internal("malformed lambda".into())),
        }
    }

    // ========================================================================
    // Application
    // ========================================================================

    /// Apply a function to the operands in the current frame. The first
    /// operand popped fills the first pattern.
    fn apply(&mut self, callee: Callee) -> Result<()> {
        let take = callee.arity().min(self.stack.frame_len());
        let args: Vec<NodeId> = (0..take).filter_map(|_| self.stack.pop()).collect();
        debug!(name = %callee.name, arity = callee.arity(), args = args.len(), "apply");

        self.env.enter(callee.name)?;
        if let Some(lexicon) = &callee.lexicon {
            self.env.extend(lexicon);
        }
        // Runs once everything scheduled for the body is done.
        self.tasks.push(Task::Exit);

        let mut late = false;
        for (position, &pattern) in callee.pattern.iter().enumerate() {
            let arg = args.get(position).copied().unwrap_or(NodeId::NONE);
            let source = if !arg.is_none()
                && self.pool.tag(pattern) == Some(Tag::List)
                && self.list_items(arg).is_none()
            {
                // Elements are picked out of the argument at call time.
                late = true;
                let index = self.pool.number(Number::from(position as i64));
                self.pool.branch(Tag::Arg, vec![index])
            } else {
                arg
            };
            self.bind_pattern(pattern, source, position)?;
        }

        if late {
            let names = self.pattern_names(&callee.pattern)?;
            let pattern = self.pool.branch(Tag::List, callee.pattern.clone());
            let arity = args.len() + 1;
            self.seq(
                [Task::Operand(callee.body), Task::Lambda { names, pattern }]
                    .into_iter()
                    .chain(args.iter().map(|&arg| Task::Push(arg)))
                    .chain([Task::Build {
                        tag: Tag::Apply,
                        arity,
                    }]),
            );
        } else if args.len() == callee.arity() {
            self.tasks.push(Task::Visit(callee.body));
        } else {
            // Partial application: a lambda over the patterns still unfilled.
            let rest = &callee.pattern[args.len()..];
            let names = self.pattern_names(rest)?;
            let pattern = self.pool.branch(Tag::List, rest.to_vec());
            self.seq([Task::Operand(callee.body), Task::Lambda { names, pattern }]);
        }
        Ok(())
    }

    /// Elements of a literal list, seen through grouping. A missing value
    /// has no elements.
    fn list_items(&self, value: NodeId) -> Option<Vec<NodeId>> {
        if value.is_none() {
            return Some(Vec::new());
        }
        match self.pool.get(self.pool.unwrap_group(value))? {
            Node::Branch {
                tag: Tag::List,
                elts,
            } => Some(elts.clone()),
            _ => None,
        }
    }

    /// Bind the names of `pattern` to the parts of `value`. A list pattern
    /// over something that is not a literal list binds its names to VAL
    /// projections of it.
    fn bind_pattern(&mut self, pattern: NodeId, value: NodeId, offset: usize) -> Result<()> {
        match self.node(pattern)? {
            &Node::Ident(name) => {
                self.env.bind(name, Word::value(name, offset).bound_to(value));
                Ok(())
            }
            Node::Branch {
                tag: Tag::List,
                elts,
            } => {
                let elts = elts.clone();
                let items = self.list_items(value);
                for (i, &elt) in elts.iter().enumerate() {
                    let item = match &items {
                        Some(items) => items.get(i).copied().unwrap_or(NodeId::NONE),
                        None => {
                            let index = self.pool.number(Number::from(i as i64));
                            self.pool.branch(Tag::Val, vec![index, value])
                        }
                    };
                    self.bind_pattern(elt, item, i)?;
                }
                Ok(())
            }
            _ => Err(Error::Internal("parameter pattern is not a name or list".into())),
        }
    }

    /// A LIST of every name the patterns bind, in source order.
    fn pattern_names(&mut self, patterns: &[NodeId]) -> Result<NodeId> {
        let mut names = Vec::new();
        let mut pending: Vec<NodeId> = patterns.iter().rev().copied().collect();
        while let Some(pattern) = pending.pop() {
            match self.node(pattern)? {
                Node::Ident(_) => names.push(pattern),
                Node::Branch {
                    tag: Tag::List,
                    elts,
                } => pending.extend(elts.iter().rev()),
                _ => return Err(Error::Internal("parameter pattern is not a name or list".into())),
            }
        }
        Ok(self.pool.branch(Tag::List, names))
    }

    // ========================================================================
    // Case
    // ========================================================================

    fn clause(&self, nid: NodeId) -> Result<Clause> {
        match self.node(nid)?.elts() {
            [pattern, body] => Ok(Clause {
                pattern: *pattern,
                body: *body,
                names: None,
            }),
            [pattern, body, names] => Ok(Clause {
                pattern: *pattern,
                body: *body,
                names: Some(*names),
            }),
            _ => Err(Error::Internal("malformed OF clause".into())),
        }
    }

    /// The name a clause binds the scrutinee to, if its pattern is a variable.
    fn pattern_variable(&self, clause: &Clause) -> Option<Symbol> {
        if clause.names.is_none() {
            return None;
        }
        match self.pool.get(clause.pattern)? {
            Node::Ident(name) => Some(*name),
            _ => None,
        }
    }

    /// Try the clauses of case `nid` from `index` on.
    fn select(&mut self, nid: NodeId, scrutinee: NodeId, index: usize) -> Result<()> {
        let Some(&clause) = self.node(nid)?.elts().get(index) else {
            return self.exhausted(nid, scrutinee);
        };
        let clause = self.clause(clause)?;
        if let Some(name) = self.pattern_variable(&clause) {
            self.env.enter(Symbol::new("case"))?;
            self.env.bind(name, Word::value(name, 0).bound_to(scrutinee));
            self.seq([Task::Visit(clause.body), Task::Exit]);
            return Ok(());
        }
        self.seq([
            Task::Operand(clause.pattern),
            Task::Clause {
                nid,
                index,
                scrutinee,
            },
        ]);
        Ok(())
    }

    fn try_clause(
        &mut self,
        nid: NodeId,
        index: usize,
        scrutinee: NodeId,
        pattern: NodeId,
    ) -> Result<()> {
        if self.pool.unwrap_group(pattern) == self.pool.unwrap_group(scrutinee) {
            let clause = match self.node(nid)?.elts().get(index) {
                Some(&clause) => self.clause(clause)?,
                None => return Err(Error::Internal("CASE clause out of range".into())),
            };
            self.tasks.push(Task::Visit(clause.body));
            return Ok(());
        }
        if self.pool.is_ground(scrutinee) && self.pool.is_ground(pattern) {
            return self.select(nid, scrutinee, index + 1);
        }
        // The match depends on a value only known later.
        self.residual_case(nid, scrutinee)
    }

    fn exhausted(&mut self, nid: NodeId, scrutinee: NodeId) -> Result<()> {
        if !self.pool.is_ground(scrutinee) {
            return self.residual_case(nid, scrutinee);
        }
        let scrutinee = self
            .pool
            .tree(scrutinee)
            .map(|tree| tree.to_string())
            .unwrap_or_default();
        Err(Error::NonExhaustiveCase {
            scrutinee,
            span: self.pool.coord(nid),
        })
    }

    fn residual_case(&mut self, nid: NodeId, scrutinee: NodeId) -> Result<()> {
        let clauses = self.elts(nid)?;
        let mut tasks = vec![Task::Push(scrutinee)];
        for &clause in clauses.iter().skip(1) {
            let clause = self.clause(clause)?;
            match (self.pattern_variable(&clause), clause.names) {
                (Some(name), Some(names)) => tasks.extend([
                    Task::Push(clause.pattern),
                    Task::Enter { name },
                    Task::Operand(clause.body),
                    Task::Exit,
                    Task::Push(names),
                    Task::Build {
                        tag: Tag::Of,
                        arity: 3,
                    },
                ]),
                _ => tasks.extend([
                    Task::Operand(clause.pattern),
                    Task::Operand(clause.body),
                    Task::Build {
                        tag: Tag::Of,
                        arity: 2,
                    },
                ]),
            }
        }
        tasks.push(Task::Build {
            tag: Tag::Case,
            arity: clauses.len(),
        });
        self.seq(tasks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Tree;

    fn fold_tree(tree: Tree) -> Result<String> {
        let mut pool = NodePool::new();
        let mut env = Environment::new();
        let id = pool.intern_tree(&tree);
        let folded = Folder::new(&mut pool, &mut env).fold(id)?;
        Ok(pool.tree(folded).unwrap().to_string())
    }

    fn n(x: f64) -> Tree {
        Tree::num(x)
    }

    fn node(tag: Tag, elts: Vec<Tree>) -> Tree {
        Tree::node(tag, elts)
    }

    fn lambda(params: &[&str], body: Vec<Tree>) -> Tree {
        let names: Vec<Tree> = params.iter().map(|p| Tree::ident(p)).collect();
        node(
            Tag::Lambda,
            vec![
                node(Tag::List, names.clone()),
                node(Tag::Exprs, body),
                node(Tag::List, names),
            ],
        )
    }

    #[test]
    fn test_operand_stack_frames() {
        let mut stack = OperandStack::new();
        stack.push(NodeId::from_index(1));
        stack.open();
        assert_eq!(stack.frame_len(), 0);
        assert_eq!(stack.pop(), None);
        stack.push(NodeId::from_index(2));
        stack.push(NodeId::from_index(3));
        assert_eq!(
            stack.close(),
            vec![NodeId::from_index(2), NodeId::from_index(3)]
        );
        assert_eq!(stack.frame_len(), 1);
    }

    #[test]
    fn test_arithmetic_on_literals() {
        let tree = node(Tag::Sub, vec![node(Tag::Add, vec![n(1.0), n(2.0)]), n(4.0)]);
        assert_eq!(fold_tree(tree).unwrap(), "-1");
        let tree = node(Tag::Div, vec![n(1.0), n(0.0)]);
        assert_eq!(fold_tree(tree).unwrap(), "Infinity");
    }

    #[test]
    fn test_residual_operator() {
        let tree = node(Tag::Add, vec![Tree::ident("free"), n(1.0)]);
        assert_eq!(fold_tree(tree).unwrap(), "(ADD free 1)");
    }

    #[test]
    fn test_equality_compares_raw_payloads() {
        let eq = node(Tag::Eq, vec![Tree::str("abc"), Tree::str("abc")]);
        assert_eq!(fold_tree(eq).unwrap(), "true");
        let ne = node(Tag::Ne, vec![Tree::str("abc"), Tree::str("abc")]);
        assert_eq!(fold_tree(ne).unwrap(), "true");
        let eq = node(Tag::Eq, vec![n(2.0), Tree::str("2")]);
        assert_eq!(fold_tree(eq).unwrap(), "true");
        let lt = node(Tag::Lt, vec![Tree::str("10"), n(9.0)]);
        assert_eq!(fold_tree(lt).unwrap(), "false");
    }

    #[test]
    fn test_concat_literals() {
        let tree = node(Tag::Concat, vec![Tree::str("a"), n(1.0)]);
        assert_eq!(fold_tree(tree).unwrap(), "\"a1\"");
    }

    #[test]
    fn test_or_and_are_unimplemented() {
        let tree = node(Tag::Or, vec![Tree::Bool(true), Tree::Bool(false)]);
        assert_eq!(fold_tree(tree), Err(Error::Unimplemented(Tag::Or)));
    }

    #[test]
    fn test_full_application() {
        let tree = node(
            Tag::Exprs,
            vec![lambda(&["x", "y"], vec![node(Tag::Sub, vec![Tree::ident("x"), Tree::ident("y")])]), n(10.0), n(4.0)],
        );
        assert_eq!(fold_tree(tree).unwrap(), "6");
    }

    #[test]
    fn test_partial_application() {
        let tree = node(
            Tag::Exprs,
            vec![lambda(&["x", "y"], vec![node(Tag::Sub, vec![Tree::ident("x"), Tree::ident("y")])]), n(10.0)],
        );
        assert_eq!(
            fold_tree(tree).unwrap(),
            "(LAMBDA (LIST y) (SUB 10 y) (LIST y))"
        );
    }

    #[test]
    fn test_late_application() {
        let list_lambda = node(
            Tag::Lambda,
            vec![
                node(Tag::List, vec![Tree::ident("a"), Tree::ident("b")]),
                node(Tag::Exprs, vec![Tree::ident("b")]),
                node(
                    Tag::List,
                    vec![node(Tag::List, vec![Tree::ident("a"), Tree::ident("b")])],
                ),
            ],
        );
        let applied = node(Tag::Exprs, vec![list_lambda.clone(), Tree::ident("data")]);
        assert_eq!(
            fold_tree(applied).unwrap(),
            "(APPLY (LAMBDA (LIST a b) (VAL 1 (ARG 0)) (LIST (LIST a b))) data)"
        );

        let literal = node(
            Tag::Exprs,
            vec![list_lambda, node(Tag::List, vec![n(1.0), n(2.0)])],
        );
        assert_eq!(fold_tree(literal).unwrap(), "2");
    }

    #[test]
    fn test_case_selection() {
        let case = node(
            Tag::Case,
            vec![
                n(2.0),
                node(Tag::Of, vec![n(1.0), node(Tag::Exprs, vec![n(10.0)])]),
                node(Tag::Of, vec![n(2.0), node(Tag::Exprs, vec![n(20.0)])]),
            ],
        );
        assert_eq!(fold_tree(case).unwrap(), "20");
    }

    #[test]
    fn test_case_pattern_variable() {
        let case = node(
            Tag::Case,
            vec![
                n(7.0),
                node(Tag::Of, vec![n(1.0), node(Tag::Exprs, vec![n(10.0)])]),
                node(
                    Tag::Of,
                    vec![
                        Tree::ident("other"),
                        node(Tag::Exprs, vec![node(Tag::Add, vec![Tree::ident("other"), n(1.0)])]),
                        node(Tag::List, vec![Tree::ident("other")]),
                    ],
                ),
            ],
        );
        assert_eq!(fold_tree(case).unwrap(), "8");
    }

    #[test]
    fn test_case_on_structured_scrutinee() {
        let list = |x: f64| node(Tag::List, vec![n(x)]);
        let case = node(
            Tag::Case,
            vec![
                list(2.0),
                node(Tag::Of, vec![list(1.0), node(Tag::Exprs, vec![Tree::str("a")])]),
                node(Tag::Of, vec![list(2.0), node(Tag::Exprs, vec![Tree::str("b")])]),
            ],
        );
        assert_eq!(fold_tree(case).unwrap(), "\"b\"");
    }

    #[test]
    fn test_residual_case_keeps_pattern_variable_free() {
        let case = node(
            Tag::Case,
            vec![
                Tree::ident("x"),
                node(Tag::Of, vec![n(1.0), node(Tag::Exprs, vec![n(10.0)])]),
                node(
                    Tag::Of,
                    vec![
                        Tree::ident("y"),
                        node(Tag::Exprs, vec![Tree::ident("y")]),
                        node(Tag::List, vec![Tree::ident("y")]),
                    ],
                ),
            ],
        );
        assert_eq!(
            fold_tree(case).unwrap(),
            "(CASE x (OF 1 10) (OF y y (LIST y)))"
        );
    }

    #[test]
    fn test_mixed_pattern_application() {
        let mixed = node(
            Tag::Lambda,
            vec![
                node(Tag::List, vec![Tree::ident("a"), Tree::ident("b"), Tree::ident("c")]),
                node(Tag::Exprs, vec![node(Tag::Add, vec![Tree::ident("a"), Tree::ident("c")])]),
                node(
                    Tag::List,
                    vec![
                        Tree::ident("a"),
                        node(Tag::List, vec![Tree::ident("b"), Tree::ident("c")]),
                    ],
                ),
            ],
        );
        let literal = node(
            Tag::Exprs,
            vec![mixed.clone(), n(1.0), node(Tag::List, vec![n(2.0), n(3.0)])],
        );
        assert_eq!(fold_tree(literal).unwrap(), "4");

        let late = node(Tag::Exprs, vec![mixed, n(1.0), Tree::ident("pair")]);
        assert_eq!(
            fold_tree(late).unwrap(),
            "(APPLY (LAMBDA (LIST a b c) (ADD 1 (VAL 1 (ARG 1))) (LIST a (LIST b c))) 1 pair)"
        );
    }

    #[test]
    fn test_failed_fold_restores_scope_depth() {
        let mut pool = NodePool::new();
        let mut env = Environment::new();
        let body = vec![node(Tag::Or, vec![Tree::ident("x"), n(1.0)])];
        let tree = node(Tag::Exprs, vec![lambda(&["x"], body), n(1.0)]);
        let id = pool.intern_tree(&tree);
        let result = Folder::new(&mut pool, &mut env).fold(id);
        assert_eq!(result, Err(Error::Unimplemented(Tag::Or)));
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn test_case_without_match() {
        let case = node(
            Tag::Case,
            vec![n(3.0), node(Tag::Of, vec![n(1.0), node(Tag::Exprs, vec![n(10.0)])])],
        );
        assert!(matches!(
            fold_tree(case),
            Err(Error::NonExhaustiveCase { ref scrutinee, .. }) if scrutinee == "3"
        ));

        let residual = node(
            Tag::Case,
            vec![
                Tree::ident("x"),
                node(Tag::Of, vec![n(1.0), node(Tag::Exprs, vec![n(10.0)])]),
            ],
        );
        assert_eq!(fold_tree(residual).unwrap(), "(CASE x (OF 1 10))");
    }
}
