//! Resumable parser
//!
//! The grammar is written as an explicit stack of continuations. Each call to
//! [`ParseState::step`] feeds exactly one token and runs suspended grammar
//! positions until one of them needs a token that has not arrived yet, so a
//! host can parse a buffer line by line and clone the state between lines.
//!
//! Nodes are interned as they are recognized and their ids are kept on an
//! operand stack. Expression lists, parameter lists and records remember the
//! stack height they started at and collect everything above it when they
//! close.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::environment::{Closure, Environment, Word, WordClass};
use crate::error::{Diagnostic, Error, Result};
use crate::folder::arithmetic;
use crate::interner::Symbol;
use crate::language::{Node, NodeId, Span, Tag};
use crate::lexer::{Token, TokenKind};
use crate::numeric::Number;
use crate::pool::NodePool;

/// Highlighting class of a consumed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Keyword,
    Number,
    String,
    Variable,
    Operator,
    Punc,
    Def,
    Param,
    Comment,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Parsing,
    Complete,
    Failed,
}

/// A suspended grammar position.
#[derive(Debug, Clone, PartialEq)]
enum Cont {
    Program,
    Exprs { brk: TokenKind, base: usize },
    ExprsNext { brk: TokenKind, base: usize },
    ExprsAfterDot { brk: TokenKind, base: usize },
    Expr,
    LetName,
    LetEqual { depth: usize, name: Symbol, base: usize },
    LetBody { depth: usize, name: Symbol, base: usize },
    Params { brk: TokenKind, base: usize },
    ParamList { base: usize },
    LambdaColon { base: usize },
    LambdaEnd { base: usize },
    Operand,
    Negate { span: Span },
    Binary { ops: Vec<(Tag, Span)> },
    Primary,
    ParenEnd { span: Span },
    Elements,
    ElementNext,
    ListEnd { base: usize },
    Bindings,
    BindingColon,
    BindingNext,
    RecordEnd { base: usize, span: Span },
    CaseClauses { base: usize, span: Span },
    Pattern,
    OfColon,
    OfEnd,
    IfThen { base: usize, span: Span },
    IfElse { base: usize, span: Span },
    IfEnd { base: usize, span: Span },
}

impl Cont {
    /// Reductions run on what is already on the operand stack.
    fn needs_token(&self) -> bool {
        !matches!(
            self,
            Cont::LetBody { .. } | Cont::Negate { .. } | Cont::OfEnd
        )
    }
}

/// Tokens that can open an expression. Anything else closes the current list.
fn starts_expr(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Num
            | TokenKind::Str
            | TokenKind::Bool
            | TokenKind::Null
            | TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::LeftBrace
            | TokenKind::LeftAngle
            | TokenKind::Minus
            | TokenKind::Let
            | TokenKind::Case
            | TokenKind::If
    )
}

// ============================================================================
// Parse State
// ============================================================================

/// Everything the parser carries between tokens. Cloning it is a checkpoint.
#[derive(Debug, Clone)]
pub struct ParseState {
    conts: Vec<Cont>,
    stack: Vec<NodeId>,
    env: Environment,
    errors: Vec<Diagnostic>,
    status: Status,
    fatal: Option<Error>,
    root: NodeId,
}

impl ParseState {
    pub fn new(env: Environment) -> Self {
        ParseState {
            conts: vec![
                Cont::Program,
                Cont::Exprs {
                    brk: TokenKind::Dot,
                    base: 0,
                },
            ],
            stack: Vec::new(),
            env,
            errors: Vec::new(),
            status: Status::Parsing,
            fatal: None,
            root: NodeId::NONE,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The PROG node once the program is complete
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Soft errors collected so far
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// The error that stopped the parse, if any
    pub fn fatal(&self) -> Option<&Error> {
        self.fatal.as_ref()
    }

    /// Feed one token. Tokens arriving after the program completed or failed
    /// are classed as errors and otherwise ignored.
    pub fn step(&mut self, pool: &mut NodePool, token: Token) -> Result<Class> {
        if self.status != Status::Parsing {
            return Ok(Class::Error);
        }
        trace!(kind = ?token.kind, lexeme = %token.lexeme, "step");
        let result = Parser {
            pool,
            state: self,
            token: Some(token),
            class: Class::Error,
        }
        .run();
        if let Err(err) = &result {
            debug!(error = %err, "parse failed");
            self.status = Status::Failed;
            self.fatal = Some(err.clone());
            self.conts.clear();
        }
        result
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    pool: &'a mut NodePool,
    state: &'a mut ParseState,
    token: Option<Token>,
    class: Class,
}

impl Parser<'_> {
    fn run(mut self) -> Result<Class> {
        while let Some(cont) = self.state.conts.pop() {
            if self.token.is_none() && cont.needs_token() {
                self.state.conts.push(cont);
                break;
            }
            self.resume(cont)?;
        }
        Ok(self.class)
    }

    /// Schedule continuations to run in the given order.
    fn seq<const N: usize>(&mut self, conts: [Cont; N]) {
        self.state.conts.extend(conts.into_iter().rev());
    }

    fn peek(&self) -> TokenKind {
        self.token.as_ref().map_or(TokenKind::Eof, |tok| tok.kind)
    }

    fn lexeme(&self) -> &str {
        self.token.as_ref().map_or("", |tok| tok.lexeme.as_str())
    }

    fn eat(&mut self, kind: TokenKind, class: Class) -> Result<Token> {
        let token = self
            .token
            .take()
            .ok_or_else(|| Error::Internal("no token to consume".into()))?;
        if token.kind != kind {
            return Err(Error::Syntax {
                message: format!(
                    "Expecting {}, found {}.",
                    kind.describe(),
                    token.kind.describe()
                ),
                span: token.span,
            });
        }
        self.class = class;
        Ok(token)
    }

    fn push(&mut self, id: NodeId) {
        self.state.stack.push(id);
    }

    fn pop(&mut self) -> Result<NodeId> {
        self.state
            .stack
            .pop()
            .ok_or_else(|| Error::Internal("operand stack underflow".into()))
    }

    fn drain_from(&mut self, base: usize) -> Vec<NodeId> {
        let base = base.min(self.state.stack.len());
        self.state.stack.split_off(base)
    }

    fn height(&self) -> usize {
        self.state.stack.len()
    }

    fn resume(&mut self, cont: Cont) -> Result<()> {
        match cont {
            Cont::Program => {
                self.eat(TokenKind::Eof, Class::Comment)?;
                let exprs = self.pop()?;
                let prog = self.pool.branch(Tag::Prog, vec![exprs]);
                self.state.root = prog;
                self.state.status = Status::Complete;
                debug!(root = %prog, nodes = self.pool.len(), "program complete");
            }

            // Expression lists
            Cont::Exprs { brk, base } => match self.peek() {
                TokenKind::Dot => {
                    self.eat(TokenKind::Dot, Class::Punc)?;
                    self.finish_exprs(base);
                }
                kind if kind == brk || !starts_expr(kind) => self.finish_exprs(base),
                _ => self.seq([Cont::Expr, Cont::ExprsNext { brk, base }]),
            },
            Cont::ExprsNext { brk, base } => match self.peek() {
                TokenKind::Dot => {
                    self.eat(TokenKind::Dot, Class::Punc)?;
                    self.seq([Cont::ExprsAfterDot { brk, base }]);
                }
                kind if kind == brk || !starts_expr(kind) => self.finish_exprs(base),
                _ => self.seq([Cont::Expr, Cont::ExprsNext { brk, base }]),
            },
            Cont::ExprsAfterDot { brk, base } => match self.peek() {
                kind if kind == brk || !starts_expr(kind) => self.finish_exprs(base),
                _ => self.seq([Cont::Expr, Cont::ExprsNext { brk, base }]),
            },

            Cont::Expr => match self.peek() {
                TokenKind::Let => {
                    self.eat(TokenKind::Let, Class::Keyword)?;
                    self.seq([Cont::LetName]);
                }
                TokenKind::Case => {
                    let tok = self.eat(TokenKind::Case, Class::Keyword)?;
                    let base = self.height();
                    self.seq([
                        Cont::Expr,
                        Cont::CaseClauses {
                            base,
                            span: tok.span,
                        },
                    ]);
                }
                TokenKind::If => {
                    let tok = self.eat(TokenKind::If, Class::Keyword)?;
                    let base = self.height();
                    self.seq([
                        Cont::Expr,
                        Cont::IfThen {
                            base,
                            span: tok.span,
                        },
                    ]);
                }
                _ => self.seq([Cont::Operand, Cont::Binary { ops: Vec::new() }]),
            },

            // let name params = body ..
            Cont::LetName => {
                let tok = self.eat(TokenKind::Ident, Class::Def)?;
                let name = Symbol::new(&tok.lexeme);
                let depth = self.state.env.depth() - 1;
                self.state.env.bind(name, Word::function(name));
                self.state.env.enter(name)?;
                let base = self.height();
                self.seq([
                    Cont::Params {
                        brk: TokenKind::Equal,
                        base,
                    },
                    Cont::LetEqual { depth, name, base },
                ]);
            }
            Cont::LetEqual { depth, name, base } => {
                self.eat(TokenKind::Equal, Class::Punc)?;
                let body_base = self.height();
                self.seq([
                    Cont::Exprs {
                        brk: TokenKind::Dot,
                        base: body_base,
                    },
                    Cont::LetBody { depth, name, base },
                ]);
            }
            Cont::LetBody { depth, name, base } => {
                let body = self.pop()?;
                let pattern = self.drain_from(base);
                let scope = self
                    .state
                    .env
                    .exit()
                    .ok_or_else(|| Error::Internal("let scope missing".into()))?;
                let word = Word {
                    arity: pattern.len(),
                    closure: Some(Closure {
                        params: scope.params(),
                        lexicon: scope.lexicon,
                        pattern,
                    }),
                    ..Word::function(name).bound_to(body)
                };
                debug!(name = %name, arity = word.arity, body = %body, "defined function");
                self.state.env.bind_at(depth, name, word);
            }

            // Parameters
            Cont::Params { brk, base } => match self.peek() {
                kind if kind == brk => {}
                TokenKind::LeftBracket => {
                    self.eat(TokenKind::LeftBracket, Class::Punc)?;
                    let inner = self.height();
                    self.seq([
                        Cont::Params {
                            brk: TokenKind::RightBracket,
                            base: inner,
                        },
                        Cont::ParamList { base: inner },
                        Cont::Params { brk, base },
                    ]);
                }
                _ => {
                    let tok = self.eat(TokenKind::Ident, Class::Param)?;
                    let name = Symbol::new(&tok.lexeme);
                    // Offsets run on through nested list patterns.
                    let offset = self.state.env.top().params().len();
                    self.state.env.bind(name, Word::value(name, offset));
                    let id = self.pool.intern_at(Node::Ident(name), Some(tok.span));
                    self.push(id);
                    self.seq([Cont::Params { brk, base }]);
                }
            },
            Cont::ParamList { base } => {
                self.eat(TokenKind::RightBracket, Class::Punc)?;
                let elts = self.drain_from(base);
                let list = self.pool.branch(Tag::List, elts.clone());
                for elt in elts {
                    if let Some(Node::Ident(name)) = self.pool.get(elt) {
                        let name = *name;
                        if let Some(word) = self.state.env.top().get(name).cloned() {
                            let patterns = vec![list];
                            self.state.env.bind(name, Word { patterns, ..word });
                        }
                    }
                }
                self.push(list);
            }

            // <params: body>
            Cont::LambdaColon { base } => {
                self.eat(TokenKind::Colon, Class::Punc)?;
                let body_base = self.height();
                self.seq([
                    Cont::Exprs {
                        brk: TokenKind::RightAngle,
                        base: body_base,
                    },
                    Cont::LambdaEnd { base },
                ]);
            }
            Cont::LambdaEnd { base } => {
                let tok = self.eat(TokenKind::RightAngle, Class::Punc)?;
                let body = self.pop()?;
                let pattern = self.drain_from(base);
                let scope = self
                    .state
                    .env
                    .exit()
                    .ok_or_else(|| Error::Internal("lambda scope missing".into()))?;
                let names = scope
                    .params()
                    .into_iter()
                    .map(|name| self.pool.ident(name))
                    .collect();
                let names = self.pool.branch(Tag::List, names);
                let pattern = self.pool.branch(Tag::List, pattern);
                let lambda = self.pool.intern_at(
                    Node::branch(Tag::Lambda, vec![names, body, pattern]),
                    Some(tok.span),
                );
                self.push(lambda);
            }

            // Operators
            Cont::Operand => {
                if self.peek() == TokenKind::Minus {
                    let tok = self.eat(TokenKind::Minus, Class::Number)?;
                    self.seq([Cont::Primary, Cont::Negate { span: tok.span }]);
                } else {
                    self.seq([Cont::Primary]);
                }
            }
            Cont::Negate { span } => {
                let operand = self.pop()?;
                let id = match self.pool.number_of(operand) {
                    Some(n) => self.pool.intern_at(Node::Num(n.neg()), Some(span)),
                    None => self
                        .pool
                        .intern_at(Node::branch(Tag::Neg, vec![operand]), Some(span)),
                };
                self.push(id);
            }
            Cont::Binary { mut ops } => match self.binary_operator()? {
                Some(tag) => {
                    let tok = self.eat(self.peek(), Class::Operator)?;
                    let prec = tag.precedence().unwrap_or(0);
                    while let Some(&(top, span)) = ops.last() {
                        if top.precedence().unwrap_or(0) < prec {
                            break;
                        }
                        ops.pop();
                        self.reduce(top, span)?;
                    }
                    ops.push((tag, tok.span));
                    self.seq([Cont::Operand, Cont::Binary { ops }]);
                }
                None => {
                    while let Some((tag, span)) = ops.pop() {
                        self.reduce(tag, span)?;
                    }
                }
            },

            // Primary expressions
            Cont::Primary => self.primary()?,
            Cont::ParenEnd { span } => {
                self.eat(TokenKind::RightParen, Class::Punc)?;
                let inner = self.pop()?;
                let id = self
                    .pool
                    .intern_at(Node::branch(Tag::Paren, vec![inner]), Some(span));
                self.push(id);
            }
            Cont::Elements => {
                if self.peek() != TokenKind::RightBracket {
                    self.seq([Cont::Expr, Cont::ElementNext]);
                }
            }
            Cont::ElementNext => {
                if self.peek() == TokenKind::Comma {
                    self.eat(TokenKind::Comma, Class::Punc)?;
                }
                self.seq([Cont::Elements]);
            }
            Cont::ListEnd { base } => {
                let tok = self.eat(TokenKind::RightBracket, Class::Punc)?;
                let elts = self.drain_from(base);
                let id = self
                    .pool
                    .intern_at(Node::branch(Tag::List, elts), Some(tok.span));
                self.push(id);
            }
            Cont::Bindings => match self.peek() {
                TokenKind::RightBrace => {}
                TokenKind::Str => {
                    let tok = self.eat(TokenKind::Str, Class::String)?;
                    let id = self.string(&tok);
                    self.push(id);
                    self.seq([Cont::BindingColon, Cont::BindingNext]);
                }
                _ => {
                    let tok = self.eat(TokenKind::Ident, Class::Def)?;
                    let id = self
                        .pool
                        .intern_at(Node::Ident(Symbol::new(&tok.lexeme)), Some(tok.span));
                    self.push(id);
                    self.seq([Cont::BindingColon, Cont::BindingNext]);
                }
            },
            Cont::BindingColon => {
                self.eat(TokenKind::Colon, Class::Punc)?;
                self.seq([Cont::Expr]);
            }
            Cont::BindingNext => {
                let value = self.pop()?;
                let key = self.pop()?;
                let binding = self.pool.branch(Tag::Binding, vec![key, value]);
                self.push(binding);
                if self.peek() == TokenKind::Comma {
                    self.eat(TokenKind::Comma, Class::Punc)?;
                }
                self.seq([Cont::Bindings]);
            }
            Cont::RecordEnd { base, span } => {
                self.eat(TokenKind::RightBrace, Class::Punc)?;
                let elts = self.drain_from(base);
                let id = self
                    .pool
                    .intern_at(Node::branch(Tag::Record, elts), Some(span));
                self.push(id);
            }

            // case e of p: body ... end
            Cont::CaseClauses { base, span } => match self.peek() {
                TokenKind::Of => {
                    self.eat(TokenKind::Of, Class::Keyword)?;
                    self.state.env.enter(Symbol::new("case"))?;
                    self.seq([
                        Cont::Pattern,
                        Cont::OfColon,
                        Cont::OfEnd,
                        Cont::CaseClauses { base, span },
                    ]);
                }
                _ => {
                    self.eat(TokenKind::End, Class::Keyword)?;
                    let elts = self.drain_from(base);
                    let id = self
                        .pool
                        .intern_at(Node::branch(Tag::Case, elts), Some(span));
                    self.push(id);
                }
            },
            Cont::Pattern => {
                let unbound = self.peek() == TokenKind::Ident
                    && self.state.env.lookup(Symbol::new(self.lexeme())).is_none();
                if unbound {
                    // An unknown name in pattern position binds the scrutinee.
                    let tok = self.eat(TokenKind::Ident, Class::Param)?;
                    let name = Symbol::new(&tok.lexeme);
                    let id = self.pool.intern_at(Node::Ident(name), Some(tok.span));
                    let word = Word {
                        patterns: vec![id],
                        ..Word::value(name, 0)
                    };
                    self.state.env.bind(name, word);
                    self.push(id);
                } else {
                    self.seq([Cont::Operand]);
                }
            }
            Cont::OfColon => {
                self.eat(TokenKind::Colon, Class::Punc)?;
                let base = self.height();
                self.seq([Cont::Exprs {
                    brk: TokenKind::Of,
                    base,
                }]);
            }
            Cont::OfEnd => {
                let body = self.pop()?;
                let pattern = self.pop()?;
                let scope = self
                    .state
                    .env
                    .exit()
                    .ok_or_else(|| Error::Internal("case scope missing".into()))?;
                // A clause that binds its pattern lists the names it binds.
                let names = scope.params();
                let clause = if names.is_empty() {
                    self.pool.branch(Tag::Of, vec![pattern, body])
                } else {
                    let names = names.into_iter().map(|name| self.pool.ident(name)).collect();
                    let names = self.pool.branch(Tag::List, names);
                    self.pool.branch(Tag::Of, vec![pattern, body, names])
                };
                self.push(clause);
            }

            // if c then a else b end
            Cont::IfThen { base, span } => {
                self.eat(TokenKind::Then, Class::Keyword)?;
                let body_base = self.height();
                self.seq([
                    Cont::Exprs {
                        brk: TokenKind::Else,
                        base: body_base,
                    },
                    Cont::IfElse { base, span },
                ]);
            }
            Cont::IfElse { base, span } => {
                if self.peek() == TokenKind::Else {
                    self.eat(TokenKind::Else, Class::Keyword)?;
                    let body_base = self.height();
                    self.seq([
                        Cont::Exprs {
                            brk: TokenKind::End,
                            base: body_base,
                        },
                        Cont::IfEnd { base, span },
                    ]);
                } else {
                    let empty = self.pool.branch(Tag::Exprs, Vec::new());
                    self.push(empty);
                    self.seq([Cont::IfEnd { base, span }]);
                }
            }
            Cont::IfEnd { base, span } => {
                self.eat(TokenKind::End, Class::Keyword)?;
                let (cond, yes, no) = match self.drain_from(base).as_slice() {
                    [cond, yes, no] => (*cond, *yes, *no),
                    _ => return Err(Error::Internal("malformed conditional".into())),
                };
                let t = self.pool.boolean(true);
                let f = self.pool.boolean(false);
                let yes = self.pool.branch(Tag::Of, vec![t, yes]);
                let no = self.pool.branch(Tag::Of, vec![f, no]);
                let id = self
                    .pool
                    .intern_at(Node::branch(Tag::Case, vec![cond, yes, no]), Some(span));
                self.push(id);
            }
        }
        Ok(())
    }

    fn finish_exprs(&mut self, base: usize) {
        let elts = self.drain_from(base);
        let id = self.pool.branch(Tag::Exprs, elts);
        self.push(id);
    }

    /// The operator tag of the current token, if it is an infix operator.
    fn binary_operator(&self) -> Result<Option<Tag>> {
        match self.peek() {
            TokenKind::Minus => Ok(Some(Tag::Sub)),
            TokenKind::BinOp => {
                let name = Symbol::new(self.lexeme());
                match self.state.env.globals().get(name).map(|word| word.class) {
                    Some(WordClass::Operator(tag)) => Ok(Some(tag)),
                    _ => Err(Error::Internal(format!("'{name}' is not an operator"))),
                }
            }
            _ => Ok(None),
        }
    }

    /// Combine the two topmost operands. Arithmetic on two numbers is
    /// computed on the spot.
    fn reduce(&mut self, tag: Tag, span: Span) -> Result<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let folded = match (self.pool.number_of(lhs), self.pool.number_of(rhs)) {
            (Some(a), Some(b)) => arithmetic(tag, a, b),
            _ => None,
        };
        let node = match folded {
            Some(n) => Node::Num(n),
            None => Node::branch(tag, vec![lhs, rhs]),
        };
        let id = self.pool.intern_at(node, Some(span));
        self.push(id);
        Ok(())
    }

    fn string(&mut self, tok: &Token) -> NodeId {
        let quoted = tok.lexeme.as_str();
        let text = quoted
            .get(1..quoted.len().saturating_sub(1))
            .unwrap_or_default();
        self.pool
            .intern_at(Node::Str(text.to_string()), Some(tok.span))
    }

    fn primary(&mut self) -> Result<()> {
        match self.peek() {
            TokenKind::Num => {
                let tok = self.eat(TokenKind::Num, Class::Number)?;
                let n = Number::parse(&tok.lexeme);
                let id = self.pool.intern_at(Node::Num(n), Some(tok.span));
                self.push(id);
            }
            TokenKind::Str => {
                let tok = self.eat(TokenKind::Str, Class::String)?;
                let id = self.string(&tok);
                self.push(id);
            }
            TokenKind::Bool => {
                let tok = self.eat(TokenKind::Bool, Class::Number)?;
                let id = self
                    .pool
                    .intern_at(Node::Bool(tok.lexeme == "true"), Some(tok.span));
                self.push(id);
            }
            TokenKind::Null => {
                let tok = self.eat(TokenKind::Null, Class::Number)?;
                let id = self.pool.intern_at(Node::Null, Some(tok.span));
                self.push(id);
            }
            TokenKind::LeftBrace => {
                let tok = self.eat(TokenKind::LeftBrace, Class::Punc)?;
                let base = self.height();
                self.seq([
                    Cont::Bindings,
                    Cont::RecordEnd {
                        base,
                        span: tok.span,
                    },
                ]);
            }
            TokenKind::LeftParen => {
                let tok = self.eat(TokenKind::LeftParen, Class::Punc)?;
                let base = self.height();
                self.seq([
                    Cont::Exprs {
                        brk: TokenKind::RightParen,
                        base,
                    },
                    Cont::ParenEnd { span: tok.span },
                ]);
            }
            TokenKind::LeftBracket => {
                self.eat(TokenKind::LeftBracket, Class::Punc)?;
                let base = self.height();
                self.seq([Cont::Elements, Cont::ListEnd { base }]);
            }
            TokenKind::LeftAngle => {
                self.eat(TokenKind::LeftAngle, Class::Punc)?;
                self.state.env.enter(Symbol::new("lambda"))?;
                let base = self.height();
                self.seq([
                    Cont::Params {
                        brk: TokenKind::Colon,
                        base,
                    },
                    Cont::LambdaColon { base },
                ]);
            }
            _ => self.name()?,
        }
        Ok(())
    }

    fn name(&mut self) -> Result<()> {
        let tok = self.eat(TokenKind::Ident, Class::Variable)?;
        let name = Symbol::new(&tok.lexeme);
        let word = self.state.env.lookup(name).cloned();
        let id = match word.as_ref().and_then(|word| self.constant(word)) {
            Some(literal) => literal,
            None => self.pool.intern_at(Node::Ident(name), Some(tok.span)),
        };
        if word.is_none() {
            warn!(name = %tok.lexeme, line = tok.span.line, "name not found");
            self.state
                .errors
                .push(Diagnostic::name_not_found(tok.span, &tok.lexeme));
            self.class = Class::Error;
        }
        self.push(id);
        Ok(())
    }

    /// The literal a zero-arity definition stands for, when its body is a
    /// single literal.
    fn constant(&self, word: &Word) -> Option<NodeId> {
        if word.class != WordClass::Function || word.arity != 0 {
            return None;
        }
        match self.pool.get(word.nid)? {
            Node::Branch {
                tag: Tag::Exprs,
                elts,
            } => match elts.as_slice() {
                [only] if self.pool.get(*only)?.literal().is_some() => Some(*only),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Lexed, Scanner};

    fn parse(src: &str) -> (NodePool, ParseState, Vec<Class>) {
        let mut pool = NodePool::new();
        let mut state = ParseState::new(Environment::new());
        let mut classes = Vec::new();
        for (line, text) in src.lines().enumerate() {
            let mut scanner = Scanner::new(text, line as u32);
            while let Some(lexed) = scanner.scan(state.env().globals()) {
                if let Lexed::Token(tok) = lexed {
                    classes.push(state.step(&mut pool, tok).unwrap_or(Class::Error));
                }
            }
        }
        let _ = state.step(&mut pool, Token::eof(Span::default()));
        (pool, state, classes)
    }

    fn tree(src: &str) -> String {
        let (pool, state, _) = parse(src);
        assert_eq!(state.status(), Status::Complete, "{:?}", state.fatal());
        pool.tree(state.root()).unwrap().to_string()
    }

    fn syntax_error(src: &str) -> String {
        let (_, state, _) = parse(src);
        assert_eq!(state.status(), Status::Failed);
        state.fatal().unwrap().to_string()
    }

    #[test]
    fn test_arithmetic_folds_while_parsing() {
        assert_eq!(tree("2 + 3."), "(PROG (EXPRS 5))");
        assert_eq!(tree("10 / 4."), "(PROG (EXPRS 2.5))");
        assert_eq!(tree("2 ^ 3."), "(PROG (EXPRS 8))");
        assert_eq!(tree("7 % 4."), "(PROG (EXPRS 3))");
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(tree("2 - 3 - 4."), "(PROG (EXPRS -5))");
        assert_eq!(tree("1 + 2 ^ 3."), "(PROG (EXPRS 9))");
        assert_eq!(tree("(1 + 2) ^ 2."), "(PROG (EXPRS 9))");
    }

    #[test]
    fn test_operator_nodes_for_names() {
        assert_eq!(tree("<x: x + 1>."), "(PROG (EXPRS (LAMBDA (LIST x) (EXPRS (ADD x 1)) (LIST x))))");
        assert_eq!(tree("1 lt 2."), "(PROG (EXPRS (LT 1 2)))");
        assert_eq!(tree("'a' concat 'b'."), "(PROG (EXPRS (CONCAT \"a\" \"b\")))");
    }

    #[test]
    fn test_negation() {
        assert_eq!(tree("-(2)."), "(PROG (EXPRS -2))");
        assert_eq!(tree("<x: -x>."), "(PROG (EXPRS (LAMBDA (LIST x) (EXPRS (NEG x)) (LIST x))))");
    }

    #[test]
    fn test_expression_lists() {
        assert_eq!(tree("1. 2. 3."), "(PROG (EXPRS 1 2 3))");
        assert_eq!(tree("<x: x> 5."), "(PROG (EXPRS (LAMBDA (LIST x) (EXPRS x) (LIST x)) 5))");
        assert_eq!(tree(""), "(PROG (EXPRS))");
        assert_eq!(tree("(1 2)."), "(PROG (EXPRS (PAREN (EXPRS 1 2))))");
    }

    #[test]
    fn test_list_pattern_lambda() {
        assert_eq!(
            tree("<[a b]: a>."),
            "(PROG (EXPRS (LAMBDA (LIST a b) (EXPRS a) (LIST (LIST a b)))))"
        );
    }

    #[test]
    fn test_mixed_patterns_number_params_in_source_order() {
        assert_eq!(
            tree("<a [b c] d: c>."),
            "(PROG (EXPRS (LAMBDA (LIST a b c d) (EXPRS c) (LIST a (LIST b c) d))))"
        );
        let (_, state, _) = parse("let g [x y] z = z..");
        let word = state.env().lookup(Symbol::new("g")).unwrap();
        assert_eq!(word.arity, 2);
        let closure = word.closure.as_ref().unwrap();
        let params: Vec<String> = closure.params.iter().map(Symbol::resolve).collect();
        assert_eq!(params, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_let_contributes_no_expression() {
        let (pool, state, _) = parse("let f x y = x.. f 1 2.");
        assert_eq!(pool.tree(state.root()).unwrap().to_string(), "(PROG (EXPRS f 1 2))");
        let word = state.env().lookup(Symbol::new("f")).unwrap();
        assert_eq!(word.class, WordClass::Function);
        assert_eq!(word.arity, 2);
        let closure = word.closure.as_ref().unwrap();
        let params: Vec<String> = closure.params.iter().map(Symbol::resolve).collect();
        assert_eq!(params, vec!["x", "y"]);
        assert_eq!(pool.tree(word.nid).unwrap().to_string(), "(EXPRS x)");
    }

    #[test]
    fn test_zero_arity_literal_propagates() {
        assert_eq!(tree("let k = 7.. k + 1."), "(PROG (EXPRS 8))");
    }

    #[test]
    fn test_lists_and_records() {
        assert_eq!(tree("[1, 2 3]."), "(PROG (EXPRS (LIST 1 2 3)))");
        assert_eq!(tree("[]."), "(PROG (EXPRS (LIST)))");
        assert_eq!(
            tree("{a: 1, \"b\": 2}."),
            "(PROG (EXPRS (RECORD (BINDING a 1) (BINDING \"b\" 2))))"
        );
    }

    #[test]
    fn test_case_and_if() {
        assert_eq!(
            tree("case 2 of 1: 10 of 2: 20 end."),
            "(PROG (EXPRS (CASE 2 (OF 1 (EXPRS 10)) (OF 2 (EXPRS 20)))))"
        );
        assert_eq!(
            tree("if true then 1 else 2 end."),
            "(PROG (EXPRS (CASE true (OF true (EXPRS 1)) (OF false (EXPRS 2)))))"
        );
        assert_eq!(
            tree("case 3 of n: n end."),
            "(PROG (EXPRS (CASE 3 (OF n (EXPRS n) (LIST n)))))"
        );
        assert_eq!(
            tree("case 0 of -1: 'a' of 0: 'b' end."),
            "(PROG (EXPRS (CASE 0 (OF -1 (EXPRS \"a\")) (OF 0 (EXPRS \"b\")))))"
        );
    }

    #[test]
    fn test_unknown_name_is_soft() {
        let (pool, state, classes) = parse("undefinedName. 1 + 1.");
        assert_eq!(state.status(), Status::Complete);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].message, "Name 'undefinedName' not found.");
        assert_eq!(classes[0], Class::Error);
        assert_eq!(
            pool.tree(state.root()).unwrap().to_string(),
            "(PROG (EXPRS undefinedName 2))"
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            syntax_error("(1 + 2."),
            "Expecting a ')', found the end of the program."
        );
        assert_eq!(
            syntax_error("2 * 3."),
            "Expecting the end of the program, found an operator."
        );
        assert_eq!(
            syntax_error("let = 1.."),
            "Expecting a name, found a '=' symbol."
        );
    }

    #[test]
    fn test_token_classes() {
        let (_, _, classes) = parse("let f x = x..");
        use Class::*;
        assert_eq!(classes, vec![Keyword, Def, Param, Punc, Variable, Punc, Punc]);
    }

    #[test]
    fn test_tokens_after_failure_are_errors() {
        let mut pool = NodePool::new();
        let mut state = ParseState::new(Environment::new());
        let bad = Token::new(TokenKind::RightParen, ")", Span::new(0, 0, 1));
        assert!(state.step(&mut pool, bad).is_err());
        let next = Token::new(TokenKind::Num, "1", Span::new(0, 2, 3));
        assert_eq!(state.step(&mut pool, next), Ok(Class::Error));
    }

    #[test]
    fn test_checkpoint_is_a_clone() {
        let mut pool = NodePool::new();
        let mut state = ParseState::new(Environment::new());
        let one = Token::new(TokenKind::Num, "1", Span::new(0, 0, 1));
        state.step(&mut pool, one).unwrap();
        let saved = state.clone();
        let bad = Token::new(TokenKind::RightParen, ")", Span::new(0, 2, 3));
        assert!(state.step(&mut pool, bad).is_err());

        let mut state = saved;
        let dot = Token::new(TokenKind::Dot, ".", Span::new(0, 2, 3));
        assert_eq!(state.step(&mut pool, dot), Ok(Class::Punc));
        state.step(&mut pool, Token::eof(Span::default())).unwrap();
        assert_eq!(pool.tree(state.root()).unwrap().to_string(), "(PROG (EXPRS 1))");
    }
}
