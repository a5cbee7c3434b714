//! Lexical environment shared by the parser and the folder
//!
//! The environment is a stack of scopes. Each scope maps identifiers to
//! [`Word`]s. The outermost scope is the global lexicon, preloaded with the
//! binary operator words. Lexicons are persistent maps, so capturing a scope
//! as a closure or checkpointing a whole parse is a cheap clone.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::interner::Symbol;
use crate::language::{NodeId, Tag};

pub type Lexicon = im::HashMap<Symbol, Word>;

/// Default bound on scope depth.
pub const RECURSION_LIMIT: usize = 380;

const OPERATOR_WORDS: &[(&str, Tag)] = &[
    ("add", Tag::Add),
    ("sub", Tag::Sub),
    ("div", Tag::Div),
    ("mod", Tag::Mod),
    ("pow", Tag::Pow),
    ("concat", Tag::Concat),
    ("or", Tag::Or),
    ("and", Tag::And),
    ("eq", Tag::Eq),
    ("ne", Tag::Ne),
    ("lt", Tag::Lt),
    ("gt", Tag::Gt),
    ("le", Tag::Le),
    ("ge", Tag::Ge),
    ("+", Tag::Add),
    ("/", Tag::Div),
    ("%", Tag::Mod),
    ("^", Tag::Pow),
];

// ============================================================================
// Words
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    /// A parameter or pattern variable
    Value,
    /// A `let` definition
    Function,
    /// A pre-declared binary operator
    Operator(Tag),
}

/// Captured definition environment of a `let` function.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub lexicon: Lexicon,
    /// Parameter names ordered by offset
    pub params: Vec<Symbol>,
    /// The parameter pattern nodes, in source order
    pub pattern: Vec<NodeId>,
}

/// A definition record.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub class: WordClass,
    pub name: Symbol,
    /// Position among the parameters that introduced this word
    pub offset: usize,
    /// Bound node; [`NodeId::NONE`] while unknown
    pub nid: NodeId,
    pub arity: usize,
    pub closure: Option<Closure>,
    /// Pattern nodes that introduced a pattern-bound value
    pub patterns: Vec<NodeId>,
}

impl Word {
    pub fn value(name: Symbol, offset: usize) -> Self {
        Word {
            class: WordClass::Value,
            name,
            offset,
            nid: NodeId::NONE,
            arity: 0,
            closure: None,
            patterns: Vec::new(),
        }
    }

    pub fn function(name: Symbol) -> Self {
        Word {
            class: WordClass::Function,
            ..Word::value(name, 0)
        }
    }

    pub fn operator(name: Symbol, tag: Tag) -> Self {
        Word {
            class: WordClass::Operator(tag),
            arity: 2,
            ..Word::value(name, 0)
        }
    }

    pub fn bound_to(mut self, nid: NodeId) -> Self {
        self.nid = nid;
        self
    }
}

// ============================================================================
// Scopes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub name: Symbol,
    pub lexicon: Lexicon,
}

impl Scope {
    pub fn new(name: Symbol) -> Self {
        Scope {
            name,
            lexicon: Lexicon::new(),
        }
    }

    pub fn get(&self, name: Symbol) -> Option<&Word> {
        self.lexicon.get(&name)
    }

    /// Value words of this scope ordered by offset
    pub fn params(&self) -> Vec<Symbol> {
        let mut params: Vec<&Word> = self
            .lexicon
            .values()
            .filter(|word| word.class == WordClass::Value)
            .collect();
        params.sort_by_key(|word| word.offset);
        params.into_iter().map(|word| word.name).collect()
    }
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    scopes: Vec<Scope>,
    limit: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create an environment holding only the global lexicon
    pub fn new() -> Self {
        let mut globals = Scope::new(Symbol::new("global"));
        for (name, tag) in OPERATOR_WORDS {
            let name = Symbol::new(name);
            globals.lexicon.insert(name, Word::operator(name, *tag));
        }
        Environment {
            scopes: vec![globals],
            limit: RECURSION_LIMIT,
        }
    }

    /// Create an environment with the configured limit and operator aliases
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut env = Environment::new();
        env.limit = config.recursion_limit;
        for (alias, tag_name) in &config.operators {
            let tag = Tag::from_name(&tag_name.to_uppercase())
                .filter(|tag| tag.precedence().is_some())
                .ok_or_else(|| {
                    Error::Config(format!("'{tag_name}' is not a binary operator"))
                })?;
            let name = Symbol::new(alias);
            env.scopes[0].lexicon.insert(name, Word::operator(name, tag));
        }
        Ok(env)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn globals(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn top(&self) -> &Scope {
        // The global scope is never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Push a new scope, failing once the depth exceeds the limit
    pub fn enter(&mut self, name: Symbol) -> Result<()> {
        if self.scopes.len() > self.limit {
            return Err(Error::Recursion { limit: self.limit });
        }
        self.scopes.push(Scope::new(name));
        Ok(())
    }

    /// Pop the innermost scope. The global scope stays.
    pub fn exit(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Install a definition in the innermost scope
    pub fn bind(&mut self, name: Symbol, word: Word) {
        let last = self.scopes.len() - 1;
        self.bind_at(last, name, word);
    }

    /// Install a definition in the scope at `depth` (0 is global)
    pub fn bind_at(&mut self, depth: usize, name: Symbol, word: Word) {
        if let Some(scope) = self.scopes.get_mut(depth) {
            scope.lexicon.insert(name, word);
        }
    }

    /// Copy every word of `lexicon` into the innermost scope
    pub fn extend(&mut self, lexicon: &Lexicon) {
        let last = self.scopes.len() - 1;
        let top = &mut self.scopes[last].lexicon;
        for (name, word) in lexicon {
            top.insert(*name, word.clone());
        }
    }

    /// Find a word, innermost scope first
    pub fn lookup(&self, name: Symbol) -> Option<&Word> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Find a word along with the depth of the scope that defines it
    pub fn lookup_with_depth(&self, name: Symbol) -> Option<(usize, &Word)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.get(name).map(|word| (depth, word)))
    }
}
