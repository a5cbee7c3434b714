//! Per-buffer host API
//!
//! A [`Session`] owns the node pool, the resumable parse state and the
//! configuration for one source buffer. A host feeds it one line at a time,
//! can checkpoint it between lines, and calls [`Session::finish`] at the end
//! of the buffer to fold the program.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::environment::Environment;
use crate::error::{Diagnostic, Result};
use crate::export;
use crate::folder::Folder;
use crate::language::{NodeId, Span, Tag};
use crate::lexer::{Lexed, Scanner, Token};
use crate::parser::{Class, ParseState, Status};
use crate::pool::NodePool;

/// Classification of one source range, for syntax highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub span: Span,
    pub class: Class,
}

/// Saved parse position; restoring it discards everything parsed since.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    state: ParseState,
    line: u32,
}

/// Result of a completed buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The PROG node as parsed
    pub parsed: NodeId,
    /// The folded PROG node
    pub root: NodeId,
    /// Top-level values of the folded program, in source order
    pub values: Vec<NodeId>,
    /// Soft errors
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    env: Environment,
    pool: NodePool,
    state: ParseState,
    line: u32,
}

impl Default for Session {
    fn default() -> Self {
        let env = Environment::new();
        Session {
            config: Config::default(),
            state: ParseState::new(env.clone()),
            env,
            pool: NodePool::new(),
            line: 0,
        }
    }
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let env = Environment::from_config(&config)?;
        Ok(Session {
            config,
            state: ParseState::new(env.clone()),
            env,
            pool: NodePool::new(),
            line: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    /// Index of the next line `parse_line` will read
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Feed a single token.
    pub fn step(&mut self, token: Token) -> Result<Class> {
        self.state.step(&mut self.pool, token)
    }

    /// Scan and parse one line, returning a class for every token and
    /// comment on it. A fatal error marks the offending token as `error`;
    /// the error itself is kept in the parse state.
    pub fn parse_line(&mut self, text: &str) -> Vec<Highlight> {
        let mut scanner = Scanner::new(text, self.line);
        let mut highlights = Vec::new();
        while let Some(lexed) = scanner.scan(self.state.env().globals()) {
            let highlight = match lexed {
                Lexed::Comment(span) => Highlight {
                    span,
                    class: Class::Comment,
                },
                Lexed::Token(token) => {
                    let span = token.span;
                    let class = self.step(token).unwrap_or(Class::Error);
                    Highlight { span, class }
                }
            };
            highlights.push(highlight);
        }
        self.line += 1;
        highlights
    }

    /// End the buffer, then fold the program.
    ///
    /// A fatal error from either pass is returned on its own; otherwise the
    /// outcome carries the soft diagnostics.
    pub fn finish(&mut self) -> Result<Outcome> {
        if self.state.status() == Status::Parsing {
            let _ = self.step(Token::eof(Span::new(self.line, 0, 0)));
        }
        if let Some(err) = self.state.fatal() {
            return Err(err.clone());
        }
        let parsed = self.state.root();

        let mut env = self.state.env().clone();
        let root = Folder::new(&mut self.pool, &mut env).fold(parsed)?;
        let values = match self.pool.get(root).map(|node| node.elts()) {
            Some([exprs]) if self.pool.tag(*exprs) == Some(Tag::Exprs) => self
                .pool
                .get(*exprs)
                .map(|node| node.elts().to_vec())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let diagnostics = self.state.errors().to_vec();
        info!(
            nodes = self.pool.len(),
            values = values.len(),
            errors = diagnostics.len(),
            "compiled"
        );
        Ok(Outcome {
            parsed,
            root,
            values,
            diagnostics,
        })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            line: self.line,
        }
    }

    /// Return to a checkpoint. Nodes interned since stay in the pool.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        debug!(line = checkpoint.line, "restore");
        self.state = checkpoint.state;
        self.line = checkpoint.line;
    }

    /// Discard any parse in progress and start a new buffer.
    pub fn reset(&mut self) {
        self.state = ParseState::new(self.env.clone());
        self.line = 0;
    }

    /// The exported table for this session's pool.
    pub fn export(&self, root: NodeId) -> serde_json::Value {
        export::export(&self.pool, root, &self.config.version)
    }
}

/// Compile a whole source text in a fresh session.
pub fn compile(src: &str) -> Result<(Session, Outcome)> {
    compile_with(Config::default(), src)
}

pub fn compile_with(config: Config, src: &str) -> Result<(Session, Outcome)> {
    let mut session = Session::new(config)?;
    for line in src.lines() {
        session.parse_line(line);
    }
    let outcome = session.finish()?;
    Ok((session, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_classes() {
        let mut session = Session::default();
        let highlights = session.parse_line("1 + x | note |");
        let classes: Vec<Class> = highlights.iter().map(|h| h.class).collect();
        assert_eq!(
            classes,
            vec![Class::Number, Class::Operator, Class::Error, Class::Comment]
        );
        assert_eq!(highlights[2].span, Span::new(0, 4, 5));
        assert_eq!(session.line(), 1);
    }

    #[test]
    fn test_finish_folds() {
        let mut session = Session::default();
        session.parse_line("<x y: x - y>");
        session.parse_line("  10 4.");
        let outcome = session.finish().unwrap();
        let pool = session.pool();
        assert_eq!(outcome.values.len(), 1);
        assert_eq!(pool.tree(outcome.values[0]).unwrap().to_string(), "6");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_reset_starts_a_new_buffer() {
        let mut session = Session::default();
        session.parse_line("(1 +");
        session.reset();
        session.parse_line("3.");
        let outcome = session.finish().unwrap();
        assert_eq!(
            session.pool().tree(outcome.root).unwrap().to_string(),
            "(PROG (EXPRS 3))"
        );
    }
}
