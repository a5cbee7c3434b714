//! Core front end for the graff expression language
//!
//! This crate contains the scanner, the resumable parser, the hash-consed
//! node pool and the folding pass. It does not include a host; the `graff`
//! binary in the `cli` crate drives it from files or a REPL.

pub mod config;
pub mod environment;
pub mod error;
pub mod export;
pub mod folder;
pub mod interner;
pub mod language;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod pool;
pub mod session;

// Re-export commonly used items for convenience
pub use config::Config;
pub use environment::{Environment, Word, WordClass};
pub use error::{Diagnostic, Error, Result};
pub use export::{export, import};
pub use folder::Folder;
pub use interner::Symbol;
pub use language::{Node, NodeId, Pos, Span, Tag, Tree};
pub use lexer::{Lexed, Scanner, Token, TokenKind};
pub use numeric::Number;
pub use parser::{Class, ParseState, Status};
pub use pool::NodePool;
pub use session::{Checkpoint, Highlight, Outcome, Session, compile, compile_with};
