use once_cell::sync::Lazy;
use std::fmt;
use std::sync::RwLock;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static INTERNER: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

/// An identifier name interned in the process-wide string interner.
///
/// Lexicon keys and IDENT payloads are symbols, so name comparison and
/// hashing never touch the string itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    /// Intern a string and return its symbol
    pub fn new(s: &str) -> Self {
        let mut interner = INTERNER.write().expect("interner lock poisoned");
        Symbol(interner.get_or_intern(s))
    }

    /// The symbol for `s` if it has been interned before. Scanning uses this
    /// so that probing the lexicon does not grow the interner.
    pub fn get(s: &str) -> Option<Self> {
        let interner = INTERNER.read().expect("interner lock poisoned");
        interner.get(s).map(Symbol)
    }

    /// Resolve the symbol back to its string representation
    pub fn resolve(&self) -> String {
        self.with_str(str::to_string)
    }

    /// Resolve the symbol and run a function with the string slice.
    /// Cheaper than `resolve()`, which allocates.
    pub fn with_str<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = INTERNER.read().expect("interner lock poisoned");
        let s = interner
            .resolve(self.0)
            .expect("Symbol should always be valid");
        f(s)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| write!(f, "{s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_symbol() {
        assert_eq!(Symbol::new("width"), Symbol::new("width"));
        assert_ne!(Symbol::new("width"), Symbol::new("height"));
    }

    #[test]
    fn test_get_does_not_intern() {
        assert_eq!(Symbol::get("never-interned~name"), None);
        let sym = Symbol::new("interned~name");
        assert_eq!(Symbol::get("interned~name"), Some(sym));
    }

    #[test]
    fn test_resolve_and_display() {
        let sym = Symbol::new("x@1");
        assert_eq!(sym.resolve(), "x@1");
        assert_eq!(sym.with_str(str::len), 3);
        assert_eq!(format!("{sym}"), "x@1");
    }
}
