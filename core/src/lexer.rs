use crate::environment::{Scope, WordClass};
use crate::interner::Symbol;
use crate::language::Span;

// ============================================================================
// Token Types
// ============================================================================

/// Token codes. The numbering is part of the host contract, so it is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    /// End of input; also produced by unknown characters and unterminated strings
    Eof = 0x00,
    Ident = 0x01,
    Num = 0x02,
    Str = 0x03,
    Equal = 0x04,
    If = 0x05,
    Then = 0x06,
    Else = 0x07,
    BinOp = 0x0E,
    Case = 0x0F,
    Of = 0x10,
    End = 0x11,
    Let = 0x12,
    Bool = 0x14,
    Null = 0x15,
    LeftParen = 0xA1,
    RightParen = 0xA2,
    LeftBracket = 0xA3,
    RightBracket = 0xA4,
    LeftBrace = 0xA5,
    RightBrace = 0xA6,
    Minus = 0xA8,
    Dot = 0xA9,
    Colon = 0xAA,
    Comma = 0xAB,
    LeftAngle = 0xAE,
    RightAngle = 0xAF,
    /// `*`: scanned so it can be reported, accepted by no production
    Asterisk = 0x2A,
}

impl TokenKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human readable phrase used in syntax errors
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "the end of the program",
            TokenKind::Ident => "a name",
            TokenKind::Num => "a number",
            TokenKind::Str => "a string",
            TokenKind::Equal => "a '=' symbol",
            TokenKind::If => "the 'if' keyword",
            TokenKind::Then => "the 'then' keyword",
            TokenKind::Else => "the 'else' keyword",
            TokenKind::Case => "the 'case' keyword",
            TokenKind::Of => "the 'of' keyword",
            TokenKind::End => "the 'end' keyword",
            TokenKind::Let => "the 'let' keyword",
            TokenKind::BinOp | TokenKind::Asterisk => "an operator",
            TokenKind::LeftParen => "a '('",
            TokenKind::RightParen => "a ')'",
            TokenKind::LeftBracket => "a '['",
            TokenKind::RightBracket => "a ']'",
            TokenKind::LeftBrace => "a '{'",
            TokenKind::RightBrace => "a '}'",
            TokenKind::LeftAngle => "a '<'",
            TokenKind::RightAngle => "a '>'",
            TokenKind::Minus => "a '-'",
            TokenKind::Dot => "a '.'",
            TokenKind::Colon => "a ':'",
            TokenKind::Comma => "a ','",
            TokenKind::Bool | TokenKind::Null => "an expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    pub fn eof(span: Span) -> Self {
        Token::new(TokenKind::Eof, "", span)
    }
}

/// What one call to [`Scanner::scan`] found.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexed {
    Token(Token),
    /// A comment ran to its closing marker or the end of the line
    Comment(Span),
}

fn keyword(lexeme: &str) -> Option<TokenKind> {
    match lexeme {
        "let" => Some(TokenKind::Let),
        "if" => Some(TokenKind::If),
        "then" => Some(TokenKind::Then),
        "else" => Some(TokenKind::Else),
        "case" => Some(TokenKind::Case),
        "of" => Some(TokenKind::Of),
        "end" => Some(TokenKind::End),
        "true" | "false" => Some(TokenKind::Bool),
        "null" => Some(TokenKind::Null),
        _ => None,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '@' | '+' | '#' | '_' | '~')
}

// ============================================================================
// Scanner
// ============================================================================

/// Single-line character stream with a cursor.
pub struct Scanner {
    input: Vec<char>,
    line: u32,
    start: usize,
    position: usize,
}

impl Scanner {
    pub fn new(text: &str, line: u32) -> Self {
        Scanner {
            input: text.chars().collect(),
            line,
            start: 0,
            position: 0,
        }
    }

    pub fn eol(&self) -> bool {
        self.position >= self.input.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    pub fn eat(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        match self.peek() {
            Some(c) if pred(c) => {
                self.position += 1;
                Some(c)
            }
            _ => None,
        }
    }

    pub fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> bool {
        let start = self.position;
        while self.eat(&pred).is_some() {}
        self.position > start
    }

    pub fn back_up(&mut self, n: usize) {
        self.position = self.position.saturating_sub(n);
    }

    /// Text between the start of the current token and the cursor
    pub fn current(&self) -> String {
        self.input[self.start..self.position].iter().collect()
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.start as u32, self.position as u32)
    }

    fn token(&self, kind: TokenKind) -> Lexed {
        Lexed::Token(Token::new(kind, self.current(), self.span()))
    }

    /// Scan the next token. Returns `None` once the line is exhausted.
    ///
    /// Identifiers are checked against the keyword table first and then
    /// against `globals`, whose operator words remap to [`TokenKind::BinOp`].
    pub fn scan(&mut self, globals: &Scope) -> Option<Lexed> {
        self.eat_while(char::is_whitespace);
        self.start = self.position;
        let c = self.next()?;

        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equal,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '<' => TokenKind::LeftAngle,
            '>' => TokenKind::RightAngle,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '"' | '\'' => return Some(self.string(c)),
            '/' if self.peek() == Some('/') => {
                self.position = self.input.len();
                return Some(Lexed::Comment(self.span()));
            }
            '`' | '\\' | '!' | '|' => return Some(self.comment(c)),
            '+' | '/' | '%' | '^' => self.operator(globals),
            c if is_ident_start(c) => return Some(self.ident(globals)),
            c if c.is_ascii_digit() => {
                self.eat_while(|c| c.is_ascii_digit());
                TokenKind::Num
            }
            _ => TokenKind::Eof,
        };
        Some(self.token(kind))
    }

    fn operator(&self, globals: &Scope) -> TokenKind {
        let lexeme = self.current();
        match Symbol::get(&lexeme).and_then(|name| globals.get(name)) {
            Some(word) if matches!(word.class, WordClass::Operator(_)) => TokenKind::BinOp,
            _ => TokenKind::Eof,
        }
    }

    fn string(&mut self, quote: char) -> Lexed {
        while let Some(c) = self.next() {
            if c == quote {
                return self.token(TokenKind::Str);
            }
        }
        self.token(TokenKind::Eof)
    }

    fn comment(&mut self, marker: char) -> Lexed {
        while let Some(c) = self.next() {
            if c == marker {
                break;
            }
        }
        Lexed::Comment(self.span())
    }

    fn ident(&mut self, globals: &Scope) -> Lexed {
        self.eat_while(is_ident_char);
        let lexeme = self.current();
        let kind = match keyword(&lexeme) {
            Some(kind) => kind,
            None => match Symbol::get(&lexeme).and_then(|name| globals.get(name)) {
                Some(word) if matches!(word.class, WordClass::Operator(_)) => TokenKind::BinOp,
                _ => TokenKind::Ident,
            },
        };
        self.token(kind)
    }
}
