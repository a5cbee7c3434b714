use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Number
// ============================================================================

/// IEEE 754 double carried by NUM nodes.
///
/// Equality and hashing are bitwise over a canonical form (`-0` becomes `0`
/// and every NaN collapses to one bit pattern) so that numbers can take part
/// in structural interning keys.
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Number(0.0)
        } else if value.is_nan() {
            Number(f64::NAN)
        } else {
            Number(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Parse a scanned digit run (or any decimal text) into a number.
    pub fn parse(text: &str) -> Self {
        Number::new(coerce_str(text))
    }

    pub fn is_integral(self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0
    }

    pub fn add(self, other: Number) -> Number {
        Number::new(self.0 + other.0)
    }

    pub fn sub(self, other: Number) -> Number {
        Number::new(self.0 - other.0)
    }

    pub fn div(self, other: Number) -> Number {
        Number::new(self.0 / other.0)
    }

    /// Floating point remainder; the sign follows the dividend.
    pub fn rem(self, other: Number) -> Number {
        Number::new(self.0 % other.0)
    }

    pub fn pow(self, other: Number) -> Number {
        // powf(1, NaN) is 1 in Rust, exponentiation with a NaN operand is NaN here.
        if self.0.is_nan() || other.0.is_nan() {
            return Number::new(f64::NAN);
        }
        Number::new(self.0.powf(other.0))
    }

    pub fn neg(self) -> Number {
        Number::new(-self.0)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::new(value)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::new(value as f64)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let x = self.0;
        if x.is_nan() {
            write!(f, "NaN")
        } else if x.is_infinite() {
            let sign = if x > 0.0 { "Infinity" } else { "-Infinity" };
            write!(f, "{sign}")
        } else {
            write!(f, "{x}")
        }
    }
}

// ============================================================================
// Literal coercion
// ============================================================================

/// Raw payload of a literal node, as seen by the comparison operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// NUM and STR payloads both compare as text
    Text(String),
    Bool(bool),
    Null,
}

impl Literal {
    /// Numeric coercion: strings parse as decimal (blank is 0, junk is NaN),
    /// booleans are 1 or 0, null is NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Literal::Text(s) => coerce_str(s),
            Literal::Bool(true) => 1.0,
            Literal::Bool(false) => 0.0,
            Literal::Null => f64::NAN,
        }
    }
}

/// Loose equality over raw payloads: text compares as text, booleans against
/// text compare numerically, null only equals null.
pub fn loose_eq(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        (Literal::Null, Literal::Null) => true,
        (Literal::Null, _) | (_, Literal::Null) => false,
        (Literal::Text(x), Literal::Text(y)) => x == y,
        (Literal::Bool(x), Literal::Bool(y)) => x == y,
        _ => a.to_number() == b.to_number(),
    }
}

fn coerce_str(text: &str) -> f64 {
    let t = text.trim();
    if t.is_empty() {
        return 0.0;
    }
    let (sign, digits) = match t.as_bytes()[0] {
        b'-' => (-1.0, &t[1..]),
        b'+' => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    if digits.starts_with(['+', '-']) {
        return f64::NAN;
    }
    if digits == "Infinity" {
        return sign * f64::INFINITY;
    }
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        if sign < 0.0 || t.starts_with('+') {
            return f64::NAN;
        }
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" and "nan" spellings that are not numbers here.
    if digits
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
    {
        return f64::NAN;
    }
    digits.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}
