//! Core atom types for the piper-metta interpreter.
//!
//! Atoms are the only values in the system: data, rules, and queries are all
//! built from [`Atom::Symbol`], [`Atom::Variable`], and [`Atom::Expression`].
//! Atoms are immutable and reference-counted, so cloning one is cheap and the
//! same atom can be shared by many rules and queries at once. Equality and
//! hashing are purely structural.

use std::fmt;
use std::sync::Arc;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Result of an evaluation step that made no progress.
pub const NOT_REDUCIBLE: &str = "NotReducible";
/// The "no result" marker.
pub const EMPTY: &str = "Empty";
/// Boolean true, produced by comparison functions.
pub const TRUE: &str = "True";
/// Boolean false, produced by comparison functions.
pub const FALSE: &str = "False";

/// Deepest expression nesting the reader accepts and the interpreter builds.
pub const MAX_NESTING: usize = 1024;

/// Prefix shared by every error atom: `Error_<Kind>_<context>`.
const ERROR_PREFIX: &str = "Error_";

/// An immutable symbolic value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    /// A named constant, number literal, or function name.
    Symbol(Arc<str>),
    /// A logic variable. The name is stored without its `$` prefix.
    Variable(Arc<str>),
    /// An ordered compound term. Order and arity are significant.
    Expression(Arc<[Atom]>),
}

impl Atom {
    /// Create a symbol.
    pub fn sym(name: impl AsRef<str>) -> Self {
        Atom::Symbol(Arc::from(name.as_ref()))
    }

    /// Create a variable. A leading `$` is accepted and stripped.
    pub fn var(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Atom::Variable(Arc::from(name.strip_prefix('$').unwrap_or(name)))
    }

    /// Create an expression from its children.
    pub fn expr(children: impl Into<Vec<Atom>>) -> Self {
        Atom::Expression(Arc::from(children.into()))
    }

    /// The empty expression `()`.
    pub fn empty_expr() -> Self {
        Atom::Expression(Arc::from(Vec::new()))
    }

    /// A numeric literal rendered as a symbol.
    pub fn number(n: Number) -> Self {
        Atom::sym(n.to_string())
    }

    /// An integer literal.
    pub fn int(n: i64) -> Self {
        Atom::number(Number::Int(n))
    }

    pub fn not_reducible() -> Self {
        Atom::sym(NOT_REDUCIBLE)
    }

    pub fn empty() -> Self {
        Atom::sym(EMPTY)
    }

    pub fn true_atom() -> Self {
        Atom::sym(TRUE)
    }

    pub fn false_atom() -> Self {
        Atom::sym(FALSE)
    }

    /// `True` or `False`.
    pub fn boolean(value: bool) -> Self {
        if value {
            Self::true_atom()
        } else {
            Self::false_atom()
        }
    }

    /// A tagged error atom `Error_<kind>_<context>`.
    pub fn error(kind: ErrorKind, context: impl fmt::Display) -> Self {
        Atom::sym(format!("{ERROR_PREFIX}{kind}_{context}"))
    }

    /// The symbol name, if this is a symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Atom::Symbol(name) => Some(&**name),
            _ => None,
        }
    }

    /// The variable name (without `$`), if this is a variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Atom::Variable(name) => Some(&**name),
            _ => None,
        }
    }

    /// The children of an expression. Empty for symbols and variables.
    pub fn children(&self) -> &[Atom] {
        match self {
            Atom::Expression(children) => &children[..],
            _ => &[],
        }
    }

    /// First child of a non-empty expression.
    ///
    /// Keys grounded-function dispatch and the knowledge-base index.
    pub fn head(&self) -> Option<&Atom> {
        match self {
            Atom::Expression(children) => children.first(),
            _ => None,
        }
    }

    /// Children after the head. Empty for atoms with no head.
    pub fn tail(&self) -> &[Atom] {
        match self {
            Atom::Expression(children) if !children.is_empty() => &children[1..],
            _ => &[],
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Atom::Symbol(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Atom::Variable(_))
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Atom::Expression(_))
    }

    /// Whether this is the `NotReducible` sentinel.
    pub fn is_not_reducible(&self) -> bool {
        self.as_symbol() == Some(NOT_REDUCIBLE)
    }

    /// Whether this symbol is an `Error_<kind>_<context>` atom.
    pub fn is_error(&self) -> bool {
        self.as_error().is_some()
    }

    /// Decode an error atom into its kind and context.
    pub fn as_error(&self) -> Option<(ErrorKind, &str)> {
        let rest = self.as_symbol()?.strip_prefix(ERROR_PREFIX)?;
        let (kind, context) = rest.split_once('_')?;
        Some((kind.parse().ok()?, context))
    }

    /// Interpret a symbol as a numeric literal.
    pub fn as_number(&self) -> Option<Number> {
        Number::parse(self.as_symbol()?)
    }

    /// Whether the variable `name` occurs anywhere inside this atom.
    pub fn contains_variable(&self, name: &str) -> bool {
        match self {
            Atom::Variable(v) => &**v == name,
            Atom::Symbol(_) => false,
            Atom::Expression(children) => children.iter().any(|c| c.contains_variable(name)),
        }
    }

    /// Whether the atom contains no variables at all.
    pub fn is_ground(&self) -> bool {
        match self {
            Atom::Variable(_) => false,
            Atom::Symbol(_) => true,
            Atom::Expression(children) => children.iter().all(Atom::is_ground),
        }
    }

    /// Whether expressions nest more than `limit` levels deep.
    ///
    /// `x` has no nesting, `(x)` one level, `((x))` two. Iterative, so it is
    /// safe on atoms the recursive traversals could not handle.
    pub fn exceeds_nesting(&self, limit: usize) -> bool {
        let mut stack = vec![(self, 0usize)];
        while let Some((atom, outer)) = stack.pop() {
            if let Atom::Expression(children) = atom {
                let level = outer + 1;
                if level > limit {
                    return true;
                }
                stack.extend(children.iter().map(|c| (c, level)));
            }
        }
        false
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Symbol(name) => write!(f, "{name}"),
            Atom::Variable(name) => write!(f, "${name}"),
            Atom::Expression(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::sym(name)
    }
}

impl From<i64> for Atom {
    fn from(n: i64) -> Self {
        Atom::number(Number::Int(n))
    }
}

impl From<f64> for Atom {
    fn from(n: f64) -> Self {
        Atom::number(Number::Float(n))
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Atom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::parse::parse_atom(&text).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Error tags
// ---------------------------------------------------------------------------

/// Classification carried by an error atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A grounded function received a non-numeric or malformed argument.
    InvalidInput,
    /// A grounded function or instruction was called with the wrong argument count.
    Arity,
    /// Caller convention for "no matching fact". Never produced by the engine.
    NoData,
    /// The evaluation step budget ran out.
    StepLimit,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "InvalidInput"),
            ErrorKind::Arity => write!(f, "Arity"),
            ErrorKind::NoData => write!(f, "NoData"),
            ErrorKind::StepLimit => write!(f, "StepLimit"),
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InvalidInput" => Ok(ErrorKind::InvalidInput),
            "Arity" => Ok(ErrorKind::Arity),
            "NoData" => Ok(ErrorKind::NoData),
            "StepLimit" => Ok(ErrorKind::StepLimit),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric literals
// ---------------------------------------------------------------------------

/// Numeric view of a symbol such as `60` or `0.70`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parse a symbol name as an integer, falling back to a finite float.
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(n) = text.parse::<i64>() {
            return Some(Number::Int(n));
        }
        // f64::from_str also accepts "inf" and "NaN"; those are symbols here.
        let numeric_chars = text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
        if !numeric_chars || !text.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Number::Float)
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            // Debug keeps the decimal point on whole floats ("3.0").
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Atom::expr(vec![Atom::sym("RegionData"), Atom::sym("RegionA")]);
        let b = Atom::expr(vec![Atom::sym("RegionData"), Atom::sym("RegionA")]);
        assert_eq!(a, b);
        assert_ne!(Atom::sym("x"), Atom::var("x"));
        assert_ne!(Atom::empty_expr(), Atom::sym("()"));
    }

    #[test]
    fn equal_atoms_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Atom::expr(vec![Atom::sym("+"), Atom::int(1), Atom::int(2)]));
        assert!(set.contains(&Atom::expr(vec![Atom::sym("+"), Atom::int(1), Atom::int(2)])));
    }

    #[test]
    fn variable_prefix_is_normalized() {
        assert_eq!(Atom::var("$x"), Atom::var("x"));
        assert_eq!(Atom::var("x").to_string(), "$x");
    }

    #[test]
    fn display_is_canonical() {
        let atom = Atom::expr(vec![
            Atom::sym("priority"),
            Atom::expr(vec![Atom::sym("PovertyRate"), Atom::int(60)]),
            Atom::var("data"),
            Atom::empty_expr(),
        ]);
        assert_eq!(atom.to_string(), "(priority (PovertyRate 60) $data ())");
    }

    #[test]
    fn head_and_tail() {
        let atom = Atom::expr(vec![Atom::sym("+"), Atom::int(1), Atom::int(2)]);
        assert_eq!(atom.head(), Some(&Atom::sym("+")));
        assert_eq!(atom.tail(), &[Atom::int(1), Atom::int(2)]);
        assert!(Atom::empty_expr().head().is_none());
        assert!(Atom::sym("x").head().is_none());
        assert!(Atom::empty_expr().tail().is_empty());
    }

    #[test]
    fn error_atoms_round_trip_kind_and_context() {
        let err = Atom::error(ErrorKind::InvalidInput, "+");
        assert_eq!(err.to_string(), "Error_InvalidInput_+");
        assert_eq!(err.as_error(), Some((ErrorKind::InvalidInput, "+")));
        assert!(Atom::sym("Error_Bogus_x").as_error().is_none());
        assert!(!Atom::sym("RegionA").is_error());
    }

    #[test]
    fn numbers_parse_and_render() {
        assert_eq!(Number::parse("60"), Some(Number::Int(60)));
        assert_eq!(Number::parse("-3"), Some(Number::Int(-3)));
        assert_eq!(Number::parse("0.70"), Some(Number::Float(0.7)));
        assert_eq!(Number::parse("inf"), None);
        assert_eq!(Number::parse("NaN"), None);
        assert_eq!(Number::parse("RegionA"), None);
        assert_eq!(Number::parse("."), None);
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
        assert_eq!(Number::Int(3).to_string(), "3");
    }

    #[test]
    fn sentinels() {
        assert!(Atom::not_reducible().is_not_reducible());
        assert_eq!(Atom::boolean(true), Atom::true_atom());
        assert_eq!(Atom::boolean(false).to_string(), "False");
        assert_eq!(Atom::empty().to_string(), "Empty");
    }

    #[test]
    fn groundness_and_occurrence() {
        let atom = Atom::expr(vec![Atom::sym("f"), Atom::expr(vec![Atom::var("x")])]);
        assert!(!atom.is_ground());
        assert!(atom.contains_variable("x"));
        assert!(!atom.contains_variable("y"));
        assert!(Atom::sym("f").is_ground());
    }

    #[test]
    fn nesting_is_measured_in_expression_levels() {
        let mut atom = Atom::sym("z");
        assert!(!atom.exceeds_nesting(0));
        for _ in 0..3 {
            atom = Atom::expr(vec![Atom::sym("s"), atom]);
        }
        assert!(!atom.exceeds_nesting(3));
        assert!(atom.exceeds_nesting(2));
        assert!(Atom::empty_expr().exceeds_nesting(0));
    }

    #[test]
    fn serde_uses_canonical_text() {
        let atom = Atom::expr(vec![Atom::sym("="), Atom::var("x"), Atom::int(1)]);
        let json = serde_json::to_string(&atom).unwrap();
        assert_eq!(json, "\"(= $x 1)\"");
        let back: Atom = serde_json::from_str(&json).unwrap();
        assert_eq!(back, atom);
    }
}
