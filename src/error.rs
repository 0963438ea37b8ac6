//! Rich diagnostic error types for the piper-metta interpreter.
//!
//! Data-driven failures (a grounded function fed a non-number, a query with no
//! matching rule) are ordinary atoms and never show up here. These types cover
//! host-level faults only: malformed source text, malformed rules, and the
//! configuration and seed-pack plumbing around the engine.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::seeds::SeedError;

/// Top-level error type for piper-metta.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum PiperError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input: expected an atom")]
    #[diagnostic(
        code(piper::parse::empty),
        help("Provide a symbol (`RegionA`), a variable (`$x`), or an expression (`(+ 1 2)`).")
    )]
    Empty,

    #[error("unexpected end of input at byte {offset}: missing `)`")]
    #[diagnostic(
        code(piper::parse::unclosed),
        help("Every `(` needs a matching `)`. Check the expression that starts before this offset.")
    )]
    Unclosed { offset: usize },

    #[error("unexpected `)` at byte {offset}")]
    #[diagnostic(
        code(piper::parse::unbalanced),
        help("This closing parenthesis has no matching `(`. Remove it or add the opening one.")
    )]
    Unbalanced { offset: usize },

    #[error("unterminated string literal starting at byte {offset}")]
    #[diagnostic(
        code(piper::parse::unterminated_string),
        help("Close the string with a matching `\"`.")
    )]
    UnterminatedString { offset: usize },

    #[error("empty variable name at byte {offset}")]
    #[diagnostic(
        code(piper::parse::empty_variable),
        help("A `$` must be followed by a name, e.g. `$x` or `$data`.")
    )]
    EmptyVariable { offset: usize },

    #[error("reserved `#` in variable name at byte {offset}")]
    #[diagnostic(
        code(piper::parse::reserved_variable),
        help("`#` marks variables renamed during rule matching. Use a name like `$x0` instead.")
    )]
    ReservedVariable { offset: usize },

    #[error("expression nested too deeply at byte {offset}")]
    #[diagnostic(
        code(piper::parse::too_deep),
        help("Expressions may nest at most 1024 levels. Flatten the input or split it into rules.")
    )]
    TooDeep { offset: usize },

    #[error("dangling `!` at byte {offset}")]
    #[diagnostic(
        code(piper::parse::dangling_bang),
        help("`!` marks the next atom for execution, e.g. `!(eval (+ 1 2))`.")
    )]
    DanglingBang { offset: usize },

    #[error("trailing input at byte {offset}: expected a single atom")]
    #[diagnostic(
        code(piper::parse::trailing),
        help("Use `parse_program` to read several top-level atoms.")
    )]
    Trailing { offset: usize },
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RuleError {
    #[error("malformed rule: {atom}")]
    #[diagnostic(
        code(piper::rule::malformed),
        help(
            "Rules must have the shape `(= pattern body)`: the `=` symbol followed by \
             exactly two atoms."
        )
    )]
    Malformed { atom: String },
}

/// Convenience alias for functions returning piper-metta results.
pub type PiperResult<T> = std::result::Result<T, PiperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_converts_to_piper_error() {
        let err = ParseError::Unclosed { offset: 4 };
        let piper: PiperError = err.into();
        assert!(matches!(piper, PiperError::Parse(ParseError::Unclosed { offset: 4 })));
    }

    #[test]
    fn rule_error_converts_to_piper_error() {
        let err = RuleError::Malformed {
            atom: "(= a)".into(),
        };
        let piper: PiperError = err.into();
        assert!(matches!(piper, PiperError::Rule(RuleError::Malformed { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let msg = format!("{}", ParseError::Unbalanced { offset: 7 });
        assert!(msg.contains('7'));
        let msg = format!(
            "{}",
            RuleError::Malformed {
                atom: "(= a)".into()
            }
        );
        assert!(msg.contains("(= a)"));
    }
}
