//! Error types.
//!
//! Nothing in this crate lets an error escape the render pipeline: the soft
//! entry points log these and degrade. They are public so callers using the
//! `try_*` variants can inspect what went wrong.

use thiserror::Error;

/// A template expression that could not be compiled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected ';' at {pos}")]
    Semicolon { pos: usize },

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    #[error("unterminated string literal starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("unmatched '{ch}' at {pos}")]
    UnmatchedBracket { ch: char, pos: usize },

    #[error("unbalanced ternary at {pos}")]
    UnbalancedTernary { pos: usize },

    #[error("malformed object literal at {pos}")]
    MalformedObjectLiteral { pos: usize },

    #[error("expected a property name after '.' at {pos}")]
    MissingProperty { pos: usize },

    #[error("operator '{op}' is missing an operand")]
    MissingOperand { op: String },

    #[error("expression left {count} values on the stack")]
    Unreduced { count: usize },
}

/// An identifier that cannot be observed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObserveError {
    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("cannot observe '{identifier}': '{parent}' is a {kind}, not an object")]
    PrimitiveParent {
        identifier: String,
        parent: String,
        kind: &'static str,
    },
}
