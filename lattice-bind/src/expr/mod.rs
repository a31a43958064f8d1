//! Expression Compiler
//!
//! Compiles template expressions such as `user.name + ' (' + count * 2 + ')'`
//! into evaluators, and reports which context paths each one reads.
//!
//! # Architecture
//!
//! 1. `tokenizer` scans the source once into a postfix token stream
//! 2. `parser` folds the stream into evaluator closures, collecting
//!    identifiers on the way
//! 3. `ops` holds the operator semantics the evaluators apply
//!
//! Compiled expressions are cached by source text in the [`Parser`].

mod ops;
mod parser;
mod token;
mod tokenizer;

pub use ops::{binary, loose_eq, property_key, unary};
pub use parser::{Aliases, ParsedExpression, Parser, Scope};
pub use token::{Accessor, Assoc, Literal, Operator, Token, BARE_OPERAND, CALLEE, RESOLVED_OPERAND};
pub use tokenizer::{create_tokens, tokenize};
