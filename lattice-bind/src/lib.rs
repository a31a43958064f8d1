//! Lattice Bind
//!
//! This crate provides the data-binding core of the Lattice UI framework.
//! It implements:
//!
//! - An expression compiler for template expressions
//! - Identifier extraction, so bindings know which context paths to watch
//! - An observable context manager over a live, mutable value graph
//! - A binding runtime that ties the two together per context owner
//!
//! Everything is single-threaded and synchronous: listeners run on the stack
//! of the write that triggered them.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamically typed value graph and its interception hooks
//! - `expr`: tokenizer, parser and operator semantics
//! - `observe`: the context manager and its bookkeeping
//! - `runtime`: owners, per-owner managers and disposal
//! - `config`: runtime configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_bind::{BindingRuntime, ContextOwner, Value};
//! use serde_json::json;
//!
//! let runtime = BindingRuntime::new();
//! let owner = ContextOwner::new(Value::from(json!({"user": {"name": "Ada"}})));
//!
//! // Compile, evaluate and observe in one go
//! let greeting = runtime.bind(&owner, "'Hello, ' + user.name", |new, _| {
//!     println!("{}", new);
//! });
//!
//! // Writing through the graph re-evaluates the binding
//! let user = owner.context().get_member("user");
//! user.as_object().unwrap().set("name", "Grace");
//! // prints: "Hello, Grace"
//!
//! runtime.dispose(&owner);
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod observe;
pub mod runtime;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{ExpressionError, ObserveError};
pub use expr::{Aliases, ParsedExpression, Parser};
pub use observe::{AbsolutePath, ContextManager, ListenerHandle, ListenerOptions, Uid};
pub use runtime::{Binding, BindingRuntime, ContextOwner};
pub use value::{ArrayRef, ChangeKind, ChangeRecord, ObjectRef, Value};
