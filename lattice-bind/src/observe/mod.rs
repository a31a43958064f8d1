//! Observable Context
//!
//! Lazily intercepts a live object graph and notifies listeners when the
//! value at an observed path changes.
//!
//! # Architecture
//!
//! - `path`: identifier splitting and absolute addressing
//! - `listener`: owner ids, ordered listener lists, removal handles and the
//!   per-owner removal registry
//! - `index`: the reverse index from ancestor paths to observed descendants
//! - `array`: the sequence hook that reports array mutations
//! - `manager`: [`ContextManager`], which ties the above together
//!
//! A manager knows nothing about expressions. It takes already-absolute,
//! dotted identifiers.

mod array;
mod index;
mod listener;
mod manager;
pub mod path;

pub use listener::{ListenerHandle, ListenerOptions, Uid, CONTEXT_PRIORITY};
pub use manager::ContextManager;
pub use path::{is_index_segment, join_path, split_path, AbsolutePath};

pub(crate) use listener::RemovalRegistry;
