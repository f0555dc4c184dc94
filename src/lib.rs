//! # Statecan
//!
//! A reactive state container for Rust.
//!
//! A [`Store`] holds an immutable [`Triple`]: the current state, the last
//! error and a loading flag, tagged with the [`Event`] that produced it.
//!
//! ## Mutation
//!
//! - `update`, `set_loading`, `set_error` build a candidate triple, pass it
//!   through the [`StoreHooks::middleware`] hook and accept it only if the
//!   targeted field changed (or `force` is set)
//! - A new state always clears the error
//! - Accepted triples are broadcast to runtime-wide listeners and to the
//!   store's own [`Observer`]s
//!
//! ## Async execution
//!
//! - `execute` / `execute_two_branch` debounce rapid calls, cancel the
//!   previous producer before starting a new one and fold the outcome into
//!   state or error
//! - `execute_stream` binds a stream of results to the store
//!
//! ## Runtime
//!
//! - [`runtime::StoreRuntime`] owns the listener registry and the store
//!   resolver; there is a global runtime plus scoped ones for isolation

pub mod config;
pub mod either;
pub mod error;
pub mod runtime;
pub mod store;
pub mod triple;

use std::fmt::Debug;

// Re-export main types for convenience
pub use async_trait::async_trait;
pub use config::StoreConfig;
pub use either::Either;
pub use error::{ContractError, ExecutionError};
pub use runtime::{
    add_triple_listener, get_resolved, listener, remove_triple_listener, set_resolver,
    StoreRuntime, StoreType, TripleChange, TripleListener,
};
pub use store::{
    DefaultHooks, Disposer, ExecutionHandle, ManagedStore, Observer, Outcome, Store,
    StoreHooks, StreamSubscription,
};
pub use triple::{Event, Triple, When};

/// Bound shared by state and error types held in a store.
pub trait StoreValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
