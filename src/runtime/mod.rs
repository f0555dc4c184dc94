//! Runtime support shared by stores.
//!
//! This module provides the runtime-wide triple listener registry, the store
//! resolver hook and the global/scoped runtime context that owns both.

mod context;
mod registry;
mod resolver;

use std::any::{Any, TypeId};
use std::sync::Arc;

pub use context::StoreRuntime;
pub use registry::{listener, ObserverRegistry, StoreType, TripleChange, TripleListener};
pub use resolver::Factory;

use crate::error::Result;
use crate::store::ManagedStore;

/// Register a listener on the current runtime.
pub fn add_triple_listener(listener: Arc<TripleListener>) -> bool {
    StoreRuntime::current().add_triple_listener(listener)
}

/// Unregister a listener from the current runtime.
pub fn remove_triple_listener(listener: &Arc<TripleListener>) -> bool {
    StoreRuntime::current().remove_triple_listener(listener)
}

/// Install the store factory on the current runtime.
pub fn set_resolver<F>(factory: F)
where
    F: Fn(TypeId) -> Option<Arc<dyn Any + Send + Sync>> + Send + Sync + 'static,
{
    StoreRuntime::current().set_resolver(factory);
}

/// Resolve a store through the current runtime's factory.
pub fn get_resolved<T: ManagedStore>() -> Result<Arc<T>> {
    StoreRuntime::current().get_resolved::<T>()
}
