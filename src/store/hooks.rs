use async_trait::async_trait;

use super::Store;
use crate::triple::Triple;
use crate::StoreValue;

/// Optional customization points of a store.
///
/// Every method has a default, so implement only what you need.
pub trait StoreHooks<E, S>: Send + Sync + 'static {
    /// Rewrite a candidate triple before the store decides whether to accept
    /// it. The identity by default.
    ///
    /// Runs while the store's triple is locked: do not read or mutate the
    /// store from here.
    fn middleware(&self, candidate: Triple<E, S>) -> Triple<E, S> {
        candidate
    }

    /// Runs once, at the end of store construction.
    fn init_store(&self, _store: &Store<E, S>) {}
}

/// Hooks that change nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl<E, S> StoreHooks<E, S> for DefaultHooks {}

/// A concrete, domain-level store built on top of a [`Store`].
///
/// Implementors own a `Store` and expose domain operations on it. Teardown is
/// mandatory: `destroy` must release everything the store holds, usually by
/// awaiting [`Store::release`] plus whatever the implementor owns itself.
///
/// ```
/// use statecan::{async_trait, ManagedStore, Store};
///
/// struct Counter {
///     store: Store<String, i64>,
/// }
///
/// #[async_trait]
/// impl ManagedStore for Counter {
///     type Error = String;
///     type State = i64;
///
///     fn store(&self) -> &Store<String, i64> {
///         &self.store
///     }
///
///     async fn destroy(&self) {
///         self.store.release().await;
///     }
/// }
/// ```
#[async_trait]
pub trait ManagedStore: Send + Sync + 'static {
    type Error: StoreValue;
    type State: StoreValue;

    fn store(&self) -> &Store<Self::Error, Self::State>;

    async fn destroy(&self);
}
