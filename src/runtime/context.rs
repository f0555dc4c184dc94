use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::registry::{ObserverRegistry, TripleChange, TripleListener};
use super::resolver::{Factory, ResolverSlot};
use crate::error::Result;
use crate::store::ManagedStore;

/// Shared context for a family of stores: the triple listener registry and the
/// store resolver.
///
/// Stores capture a runtime when they are built and broadcast every accepted
/// transition through it. There is a process-wide global runtime (the default)
/// and any number of scoped runtimes for isolation.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use statecan::Store;
///
/// let store: Store<String, i32> = Store::new(0);
/// assert_eq!(store.state(), 0);
/// ```
///
/// Using a scoped runtime for isolation:
///
/// ```
/// use statecan::runtime::StoreRuntime;
/// use statecan::Store;
///
/// StoreRuntime::scope(|| {
///     let store: Store<String, i32> = Store::new(0);
///     store.update(1, false);
///     assert_eq!(store.state(), 1);
/// });
/// // Listeners and resolver of the scope are dropped here
/// ```
pub struct StoreRuntime {
    next_id: AtomicU64,
    registry: ObserverRegistry,
    resolver: ResolverSlot,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<StoreRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl StoreRuntime {
    /// Create a new isolated runtime.
    ///
    /// Pass it to [`StoreBuilder::runtime`](crate::store::StoreBuilder::runtime)
    /// to wire stores to it explicitly.
    pub fn new() -> Arc<Self> {
        Arc::new(StoreRuntime {
            next_id: AtomicU64::new(0),
            registry: ObserverRegistry::new(),
            resolver: ResolverSlot::default(),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// Stores created inside `f` without an explicit runtime use this one.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<StoreRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current runtime (innermost scope, or the global one).
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// ```
    /// use statecan::runtime::StoreRuntime;
    /// use std::sync::Arc;
    ///
    /// let runtime = StoreRuntime::new();
    /// let inside = StoreRuntime::with_runtime(runtime.clone(), StoreRuntime::current);
    /// assert!(Arc::ptr_eq(&runtime, &inside));
    /// ```
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Drop every listener and the installed resolver.
    ///
    /// Meant for test teardown. Store ids are not reused.
    pub fn reset(&self) {
        self.registry.clear();
        self.resolver.clear();
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    /// Id for the next store built on this runtime.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add_triple_listener(&self, listener: Arc<TripleListener>) -> bool {
        self.registry.add_listener(listener)
    }

    pub fn remove_triple_listener(&self, listener: &Arc<TripleListener>) -> bool {
        self.registry.remove_listener(listener)
    }

    pub(crate) fn broadcast(&self, change: &TripleChange<'_>) {
        self.registry.dispatch(change);
    }

    /// Install the store factory, replacing any previous one.
    pub fn set_resolver<F>(&self, factory: F)
    where
        F: Fn(std::any::TypeId) -> Option<Arc<dyn std::any::Any + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        let factory: Arc<Factory> = Arc::new(factory);
        self.resolver.install(factory);
    }

    pub fn clear_resolver(&self) {
        self.resolver.clear();
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_installed()
    }

    /// Look up a store through the installed factory.
    ///
    /// This is a startup wiring check: it fails with a
    /// [`ContractError`](crate::ContractError) when no factory is installed,
    /// when the factory does not know `T`, or when it returns something else.
    pub fn get_resolved<T: ManagedStore>(&self) -> Result<Arc<T>> {
        self.resolver.resolve::<T>()
    }
}
