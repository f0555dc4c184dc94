use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::panic_message;
use crate::triple::{Event, Triple};

/// Callback notified of every accepted transition of every store sharing a
/// runtime.
pub type TripleListener = dyn Fn(&TripleChange<'_>) + Send + Sync;

/// Wrap a closure as a registrable listener.
///
/// Registration is keyed by the returned `Arc`, so keep a clone around to
/// remove it later.
pub fn listener<F>(f: F) -> Arc<TripleListener>
where
    F: Fn(&TripleChange<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Runtime type tag of the store a broadcast came from.
#[derive(Clone, Copy)]
pub struct StoreType {
    id: TypeId,
    name: &'static str,
}

impl StoreType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for StoreType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StoreType {}

impl fmt::Debug for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One accepted transition, as seen by runtime-wide listeners.
///
/// The triple is type-erased because a single registry serves stores of every
/// state and error type; recover it with [`TripleChange::downcast`].
pub struct TripleChange<'a> {
    source: StoreType,
    store_id: u64,
    event: Event,
    triple: &'a (dyn Any + Send + Sync),
}

impl<'a> TripleChange<'a> {
    pub(crate) fn new<E, S>(source: StoreType, store_id: u64, triple: &'a Triple<E, S>) -> Self
    where
        E: Send + Sync + 'static,
        S: Send + Sync + 'static,
    {
        Self {
            source,
            store_id,
            event: triple.event(),
            triple,
        }
    }

    pub fn source(&self) -> StoreType {
        self.source
    }

    /// Runtime-unique id of the emitting store instance.
    pub fn store_id(&self) -> u64 {
        self.store_id
    }

    pub fn event(&self) -> Event {
        self.event
    }

    pub fn downcast<E: 'static, S: 'static>(&self) -> Option<&'a Triple<E, S>> {
        self.triple.downcast_ref()
    }
}

/// Set of runtime-wide triple listeners.
///
/// Listeners are compared by `Arc` identity, so adding the same listener twice
/// keeps a single entry. Dispatch works on a snapshot, which lets a listener
/// add or remove listeners (itself included) while being notified.
#[derive(Default)]
pub struct ObserverRegistry {
    listeners: RwLock<Vec<Arc<TripleListener>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub fn add_listener(&self, listener: Arc<TripleListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<TripleListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn contains(&self, listener: &Arc<TripleListener>) -> bool {
        self.listeners
            .read()
            .iter()
            .any(|l| same_listener(l, listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Call every listener with `change`.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn dispatch(&self, change: &TripleChange<'_>) {
        let snapshot: Vec<Arc<TripleListener>> = self.listeners.read().clone();
        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(change))) {
                tracing::warn!(
                    store = %change.source(),
                    event = ?change.event(),
                    panic = %panic_message(&*payload),
                    "triple listener panicked"
                );
            }
        }
    }
}

fn same_listener(a: &Arc<TripleListener>, b: &Arc<TripleListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe;

    fn counting(counter: &Arc<AtomicUsize>) -> Arc<TripleListener> {
        let counter = Arc::clone(counter);
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn fire(registry: &ObserverRegistry) {
        let triple: Triple<String, i32> = Triple::new(1);
        registry.dispatch(&TripleChange::new(StoreType::of::<Probe>(), 0, &triple));
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let l = counting(&counter);

        assert!(registry.add_listener(Arc::clone(&l)));
        assert!(!registry.add_listener(Arc::clone(&l)));
        assert_eq!(registry.len(), 1);

        fire(&registry);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let l = counting(&counter);

        registry.add_listener(Arc::clone(&l));
        assert!(registry.remove_listener(&l));
        assert!(!registry.remove_listener(&l));

        fire(&registry);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add_listener(listener(|_| panic!("listener failure")));
        registry.add_listener(counting(&counter));

        fire(&registry);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn change_downcasts_to_its_triple_type() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        registry.add_listener(listener(move |change| {
            assert!(change.source().is::<Probe>());
            assert!(change.downcast::<u8, u8>().is_none());
            let triple = change.downcast::<String, i32>().expect("typed triple");
            seen_clone.store(*triple.state() as usize, Ordering::SeqCst);
        }));

        fire(&registry);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_unregister_itself_during_dispatch() {
        let registry = Arc::new(ObserverRegistry::new());
        let slot: Arc<parking_lot::Mutex<Option<Arc<TripleListener>>>> = Arc::default();

        let registry_clone = Arc::clone(&registry);
        let slot_clone = Arc::clone(&slot);
        let l = listener(move |_| {
            if let Some(me) = slot_clone.lock().take() {
                registry_clone.remove_listener(&me);
            }
        });
        *slot.lock() = Some(Arc::clone(&l));
        registry.add_listener(l);

        fire(&registry);
        assert!(registry.is_empty());
    }
}
