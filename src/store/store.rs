use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{FutureExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use super::hooks::{DefaultHooks, StoreHooks};
use super::observe::{Disposer, Observer};
use super::slot::{ExecutionHandle, ExecutionSlot, Outcome, RequestTicket};
use super::stream::StreamSubscription;
use crate::config::StoreConfig;
use crate::either::Either;
use crate::error::{panic_message, ExecutionError};
use crate::runtime::{StoreRuntime, StoreType, TripleChange};
use crate::triple::{Event, Triple, When};
use crate::StoreValue;

type Subscriber<E, S> = Arc<Observer<E, S>>;

struct Inner<E, S> {
    id: u64,
    source: StoreType,
    current: RwLock<Triple<E, S>>,
    last_stable: RwLock<Triple<E, S>>,
    hooks: Arc<dyn StoreHooks<E, S>>,
    runtime: Arc<StoreRuntime>,
    config: StoreConfig,
    slot: ExecutionSlot,
    subscribers: RwLock<Vec<(u64, Subscriber<E, S>)>>,
    next_subscriber: AtomicU64,
    streams: Mutex<Vec<AbortHandle>>,
}

/// A reactive state container.
///
/// A store holds one current [`Triple`] (state, error, loading flag) and
/// changes it only through `update`, `set_loading` and `set_error`. Each
/// accepted change is broadcast to the runtime's triple listeners and to the
/// store's own observers. A change that leaves the targeted field equal is
/// dropped silently unless `force` is set.
///
/// `Store` is a cheap handle: clones share the same state.
///
/// # Examples
///
/// ```
/// use statecan::Store;
///
/// let store: Store<String, i32> = Store::new(0);
/// assert!(store.update(5, false));
/// assert!(!store.update(5, false));
///
/// store.set_error("offline".to_string(), false);
/// assert_eq!(store.error().as_deref(), Some("offline"));
///
/// store.update(7, false);
/// assert_eq!(store.error(), None);
/// ```
pub struct Store<E, S> {
    inner: Arc<Inner<E, S>>,
}

/// Configures and builds a [`Store`].
pub struct StoreBuilder<E, S> {
    initial: S,
    hooks: Option<Arc<dyn StoreHooks<E, S>>>,
    source: Option<StoreType>,
    runtime: Option<Arc<StoreRuntime>>,
    config: StoreConfig,
}

impl<E: StoreValue, S: StoreValue> StoreBuilder<E, S> {
    /// Install hooks. Unless [`tagged`](Self::tagged) is also called, the
    /// hooks type becomes the store's broadcast tag.
    pub fn hooks<H: StoreHooks<E, S>>(mut self, hooks: H) -> Self {
        self.source.get_or_insert_with(StoreType::of::<H>);
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Tag broadcasts from this store with `T`, usually the domain store
    /// wrapping it.
    pub fn tagged<T: ?Sized + 'static>(mut self) -> Self {
        self.source = Some(StoreType::of::<T>());
        self
    }

    /// Attach the store to a specific runtime instead of the current one.
    pub fn runtime(mut self, runtime: Arc<StoreRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Store<E, S> {
        let runtime = self.runtime.unwrap_or_else(StoreRuntime::current);
        let hooks: Arc<dyn StoreHooks<E, S>> = match self.hooks {
            Some(hooks) => hooks,
            None => Arc::new(DefaultHooks),
        };
        let triple = Triple::new(self.initial);

        let store = Store {
            inner: Arc::new(Inner {
                id: runtime.next_id(),
                source: self.source.unwrap_or_else(StoreType::of::<Store<E, S>>),
                current: RwLock::new(triple.clone()),
                last_stable: RwLock::new(triple),
                hooks,
                runtime,
                config: self.config,
                slot: ExecutionSlot::new(),
                subscribers: RwLock::new(Vec::new()),
                next_subscriber: AtomicU64::new(0),
                streams: Mutex::new(Vec::new()),
            }),
        };

        tracing::debug!(store = %store.inner.source, id = store.inner.id, "store created");
        store.inner.hooks.init_store(&store);
        store
    }
}

impl<E: StoreValue, S: StoreValue> Store<E, S> {
    /// Create a store on the current runtime with default hooks and config.
    pub fn new(initial: S) -> Self {
        Self::builder(initial).build()
    }

    pub fn builder(initial: S) -> StoreBuilder<E, S> {
        StoreBuilder {
            initial,
            hooks: None,
            source: None,
            runtime: None,
            config: StoreConfig::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Type tag attached to this store's broadcasts.
    pub fn source(&self) -> StoreType {
        self.inner.source
    }

    pub fn runtime(&self) -> &Arc<StoreRuntime> {
        &self.inner.runtime
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn state(&self) -> S {
        self.inner.current.read().state().clone()
    }

    pub fn error(&self) -> Option<E> {
        self.inner.current.read().error().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.current.read().is_loading()
    }

    /// Snapshot of the whole current triple.
    pub fn triple(&self) -> Triple<E, S> {
        self.inner.current.read().clone()
    }

    /// The triple as of the last accepted `update`, with loading cleared.
    pub fn last_stable(&self) -> Triple<E, S> {
        self.inner.last_stable.read().clone()
    }

    /// Read the current triple without cloning it.
    ///
    /// Do not mutate the store from inside `f`.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Triple<E, S>) -> R,
    {
        let current = self.inner.current.read();
        f(&current)
    }

    /// Project the current triple onto one callback; see [`Triple::when`].
    pub fn when<'a, R>(&'a self, on_state: impl FnOnce(&S) -> R + 'a) -> When<'a, E, S, R> {
        When::new(Cow::Owned(self.triple()), on_state)
    }

    /// Whether a producer started by `execute*` is still running.
    pub fn has_pending(&self) -> bool {
        self.inner.slot.has_pending()
    }

    /// Ticket of the most recent `execute*` call.
    pub fn last_request(&self) -> Option<RequestTicket> {
        self.inner.slot.last_request()
    }

    /// Replace the state. A new state always clears the error.
    ///
    /// Returns whether the change was accepted.
    pub fn update(&self, state: S, force: bool) -> bool {
        self.propagate(Event::State, force, |current| {
            current.with_state(state).clearing_error()
        })
    }

    pub fn set_loading(&self, is_loading: bool, force: bool) -> bool {
        self.propagate(Event::Loading, force, |current| {
            current.with_loading(is_loading)
        })
    }

    /// Set or clear (`None`) the error.
    pub fn set_error(&self, error: impl Into<Option<E>>, force: bool) -> bool {
        let error = error.into();
        self.propagate(Event::Error, force, |current| current.with_error(error))
    }

    /// Build, filter and commit a candidate under one write guard, so a
    /// concurrent mutation cannot land between the read and the write.
    /// Observers run after the guard is released.
    fn propagate<B>(&self, target: Event, force: bool, build: B) -> bool
    where
        B: FnOnce(&Triple<E, S>) -> Triple<E, S>,
    {
        let accepted = {
            let mut current = self.inner.current.write();
            let candidate = self.inner.hooks.middleware(build(&*current));
            let changed = match target {
                Event::State => candidate.state() != current.state(),
                Event::Loading => candidate.is_loading() != current.is_loading(),
                Event::Error => candidate.error() != current.error(),
            };
            if force || changed {
                if target == Event::State {
                    *self.inner.last_stable.write() = candidate.settled();
                }
                *current = candidate.clone();
                Some(candidate)
            } else {
                None
            }
        };

        match accepted {
            Some(triple) => {
                tracing::debug!(
                    store = %self.inner.source,
                    id = self.inner.id,
                    event = ?triple.event(),
                    force,
                    "transition accepted"
                );
                self.notify(&triple);
                true
            }
            None => {
                tracing::trace!(
                    store = %self.inner.source,
                    id = self.inner.id,
                    event = ?target,
                    "transition rejected: field unchanged"
                );
                false
            }
        }
    }

    /// Notify runtime listeners, then this store's observers.
    fn notify(&self, triple: &Triple<E, S>) {
        let change = TripleChange::new(self.inner.source, self.inner.id, triple);
        self.inner.runtime.broadcast(&change);

        let subscribers: Vec<Subscriber<E, S>> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in subscribers {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| observer.notify(triple)));
            if let Err(payload) = delivered {
                tracing::warn!(
                    store = %self.inner.source,
                    id = self.inner.id,
                    panic = %panic_message(&*payload),
                    "store observer panicked"
                );
            }
        }
    }

    /// Subscribe to this store's accepted transitions.
    ///
    /// The observer stays subscribed until the returned [`Disposer`] is
    /// disposed or dropped, or the store is released.
    pub fn observer(&self, observer: Observer<E, S>) -> Disposer {
        let key = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .write()
            .push((key, Arc::new(observer)));

        let inner: Weak<Inner<E, S>> = Arc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.write().retain(|(k, _)| *k != key);
            }
        })
    }

    /// Run `producer` after the configured debounce window and fold its
    /// result into the store.
    ///
    /// Must be called from within a Tokio runtime. The call is stamped
    /// immediately; the work itself runs on a spawned task:
    ///
    /// 1. wait for the debounce window, then give up if a newer `execute*`
    ///    call was made in the meantime;
    /// 2. `set_loading(true)`;
    /// 3. cancel the producer of any earlier call and wait for it to stop;
    /// 4. run `producer`;
    /// 5. if this is still the latest call, fold `Ok` with a forced `update`
    ///    or `Err` with a forced `set_error`, then `set_loading(false)`.
    ///
    /// A cancelled producer folds nothing and leaves loading as it was.
    pub fn execute<P, Fut, F>(&self, producer: P) -> ExecutionHandle
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, F>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        self.execute_with_delay(producer, self.inner.config.debounce)
    }

    /// [`execute`](Self::execute) with an explicit debounce window.
    pub fn execute_with_delay<P, Fut, F>(&self, producer: P, delay: Duration) -> ExecutionHandle
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, F>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        let ticket = self.inner.slot.stamp();
        let store = self.clone();
        let task = tokio::spawn(async move { store.drive(ticket, delay, producer).await });
        ExecutionHandle::new(ticket, task)
    }

    /// Like [`execute`](Self::execute), for producers returning an
    /// [`Either`]: `Left` is folded as an error, `Right` as the new state.
    pub fn execute_two_branch<P, Fut, F>(&self, producer: P) -> ExecutionHandle
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Either<F, S>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        self.execute_two_branch_with_delay(producer, self.inner.config.debounce)
    }

    pub fn execute_two_branch_with_delay<P, Fut, F>(
        &self,
        producer: P,
        delay: Duration,
    ) -> ExecutionHandle
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Either<F, S>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        self.execute_with_delay(move || producer().map(Either::into_result), delay)
    }

    async fn drive<P, Fut, F>(
        self,
        ticket: RequestTicket,
        delay: Duration,
        producer: P,
    ) -> Result<Outcome, ExecutionError>
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, F>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        tokio::time::sleep(delay).await;
        if !self.inner.slot.is_latest(ticket) {
            tracing::debug!(
                store = %self.inner.source,
                id = self.inner.id,
                request = ticket.seq(),
                "execution debounced"
            );
            return Ok(Outcome::Debounced);
        }

        self.set_loading(true, false);

        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        self.inner
            .slot
            .replace(move || {
                tokio::spawn(async move {
                    let result = AssertUnwindSafe(async move { producer().await })
                        .catch_unwind()
                        .await;
                    let outcome = match result {
                        Ok(result) => Ok(store.fold(ticket, result.map_err(Into::into))),
                        Err(payload) => {
                            let message = panic_message(&*payload);
                            tracing::warn!(
                                store = %store.inner.source,
                                id = store.inner.id,
                                panic = %message,
                                "async producer panicked"
                            );
                            Err(ExecutionError::Panicked(message))
                        }
                    };
                    let _ = tx.send(outcome);
                })
            })
            .await;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(
                    store = %self.inner.source,
                    id = self.inner.id,
                    request = ticket.seq(),
                    "execution cancelled by a newer call"
                );
                Ok(Outcome::Superseded)
            }
        }
    }

    fn fold(&self, ticket: RequestTicket, result: Result<S, E>) -> Outcome {
        if !self.inner.slot.is_latest(ticket) {
            tracing::debug!(
                store = %self.inner.source,
                id = self.inner.id,
                request = ticket.seq(),
                "result discarded: superseded before fold"
            );
            return Outcome::Superseded;
        }
        let outcome = match result {
            Ok(state) => {
                self.update(state, true);
                Outcome::Updated
            }
            Err(error) => {
                self.set_error(error, true);
                Outcome::Errored
            }
        };
        self.set_loading(false, false);
        outcome
    }

    /// Bind a stream of results to the store.
    ///
    /// Sets loading on subscription, applies each `Ok` with `update`, each
    /// `Err` with a forced `set_error`, and clears loading when the stream
    /// ends. There is no debouncing and no cancellation of other work: every
    /// subscription is independent. Must be called from within a Tokio
    /// runtime.
    pub fn execute_stream<St, F>(&self, stream: St) -> StreamSubscription
    where
        St: Stream<Item = Result<S, F>> + Send + 'static,
        F: Into<E> + Send + 'static,
    {
        self.set_loading(true, false);

        let store = self.clone();
        let task = tokio::spawn(async move {
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(state) => {
                        store.update(state, false);
                    }
                    Err(error) => {
                        let error: E = error.into();
                        store.set_error(error, true);
                    }
                }
            }
            store.set_loading(false, false);
        });

        let mut streams = self.inner.streams.lock();
        streams.retain(|handle| !handle.is_finished());
        streams.push(task.abort_handle());
        drop(streams);

        StreamSubscription::new(task)
    }

    /// Release everything the store holds: invalidate outstanding `execute*`
    /// calls, cancel the pending producer (waiting for it to stop), abort all
    /// stream subscriptions and drop all observers.
    ///
    /// State is left as it was. Concrete stores call this from
    /// [`ManagedStore::destroy`](super::ManagedStore::destroy).
    pub async fn release(&self) {
        self.inner.slot.invalidate();
        let cancelled = self.inner.slot.cancel().await;

        let streams: Vec<AbortHandle> = self.inner.streams.lock().drain(..).collect();
        for handle in &streams {
            handle.abort();
        }
        self.inner.subscribers.write().clear();

        tracing::debug!(
            store = %self.inner.source,
            id = self.inner.id,
            cancelled,
            streams = streams.len(),
            "store released"
        );
    }
}

impl<E, S> Clone for Store<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: fmt::Debug, S: fmt::Debug> fmt::Debug for Store<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("triple", &*self.inner.current.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Counter = Store<String, i32>;

    fn isolated(initial: i32) -> Counter {
        Store::builder(initial).runtime(StoreRuntime::new()).build()
    }

    fn record(store: &Counter) -> Arc<Mutex<Vec<Triple<String, i32>>>> {
        let seen: Arc<Mutex<Vec<Triple<String, i32>>>> = Arc::default();
        let seen_clone = Arc::clone(&seen);
        store.runtime().add_triple_listener(crate::runtime::listener(move |change| {
            if let Some(triple) = change.downcast::<String, i32>() {
                seen_clone.lock().push(triple.clone());
            }
        }));
        seen
    }

    #[test]
    fn new_store_starts_idle() {
        let store = isolated(3);
        assert_eq!(store.triple(), Triple::new(3));
        assert_eq!(store.last_stable(), Triple::new(3));
        assert!(!store.has_pending());
    }

    #[test]
    fn unchanged_update_is_silent() {
        let store = isolated(0);
        let seen = record(&store);

        assert!(!store.update(0, false));
        assert!(!store.set_loading(false, false));
        assert!(!store.set_error(None::<String>, false));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn force_broadcasts_equal_values() {
        let store = isolated(0);
        let seen = record(&store);

        assert!(store.update(0, true));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn update_clears_error() {
        let store = isolated(0);
        store.set_error("bad".to_string(), false);
        store.update(1, false);

        assert_eq!(store.error(), None);
        assert_eq!(store.triple().event(), Event::State);
    }

    #[test]
    fn acceptance_compares_only_the_targeted_field() {
        let store = isolated(0);
        store.set_error("bad".to_string(), false);

        // Same state: rejected even though the error would be cleared.
        assert!(!store.update(0, false));
        assert_eq!(store.error().as_deref(), Some("bad"));
    }

    #[test]
    fn last_stable_tracks_updates_with_loading_cleared() {
        let store = isolated(0);
        store.set_loading(true, false);
        store.update(4, false);

        assert!(store.is_loading());
        let stable = store.last_stable();
        assert_eq!(*stable.state(), 4);
        assert!(!stable.is_loading());

        store.set_error("x".to_string(), false);
        assert_eq!(store.last_stable().error(), None);
    }

    struct Clamp;

    impl StoreHooks<String, i32> for Clamp {
        fn middleware(&self, candidate: Triple<String, i32>) -> Triple<String, i32> {
            if *candidate.state() > 10 {
                candidate.with_state(10)
            } else {
                candidate
            }
        }

        fn init_store(&self, store: &Store<String, i32>) {
            store.update(1, false);
        }
    }

    #[test]
    fn hooks_shape_candidates_and_init() {
        let store: Counter = Store::builder(0)
            .runtime(StoreRuntime::new())
            .hooks(Clamp)
            .build();

        assert_eq!(store.state(), 1);
        assert!(store.source().is::<Clamp>());

        store.update(50, false);
        assert_eq!(store.state(), 10);
        // Clamped again to 10, equal to current: rejected.
        assert!(!store.update(99, false));
    }

    struct Gate {
        barrier: Arc<std::sync::Barrier>,
        armed: std::sync::atomic::AtomicBool,
    }

    impl StoreHooks<String, i32> for Gate {
        fn middleware(&self, candidate: Triple<String, i32>) -> Triple<String, i32> {
            if candidate.event() == Event::State && self.armed.swap(false, Ordering::SeqCst) {
                self.barrier.wait();
                std::thread::sleep(Duration::from_millis(50));
            }
            candidate
        }
    }

    #[test]
    fn mutation_during_slow_middleware_is_not_lost() {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let store: Counter = Store::builder(0)
            .runtime(StoreRuntime::new())
            .hooks(Gate {
                barrier: Arc::clone(&barrier),
                armed: std::sync::atomic::AtomicBool::new(true),
            })
            .build();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || store.update(5, false))
        };
        barrier.wait();
        assert!(store.set_loading(true, false));
        assert!(writer.join().unwrap());

        assert_eq!(store.state(), 5);
        assert!(store.is_loading());
    }

    #[test]
    fn panicking_observer_does_not_stop_the_others() {
        let store = isolated(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        store
            .observer(Observer::new().on_state(|_| panic!("observer bug")))
            .forget();
        store
            .observer(Observer::new().on_state(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .forget();

        assert!(store.update(1, false));
        assert!(store.update(2, false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.state(), 2);
    }

    #[test]
    fn observer_gets_matching_callback_until_disposed() {
        let store = isolated(0);
        let states = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let (s, e) = (Arc::clone(&states), Arc::clone(&errors));

        let disposer = store.observer(
            Observer::new()
                .on_state(move |_| {
                    s.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                }),
        );

        store.update(1, false);
        store.set_loading(true, false);
        store.set_error("x".to_string(), false);
        assert_eq!(states.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        drop(disposer);
        store.update(2, false);
        assert_eq!(states.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn when_projects_current_event() {
        let store = isolated(2);
        store.set_error("late".to_string(), false);

        let text = store
            .when(|s| format!("state {s}"))
            .loading(|| "loading".to_string())
            .error(|e| format!("error {e}"))
            .resolve();
        assert_eq!(text, "error late");
    }
}
