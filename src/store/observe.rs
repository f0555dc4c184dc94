use std::fmt;

use crate::triple::{Event, Triple};

type StateCallback<S> = Box<dyn Fn(&S) + Send + Sync>;
type LoadingCallback = Box<dyn Fn(bool) + Send + Sync>;
type ErrorCallback<E> = Box<dyn Fn(Option<&E>) + Send + Sync>;

/// Per-store subscriber with one optional callback per event.
///
/// Each accepted transition calls at most one callback: the one matching the
/// new triple's [`Event`].
pub struct Observer<E, S> {
    on_state: Option<StateCallback<S>>,
    on_loading: Option<LoadingCallback>,
    on_error: Option<ErrorCallback<E>>,
}

impl<E, S> Default for Observer<E, S> {
    fn default() -> Self {
        Self {
            on_state: None,
            on_loading: None,
            on_error: None,
        }
    }
}

impl<E, S> Observer<E, S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_state(mut self, f: impl Fn(&S) + Send + Sync + 'static) -> Self {
        self.on_state = Some(Box::new(f));
        self
    }

    pub fn on_loading(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_loading = Some(Box::new(f));
        self
    }

    /// The callback sees `None` when the transition cleared the error.
    pub fn on_error(mut self, f: impl Fn(Option<&E>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn notify(&self, triple: &Triple<E, S>) {
        match triple.event() {
            Event::State => {
                if let Some(f) = &self.on_state {
                    f(triple.state());
                }
            }
            Event::Loading => {
                if let Some(f) = &self.on_loading {
                    f(triple.is_loading());
                }
            }
            Event::Error => {
                if let Some(f) = &self.on_error {
                    f(triple.error());
                }
            }
        }
    }
}

/// Tears down a per-store observer.
///
/// Dropping the disposer also unsubscribes; call [`Disposer::forget`] to keep
/// the observer for the lifetime of the store instead.
#[must_use = "dropping a Disposer unsubscribes the observer immediately"]
pub struct Disposer {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Disposer {
    pub(crate) fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Unsubscribe the observer.
    pub async fn dispose(mut self) {
        self.run();
    }

    /// Keep the observer subscribed until the store releases it.
    pub fn forget(mut self) {
        self.unsubscribe = None;
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
