use std::borrow::Cow;

use super::When;

/// Which field of a [`Triple`] the most recent transition targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    State,
    Loading,
    Error,
}

/// An immutable snapshot of a store: its state, last error, loading flag and
/// the event that produced it.
///
/// Every transition builds a new triple; none of the `with_*` methods touch
/// `self`.
///
/// # Examples
///
/// ```
/// use statecan::{Event, Triple};
///
/// let start: Triple<String, i32> = Triple::new(0);
/// let failed = start.with_error(Some("offline".to_string()));
///
/// assert_eq!(failed.event(), Event::Error);
/// assert_eq!(start.error(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Triple<E, S> {
    state: S,
    error: Option<E>,
    is_loading: bool,
    event: Event,
}

impl<E: Clone, S: Clone> Triple<E, S> {
    /// The triple a fresh store starts from.
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            error: None,
            is_loading: false,
            event: Event::State,
        }
    }

    pub fn with_state(&self, state: S) -> Self {
        Self {
            state,
            error: self.error.clone(),
            is_loading: self.is_loading,
            event: Event::State,
        }
    }

    pub fn with_loading(&self, is_loading: bool) -> Self {
        Self {
            state: self.state.clone(),
            error: self.error.clone(),
            is_loading,
            event: Event::Loading,
        }
    }

    pub fn with_error(&self, error: Option<E>) -> Self {
        Self {
            state: self.state.clone(),
            error,
            is_loading: self.is_loading,
            event: Event::Error,
        }
    }

    /// Same triple with the error slot emptied. The event tag is kept.
    pub fn clearing_error(&self) -> Self {
        Self {
            error: None,
            ..self.clone()
        }
    }

    pub(crate) fn settled(&self) -> Self {
        Self {
            is_loading: false,
            ..self.clone()
        }
    }

    /// Project this triple onto one callback chosen by its event.
    ///
    /// `on_state` is the fallback; add the other branches with
    /// [`When::loading`] and [`When::error`], then call [`When::resolve`].
    ///
    /// ```
    /// use statecan::Triple;
    ///
    /// let triple: Triple<String, u32> = Triple::new(3);
    /// let label = triple
    ///     .with_loading(true)
    ///     .when(|n| format!("{n} items"))
    ///     .loading(|| "loading".to_string())
    ///     .resolve();
    /// assert_eq!(label, "loading");
    /// ```
    pub fn when<'a, R>(&'a self, on_state: impl FnOnce(&S) -> R + 'a) -> When<'a, E, S, R> {
        When::new(Cow::Borrowed(self), on_state)
    }
}

impl<E, S> Triple<E, S> {
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn event(&self) -> Event {
        self.event
    }
}
