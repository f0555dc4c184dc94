use std::borrow::Cow;

use super::{Event, Triple};

/// Builder returned by [`Triple::when`] and [`Store::when`](crate::Store::when).
pub struct When<'a, E: Clone, S: Clone, R> {
    triple: Cow<'a, Triple<E, S>>,
    on_state: Box<dyn FnOnce(&S) -> R + 'a>,
    on_loading: Option<Box<dyn FnOnce() -> R + 'a>>,
    on_error: Option<Box<dyn FnOnce(&E) -> R + 'a>>,
}

impl<'a, E: Clone, S: Clone, R> When<'a, E, S, R> {
    pub(crate) fn new(triple: Cow<'a, Triple<E, S>>, on_state: impl FnOnce(&S) -> R + 'a) -> Self {
        Self {
            triple,
            on_state: Box::new(on_state),
            on_loading: None,
            on_error: None,
        }
    }

    pub fn loading(mut self, on_loading: impl FnOnce() -> R + 'a) -> Self {
        self.on_loading = Some(Box::new(on_loading));
        self
    }

    pub fn error(mut self, on_error: impl FnOnce(&E) -> R + 'a) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Run exactly one branch.
    ///
    /// Falls back to `on_state` when the event is [`Event::State`], when the
    /// matching branch was not supplied, or when an error event carries no
    /// error.
    pub fn resolve(self) -> R {
        let triple = &self.triple;
        match (triple.event(), self.on_loading, self.on_error, triple.error()) {
            (Event::Loading, Some(on_loading), _, _) => on_loading(),
            (Event::Error, _, Some(on_error), Some(error)) => on_error(error),
            _ => (self.on_state)(triple.state()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(t: &Triple<String, i32>) -> String {
        t.when(|s| format!("state {s}"))
            .loading(|| "loading".to_string())
            .error(|e| format!("error {e}"))
            .resolve()
    }

    #[test]
    fn error_event_runs_only_on_error() {
        let t = Triple::new(1).with_error(Some("boom".to_string()));
        assert_eq!(label(&t), "error boom");
    }

    #[test]
    fn loading_event_runs_on_loading() {
        let t: Triple<String, i32> = Triple::new(1).with_loading(true);
        assert_eq!(label(&t), "loading");
    }

    #[test]
    fn missing_branch_falls_back_to_state() {
        let t = Triple::new(7).with_error(Some("boom".to_string()));
        assert_eq!(t.when(|s| *s).loading(|| -1).resolve(), 7);
    }

    #[test]
    fn empty_error_falls_back_to_state() {
        let t: Triple<String, i32> = Triple::new(2).with_error(None);
        assert_eq!(label(&t), "state 2");
    }
}
