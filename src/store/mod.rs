//! The store: propagation pipeline, async execution and observation.
//!
//! A [`Store`] owns one current triple and one execution slot. Domain stores
//! wrap it and implement [`ManagedStore`]; [`StoreHooks`] supplies the
//! optional middleware and init hooks.

mod hooks;
mod observe;
mod slot;
#[allow(clippy::module_inception)]
mod store;
mod stream;

pub use hooks::{DefaultHooks, ManagedStore, StoreHooks};
pub use observe::{Disposer, Observer};
pub use slot::{ExecutionHandle, Outcome, RequestTicket};
pub use store::{Store, StoreBuilder};
pub use stream::StreamSubscription;
