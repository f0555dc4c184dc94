//! Immutable state snapshots.
//!
//! A [`Triple`] bundles the state value, the last error and the loading flag,
//! tagged with the [`Event`] that produced it.

#[allow(clippy::module_inception)]
mod triple;
mod when;

pub use triple::{Event, Triple};
pub use when::When;
