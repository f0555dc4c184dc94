//! Fault types.
//!
//! Domain errors never show up here: they are values of a store's own error
//! type and travel inside the [`Triple`](crate::Triple). The enums below cover
//! wiring mistakes and failures of the execution machinery itself.

use thiserror::Error;

/// A programming or wiring fault, raised immediately and never folded into
/// store state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("no resolver installed: call set_resolver before get_resolved::<{expected}>()")]
    ResolverMissing { expected: &'static str },

    #[error("resolver has no factory for {expected}")]
    Unresolved { expected: &'static str },

    #[error("resolver returned a value that is not a {expected}")]
    ResolverMismatch { expected: &'static str },

    #[error("invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },
}

/// Failure of an execution task, as seen through its handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("async producer panicked: {0}")]
    Panicked(String),

    #[error("execution task was aborted before it finished")]
    Aborted,
}

pub type Result<T, E = ContractError> = std::result::Result<T, E>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_expected_type() {
        let err = ContractError::ResolverMismatch {
            expected: "CounterStore",
        };
        assert_eq!(
            err.to_string(),
            "resolver returned a value that is not a CounterStore"
        );
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*a), "boom");
        assert_eq!(panic_message(&*b), "bang");
        assert_eq!(panic_message(&*c), "non-string panic payload");
    }
}
