//! Error taxonomy shared by every runtime primitive.
//!
//! A terminal outcome may be read any number of times, so [`Error`] is
//! cheaply cloneable: user errors are stored behind an [`Arc`].

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by deferred units and the primitives built on them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The operation observed a cancellation signal, either before it was
    /// admitted or cooperatively while running.
    #[error("operation cancelled")]
    OperationCancelled,

    /// One or more composed operations faulted. Every fault is kept, in
    /// input order.
    #[error("{} operation(s) faulted: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<Error>),

    /// A completion source was settled more than once.
    #[error("completion source already settled")]
    AlreadySettled,

    /// The work panicked while being polled.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A deadline elapsed before the wrapped future completed.
    #[error("deadline elapsed")]
    TimedOut,

    /// A combinator that needs at least one unit received none.
    #[error("no units were supplied")]
    EmptyInput,

    /// An error raised by user work.
    #[error(transparent)]
    Faulted(Arc<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error as a fault.
    pub fn fault<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Faulted(Arc::new(error))
    }

    /// Builds a fault from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::fault(Message(message.into()))
    }

    /// Returns `true` for [`Error::OperationCancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::OperationCancelled)
    }

    /// Returns the inner errors of an aggregate, or this error alone.
    pub fn errors(&self) -> &[Error] {
        match self {
            Error::Aggregate(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// Message-only error used by [`Error::msg`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
