//! Errors which a fetcher can report through its outcome
//!
//! There are three broad families of failures. The wrapped function may
//! report an error of its own, the cancellation context supplied at start
//! time may have fired, or the computation may have panicked. All of them end
//! up in the stored outcome, none of them is ever thrown across threads.

use crate::panic::PanicPayload;
use thiserror::Error;


/// Terminal error of a cancellation context
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum CancelError {
    /// The context was explicitly cancelled by its owner
    #[error("context cancelled")]
    Cancelled,

    /// The context's deadline has passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}


/// Failure outcome of a fetcher
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FetchError<E> {
    /// The wrapped function returned an error, which is kept verbatim
    #[error("{0}")]
    Failed(#[source] E),

    /// The cancellation context fired before the function reported an error
    #[error("{0}")]
    Cancelled(#[source] CancelError),

    /// The computation panicked and the panic was recovered
    #[error("[Fetcher]: panic recovered: {0}")]
    Panicked(PanicPayload),

    /// The OS refused to spawn the computation thread
    #[error("[Fetcher]: failed to spawn computation thread: {0}")]
    Spawn(String),

    /// The computation thread exited without storing an outcome
    ///
    /// The recovery path stores an outcome before doing anything which could
    /// unwind, so this is only a fallback keeping waiters from blocking
    /// forever if that ever stops being true.
    ///
    #[error("[Fetcher]: computation thread terminated without an outcome")]
    Terminated,
}
//
impl<E> FetchError<E> {
    /// Functional error reported by the wrapped function, if any
    pub fn failure(&self) -> Option<&E> {
        match self {
            FetchError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this failure comes from the cancellation context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }

    /// Whether this failure comes from a recovered panic
    pub fn is_panic(&self) -> bool {
        matches!(self, FetchError::Panicked(_))
    }
}


/// Outcome of a fetcher, stored exactly once
pub type Outcome<T, E> = Result<T, FetchError<E>>;
