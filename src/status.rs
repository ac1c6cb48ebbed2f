//! Facilities to represent the lifecycle of a fetcher
//!
//! Any fetcher can be represented as a small state machine. It is created on
//! the client side with a function and an argument bound to it, gets started
//! exactly once on a dedicated thread, and finally ends up with a stored
//! outcome that will not change anymore.

use std::fmt;


/// Representation of a fetcher's lifecycle status
///
/// Here are the possible state transitions:
///
/// - Created -> Started
/// - Started -> Completed
///
/// Starting an already started fetcher does not change its status, and once
/// the fetcher is Completed, its status won't change anymore.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// The function and its argument are bound, but no work was started
    Created,

    /// The computation thread was spawned and has not stored an outcome yet
    Started,

    /// The outcome is stored and the completion signal has been raised
    Completed,
}
//
impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            FetchStatus::Created => "created",
            FetchStatus::Started => "started",
            FetchStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}


/// Check if a fetcher status is final (i.e. won't change anymore)
pub fn is_final(s: &FetchStatus) -> bool {
    match *s {
        FetchStatus::Created | FetchStatus::Started => false,
        FetchStatus::Completed => true,
    }
}
