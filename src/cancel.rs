//! Cancellation contexts observed by fetchers
//!
//! A fetcher never initiates cancellation on its own. Instead, the caller
//! hands it a `CancelContext` when starting it, which the fetcher (and the
//! wrapped function, if it cares) can check at any time. The owner of the
//! context keeps a `CancelHandle` which is used to actually fire it.
//!
//! Contexts form a tree: a child context fires whenever its parent does, on
//! its own deadline, or when its own handle is used. Once a context has
//! fired, its terminal error never changes.

use crate::error::CancelError;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};


/// Read-only cancellation signal, cheap to clone and share across threads
#[derive(Clone, Debug, Default)]
pub struct CancelContext {
    /// Shared state, absent for the background context which never fires
    inner: Option<Arc<ContextState>>,
}
//
impl CancelContext {
    /// Root context which is never cancelled and has no deadline
    pub fn background() -> Self {
        CancelContext { inner: None }
    }

    /// Derive a child context which can be cancelled through a handle
    ///
    /// The child inherits the parent's deadline, if any.
    ///
    pub fn with_cancel(&self) -> (CancelContext, CancelHandle) {
        self.child(self.deadline())
    }

    /// Derive a child context which also fires once `deadline` has passed
    ///
    /// If the parent already has an earlier deadline, the child keeps it.
    ///
    pub fn with_deadline(&self,
                         deadline: Instant) -> (CancelContext, CancelHandle) {
        let deadline = match self.deadline() {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.child(Some(deadline))
    }

    /// Derive a child context which fires after `timeout` has elapsed
    pub fn with_timeout(&self,
                        timeout: Duration) -> (CancelContext, CancelHandle) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Deadline after which this context fires, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.as_ref().and_then(|state| state.deadline)
    }

    /// Terminal error of this context, or None if it has not fired yet
    pub fn err(&self) -> Option<CancelError> {
        self.inner.as_ref()?.observe()
    }

    /// Whether this context has fired
    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    fn child(&self,
             deadline: Option<Instant>) -> (CancelContext, CancelHandle) {
        let state = Arc::new(ContextState {
            terminal: OnceLock::new(),
            deadline,
            parent: self.inner.as_ref().map(|_| self.clone()),
        });
        (CancelContext { inner: Some(state.clone()) },
         CancelHandle { state })
    }
}


/// Owner-side interface of a cancellation context
#[derive(Clone, Debug)]
pub struct CancelHandle {
    /// State shared with the contexts handed out to fetchers
    state: Arc<ContextState>,
}
//
impl CancelHandle {
    /// Fire the associated context
    ///
    /// Cancelling an already fired context has no effect. If the deadline
    /// had passed or the parent had fired before this call, the context
    /// reports that instead.
    ///
    pub fn cancel(&self) {
        if self.state.observe().is_none() {
            self.state.fire(CancelError::Cancelled);
        }
    }
}


/// State shared between a context and its handle
#[derive(Debug)]
struct ContextState {
    /// Terminal error, set at most once
    terminal: OnceLock<CancelError>,

    /// Optional deadline
    deadline: Option<Instant>,

    /// Parent context, whose cancellation propagates to this one
    parent: Option<CancelContext>,
}
//
impl ContextState {
    fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// Terminal error, recording deadline expiry or parent cancellation if
    /// either happened since the last check
    fn observe(&self) -> Option<CancelError> {
        if let Some(err) = self.terminal.get() {
            return Some(*err);
        }
        let observed = if self.deadline_passed() {
            Some(CancelError::DeadlineExceeded)
        } else {
            self.parent.as_ref().and_then(CancelContext::err)
        };
        observed.map(|err| self.fire(err))
    }

    /// Record a terminal error, returning whichever one won
    fn fire(&self, err: CancelError) -> CancelError {
        *self.terminal.get_or_init(|| err)
    }
}
