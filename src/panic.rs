//! Recovery and reporting of panicking computations
//!
//! When the function wrapped by a fetcher panics, the panic is caught on the
//! computation thread and turned into an ordinary failure outcome. Since such
//! panics are unexpected, they are also reported: a diagnostic is emitted
//! through `tracing`, and every handler of a `PanicRegistry` is notified.
//!
//! Registries are shared objects which can be handed to whichever component
//! builds fetchers. For the common "configure once at startup" use case, a
//! process-wide registry is also provided, and is what fetchers use unless
//! told otherwise.

use crate::cancel::CancelContext;
use parking_lot::RwLock;
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::error;


/// Callback notified of recovered panics, with the computation's context and
/// the original panic payload
pub type PanicHandler =
    Arc<dyn Fn(&CancelContext, &(dyn Any + Send)) + Send + Sync>;


/// Wrap a closure into a `PanicHandler`
pub fn handler<F>(f: F) -> PanicHandler
    where F: Fn(&CancelContext, &(dyn Any + Send)) + Send + Sync + 'static
{
    Arc::new(f)
}


/// Replace the handlers of the process-wide registry
///
/// This should typically be called once, during service initialization.
///
pub fn set_panic_handlers<I>(handlers: I)
    where I: IntoIterator<Item = PanicHandler>
{
    PanicRegistry::global().set_handlers(handlers)
}


/// Ordered list of panic handlers, shared by every clone of the registry
#[derive(Clone, Default)]
pub struct PanicRegistry {
    /// Current handler list. Dispatch only holds the lock for long enough to
    /// grab the list, so that handlers run against a stable snapshot.
    handlers: Arc<RwLock<Arc<[PanicHandler]>>>,
}
//
impl PanicRegistry {
    /// Create an empty registry, independent from the process-wide one
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, empty at startup
    pub fn global() -> &'static PanicRegistry {
        static GLOBAL: OnceLock<PanicRegistry> = OnceLock::new();
        GLOBAL.get_or_init(PanicRegistry::new)
    }

    /// Replace the whole handler list, last writer wins
    ///
    /// Dispatches which are already running keep using the previous list.
    ///
    pub fn set_handlers<I>(&self, handlers: I)
        where I: IntoIterator<Item = PanicHandler>
    {
        let handlers = handlers.into_iter().collect::<Arc<[_]>>();
        *self.handlers.write() = handlers;
    }

    /// Snapshot of the current handler list
    pub fn handlers(&self) -> Arc<[PanicHandler]> {
        self.handlers.read().clone()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report a recovered panic
    ///
    /// Emits an error event carrying the payload and a backtrace, then calls
    /// every registered handler in registration order.
    ///
    /// The backtrace is captured here, on the thread calling `dispatch`. For
    /// fetchers this happens after the panic has been unwound, so the trace
    /// shows the recovery path of the computation thread, not the frames
    /// which panicked. The default panic hook still prints the panic
    /// location to stderr.
    ///
    /// Handlers are not protected against panics of their own. A panicking
    /// handler unwinds the thread that called `dispatch` and prevents the
    /// remaining handlers from running. Fetchers still deliver their outcome
    /// in that case, but the handler's panic is left for the embedding
    /// application to deal with.
    ///
    pub fn dispatch(&self, ctx: &CancelContext, payload: &(dyn Any + Send)) {
        let message = PanicPayload::from_any(payload);
        let backtrace = Backtrace::force_capture();
        error!(payload = %message, backtrace = %backtrace,
               "panic recovered in fetcher computation");

        let handlers = self.handlers();
        for handler in handlers.iter() {
            handler(ctx, payload);
        }
    }
}
//
impl fmt::Debug for PanicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicRegistry")
         .field("handlers", &self.len())
         .finish()
    }
}


/// Printable form of a panic payload
///
/// Raw payloads cannot be shared between threads, so the outcome of a
/// fetcher only keeps their message.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PanicPayload {
    message: String,
}
//
impl PanicPayload {
    /// Build a payload from a message
    pub fn new(message: impl Into<String>) -> Self {
        PanicPayload { message: message.into() }
    }

    /// Extract the message of a raw panic payload
    ///
    /// `panic!` produces either a `&'static str` or a `String` payload.
    /// Anything else was passed to `panic_any` and cannot be printed.
    ///
    pub fn from_any(payload: &(dyn Any + Send)) -> Self {
        let message = payload.downcast_ref::<&str>()
                             .map(|s| (*s).to_owned())
                             .or_else(|| payload.downcast_ref::<String>()
                                                .cloned())
                             .unwrap_or_else(|| {
                                 String::from("unknown panic payload")
                             });
        PanicPayload { message }
    }

    /// Panic message
    pub fn message(&self) -> &str {
        &self.message
    }
}
//
impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
