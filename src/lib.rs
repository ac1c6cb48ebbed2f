//! One-shot asynchronous computations on dedicated threads
//!
//! Picture yourself in a situation where: you need the result of some slow
//! computation, such as a lookup in a remote service, but you have other
//! things to do meanwhile, so you would rather not wait for it right away.
//! Later on, one or more parts of your program will need that result, and
//! all of them should see the same one, without running the computation
//! twice.
//!
//! This crate provides a `Fetcher` for this purpose. A fetcher binds a
//! function to its argument, runs it on a dedicated thread once started, and
//! lets any number of threads block until the outcome is available. The
//! computation can observe a caller-supplied `CancelContext`, and if the
//! context fires before the function reports an error of its own, the
//! outcome says so.
//!
//! Panics inside the computation do not tear the program down. They are
//! caught, turned into an ordinary failure outcome, logged through `tracing`,
//! and reported to the handlers of a `PanicRegistry`.

pub mod cancel;
pub mod error;
pub mod fetcher;
pub mod panic;
pub mod signal;
pub mod status;

pub use crate::cancel::{CancelContext, CancelHandle};
pub use crate::error::{CancelError, FetchError, Outcome};
pub use crate::fetcher::{Builder, Fetcher};
pub use crate::panic::{set_panic_handlers, PanicHandler, PanicPayload,
                       PanicRegistry};
pub use crate::status::FetchStatus;
