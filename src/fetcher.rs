//! One-shot asynchronous computations running on dedicated threads
//!
//! A `Fetcher` binds a function to its argument. Nothing happens until it is
//! started, at which point the function is run on a freshly spawned thread.
//! Any number of threads can then block until the outcome is available, and
//! all of them get to see the same outcome.
//!
//! ```
//! use threaded_fetcher::{CancelContext, Fetcher};
//!
//! fn fetch_user(_ctx: &CancelContext, id: u32) -> Result<String, String> {
//!     Ok(format!("user-{}", id))
//! }
//!
//! let fetcher = Fetcher::new(fetch_user, 42);
//! fetcher.start(&CancelContext::background());
//! assert_eq!(fetcher.wait().as_deref(), Ok("user-42"));
//! ```

use crate::cancel::CancelContext;
use crate::error::{FetchError, Outcome};
use crate::panic::{PanicPayload, PanicRegistry};
use crate::signal::CompletionSignal;
use crate::status::FetchStatus;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, warn};


/// Function wrapped by a fetcher
type BoxedFn<T, A, E> =
    Box<dyn FnOnce(&CancelContext, A) -> Result<T, E> + Send>;


/// Handle to a one-shot computation
///
/// Cloning the handle is cheap, and all clones refer to the same computation,
/// so they can be handed out to every thread that needs the outcome.
///
pub struct Fetcher<T, A, E> {
    /// Reference-counted shared state
    shared: Arc<SharedState<T, A, E>>,
}
//
impl<T, A, E> Fetcher<T, A, E>
    where T: Send + Sync + 'static,
          A: Send + 'static,
          E: Send + Sync + 'static
{
    /// Bind a function to its argument, without running anything yet
    ///
    /// The fetcher runs on a thread with default settings and reports panics
    /// to the process-wide `PanicRegistry`.
    ///
    pub fn new<F>(func: F, arg: A) -> Self
        where F: FnOnce(&CancelContext, A) -> Result<T, E> + Send + 'static
    {
        Builder::new().build(func, arg)
    }

    /// Start the computation on a new thread
    ///
    /// Only the first call has an effect, later calls return right away.
    /// Failures of the computation are reported through the outcome, never
    /// by this method. Returns the fetcher itself, for chaining.
    ///
    pub fn start(&self, ctx: &CancelContext) -> &Self {
        let job = {
            let mut job_slot = self.shared.job.lock();
            match job_slot.take() {
                Some(job) => {
                    self.shared.started.store(true, Ordering::Release);
                    job
                }
                None => return self,
            }
        };

        let config = &self.shared.config;
        let mut thread_builder = thread::Builder::new()
                                     .name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            thread_builder = thread_builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        let ctx = ctx.clone();
        match thread_builder.spawn(move || run(&shared, job, ctx)) {
            Ok(_) => debug!(thread = %config.name,
                            "spawned fetcher computation thread"),
            Err(e) => {
                warn!(thread = %config.name, error = %e,
                      "failed to spawn fetcher computation thread");
                self.shared.signal.fire(Err(FetchError::Spawn(e.to_string())));
            }
        }
        self
    }
}
//
impl<T, A, E> Fetcher<T, A, E> {
    /// Block until the computation is complete, then access its outcome
    ///
    /// Can be called any number of times, from any number of threads. Once
    /// the outcome is available, this does not block nor lock anymore.
    ///
    /// # Panics
    ///
    /// Calling this before `start` is a usage error and panics.
    ///
    pub fn wait(&self) -> &Outcome<T, E> {
        if !self.shared.started.load(Ordering::Acquire) {
            panic!("fetcher not started, call start() first");
        }
        self.shared.signal.wait()
    }

    /// Access the outcome if the computation is complete, without blocking
    ///
    /// Unlike `wait`, this is fine to call before `start`.
    ///
    pub fn try_wait(&self) -> Option<&Outcome<T, E>> {
        self.shared.signal.try_get()
    }

    /// Block until the computation is complete, then copy its outcome
    ///
    /// # Panics
    ///
    /// Calling this before `start` is a usage error and panics.
    ///
    pub fn wait_cloned(&self) -> Outcome<T, E>
        where T: Clone,
              E: Clone
    {
        self.wait().clone()
    }

    /// Current lifecycle status of the computation
    pub fn status(&self) -> FetchStatus {
        if self.shared.signal.is_fired() {
            FetchStatus::Completed
        } else if self.shared.started.load(Ordering::Acquire) {
            FetchStatus::Started
        } else {
            FetchStatus::Created
        }
    }
}
//
impl<T, A, E> Clone for Fetcher<T, A, E> {
    fn clone(&self) -> Self {
        Fetcher { shared: self.shared.clone() }
    }
}


/// Fetcher factory, used to configure the computation thread and the
/// registry which panics are reported to
#[derive(Clone, Debug)]
pub struct Builder {
    /// Computation thread configuration
    config: ThreadConfig,

    /// Registry notified of recovered panics
    registry: PanicRegistry,
}
//
impl Builder {
    /// Start from the default settings
    pub fn new() -> Self {
        Builder {
            config: ThreadConfig {
                name: String::from("fetcher"),
                stack_size: None,
            },
            registry: PanicRegistry::global().clone(),
        }
    }

    /// Name of the computation thread
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Stack size of the computation thread, in bytes
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.config.stack_size = Some(stack_size);
        self
    }

    /// Report panics to `registry` instead of the process-wide registry
    pub fn registry(mut self, registry: PanicRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Bind a function to its argument, without running anything yet
    pub fn build<T, A, E, F>(self, func: F, arg: A) -> Fetcher<T, A, E>
        where F: FnOnce(&CancelContext, A) -> Result<T, E> + Send + 'static
    {
        Fetcher {
            shared: Arc::new(SharedState {
                job: Mutex::new(Some(Job { func: Box::new(func), arg })),
                started: AtomicBool::new(false),
                signal: CompletionSignal::new(),
                registry: self.registry,
                config: self.config,
            }),
        }
    }
}
//
impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}


/// Settings of the computation thread
#[derive(Clone, Debug)]
struct ThreadConfig {
    /// Thread name
    name: String,

    /// Thread stack size, or None for the platform default
    stack_size: Option<usize>,
}


/// Function and argument, waiting to be run
struct Job<T, A, E> {
    func: BoxedFn<T, A, E>,
    arg: A,
}


/// State shared between the fetcher handles and the computation thread
struct SharedState<T, A, E> {
    /// Bound job, taken out by the first call to start()
    job: Mutex<Option<Job<T, A, E>>>,

    /// Whether start() has been called
    started: AtomicBool,

    /// Completion signal, carrying the outcome
    signal: CompletionSignal<Outcome<T, E>>,

    /// Registry notified of recovered panics
    registry: PanicRegistry,

    /// Computation thread configuration
    config: ThreadConfig,
}


/// Raises the completion signal when the computation thread exits, no matter
/// how it exits
struct CompletionGuard<'a, T, E> {
    /// Signal to be raised
    signal: &'a CompletionSignal<Outcome<T, E>>,

    /// Outcome to be published
    outcome: Option<Outcome<T, E>>,
}
//
impl<'a, T, E> CompletionGuard<'a, T, E> {
    fn new(signal: &'a CompletionSignal<Outcome<T, E>>) -> Self {
        CompletionGuard { signal, outcome: None }
    }

    fn store(&mut self, outcome: Outcome<T, E>) {
        self.outcome = Some(outcome);
    }
}
//
impl<'a, T, E> Drop for CompletionGuard<'a, T, E> {
    /// Waiters must be released even if no outcome was stored, which `run`
    /// does not let happen today
    fn drop(&mut self) {
        let outcome = self.outcome.take()
                                  .unwrap_or(Err(FetchError::Terminated));
        self.signal.fire(outcome);
    }
}


/// Body of the computation thread
fn run<T, A, E>(shared: &SharedState<T, A, E>,
                job: Job<T, A, E>,
                ctx: CancelContext) {
    let mut guard = CompletionGuard::new(&shared.signal);
    let Job { func, arg } = job;
    match panic::catch_unwind(AssertUnwindSafe(|| execute(func, arg, &ctx))) {
        Ok(outcome) => guard.store(outcome),
        Err(payload) => {
            guard.store(Err(FetchError::Panicked(
                PanicPayload::from_any(&*payload)
            )));
            shared.registry.dispatch(&ctx, &*payload);
        }
    }
}


/// Run the wrapped function, unless the context has already fired
fn execute<T, A, E>(func: BoxedFn<T, A, E>,
                    arg: A,
                    ctx: &CancelContext) -> Outcome<T, E> {
    if let Some(err) = ctx.err() {
        return Err(FetchError::Cancelled(err));
    }
    merge_cancellation(func(ctx, arg), ctx)
}


/// Combine the function's result with the state of its context
///
/// Cancellation takes precedence over a successful result, since a function
/// that ignores its context may return a value computed from partial work.
/// Errors reported by the function itself are always kept.
///
fn merge_cancellation<T, E>(result: Result<T, E>,
                            ctx: &CancelContext) -> Outcome<T, E> {
    match result {
        Ok(value) => match ctx.err() {
            Some(err) => Err(FetchError::Cancelled(err)),
            None => Ok(value),
        },
        Err(e) => Err(FetchError::Failed(e)),
    }
}
