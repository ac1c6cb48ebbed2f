//! One-shot completion signal
//!
//! This module provides the synchronization primitive used by fetchers to
//! tell their observers that an outcome is available. It is written exactly
//! once by a single thread, and read by any number of threads which block
//! until it has been written.
//!
//! Blocking waits go through a mutex and a condition variable, but once the
//! value is published, reading it only takes an atomic load.

use parking_lot::{Condvar, Mutex};
use std::sync::OnceLock;


/// Broadcast-capable, fire-once signal carrying a value
#[derive(Debug)]
pub struct CompletionSignal<V> {
    /// Published value, written exactly once
    value: OnceLock<V>,

    /// Mutex associated with the wakeup condition variable
    wakeup_lock: Mutex<()>,

    /// Condition variable used to wake up blocked observers
    fired_cv: Condvar,
}
//
impl<V> CompletionSignal<V> {
    /// Create a signal which has not fired yet
    pub fn new() -> Self {
        CompletionSignal {
            value: OnceLock::new(),
            wakeup_lock: Mutex::new(()),
            fired_cv: Condvar::new(),
        }
    }

    /// Publish the value and wake up every observer
    ///
    /// Returns false, dropping `value`, if the signal had already fired.
    ///
    pub fn fire(&self, value: V) -> bool {
        if self.value.set(value).is_err() {
            return false;
        }

        // Observers check for the value while holding the lock, so taking it
        // here guarantees that no one is between its check and its wait.
        let _lock = self.wakeup_lock.lock();
        self.fired_cv.notify_all();
        true
    }

    /// Access the value if the signal has fired, without blocking
    pub fn try_get(&self) -> Option<&V> {
        self.value.get()
    }

    /// Whether the signal has fired
    pub fn is_fired(&self) -> bool {
        self.value.get().is_some()
    }

    /// Block until the signal has fired, then access the value
    pub fn wait(&self) -> &V {
        // Fast path, taken by every call after the signal has fired
        if let Some(value) = self.value.get() {
            return value;
        }

        let mut lock = self.wakeup_lock.lock();
        loop {
            if let Some(value) = self.value.get() {
                return value;
            }
            self.fired_cv.wait(&mut lock);
        }
    }
}
//
impl<V> Default for CompletionSignal<V> {
    fn default() -> Self {
        Self::new()
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    /// Check the initial state of the signal
    #[test]
    fn initial_state() {
        let signal = CompletionSignal::<u32>::new();
        assert!(!signal.is_fired());
        assert_eq!(signal.try_get(), None);
    }

    /// Only the first value makes it through
    #[test]
    fn fire_once() {
        let signal = CompletionSignal::new();
        assert!(signal.fire(1));
        assert!(!signal.fire(2));
        assert!(signal.is_fired());
        assert_eq!(signal.try_get(), Some(&1));
        assert_eq!(*signal.wait(), 1);
    }

    /// Every blocked observer gets woken up with the same value
    #[test]
    fn broadcast() {
        const OBSERVERS: usize = 8;
        let signal = Arc::new(CompletionSignal::<String>::new());
        let barrier = Arc::new(Barrier::new(OBSERVERS + 1));

        let observers = (0..OBSERVERS).map(|_| {
            let signal = signal.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                signal.wait().clone()
            })
        }).collect::<Vec<_>>();

        // Give the observers some time to actually block
        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        assert!(signal.fire(String::from("done")));

        for observer in observers {
            assert_eq!(observer.join().unwrap(), "done");
        }
    }
}
