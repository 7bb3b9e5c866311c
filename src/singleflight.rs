//! In-flight call deduplication
//!
//! Collapses concurrent calls for the same key into one execution. The first
//! caller (the leader) runs the work; callers that arrive while it is running
//! wait for and share its outcome. Nothing is remembered once the call
//! finishes, so a later call runs the work again.
//!
//! # Design
//!
//! - The call map is behind a mutex held only while the map is read or
//!   changed, never while work runs
//! - Each call publishes its outcome on its own `watch` channel, so waiters
//!   on one key never block another key
//! - A leader that is cancelled or dropped abandons the call: its guard
//!   removes the map entry and closes the channel, and the released waiters
//!   race to become the next leader

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Outcome slot of one in-flight call (`None` while running)
type Outcome<T> = Option<Result<T>>;

struct InFlight<T> {
    /// Distinguishes this call from later calls for the same key
    id: u64,
    rx: watch::Receiver<Outcome<T>>,
}

struct Calls<T> {
    next_id: u64,
    in_flight: HashMap<String, InFlight<T>>,
}

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>, u64),
    Waiter(watch::Receiver<Outcome<T>>),
}

/// Deduplicates concurrent executions by key
pub struct SingleFlight<T> {
    calls: Mutex<Calls<T>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync,
{
    /// Create an empty deduplicator
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Calls {
                next_id: 0,
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Run `work` for `key` unless a call for `key` is already in flight,
    /// in which case wait for that call's outcome instead
    pub async fn call<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.call_with_cancel(key, &CancellationToken::new(), work)
            .await
    }

    /// Like [`SingleFlight::call`], but gives up with [`Error::Cancelled`]
    /// once `cancel` fires
    pub async fn call_with_cancel<F, Fut>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (tx, id) = loop {
            match self.join(key) {
                Role::Leader(tx, id) => break (tx, id),
                Role::Waiter(mut rx) => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        outcome = rx.wait_for(Option::is_some) => outcome.map(|o| (*o).clone()),
                    };
                    match outcome {
                        Ok(Some(result)) => return result,
                        // Leader went away without an outcome; try to take over
                        _ => continue,
                    }
                }
            }
        };

        let guard = CallGuard {
            flight: self,
            key,
            id,
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = work() => result,
        };

        // Publish, then forget the call; arrivals in between see the outcome
        tx.send_replace(Some(result.clone()));
        drop(guard);
        result
    }

    /// Register as leader for `key`, or subscribe to the running call
    fn join(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.in_flight.get(key) {
            return Role::Waiter(call.rx.clone());
        }

        let id = calls.next_id;
        calls.next_id += 1;
        let (tx, rx) = watch::channel(None);
        calls.in_flight.insert(key.to_string(), InFlight { id, rx });
        Role::Leader(tx, id)
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().in_flight.len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the leader's map entry when the leader finishes or is dropped
struct CallGuard<'a, T> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    id: u64,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        let mut calls = self.flight.calls.lock();
        if calls
            .in_flight
            .get(self.key)
            .is_some_and(|call| call.id == self.id)
        {
            calls.in_flight.remove(self.key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
