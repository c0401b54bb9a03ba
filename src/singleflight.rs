//! Call Deduplication
//!
//! Collapses concurrent identical loads into one: the first caller for a
//! key becomes the leader and runs the work; callers arriving while it is
//! in flight subscribe to the same record and receive the leader's result,
//! success or error alike. Completion clears the record, so the next call
//! for that key starts fresh work.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;

// == Flight ==
/// Deduplicates in-flight computations by key. `T` is the full outcome of
/// a call (typically a `Result`), cloned out to every waiter.
pub struct Flight<T> {
    calls: Mutex<HashMap<String, broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> Flight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` for `key` unless a call for the same key is already in
    /// flight, in which case the caller waits for that call's outcome
    /// instead. At most one `work` future per key runs at any moment.
    ///
    /// If a leader is cancelled before publishing its outcome, waiting
    /// followers restart the protocol (one of them becomes the new leader).
    pub async fn execute<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut work = Some(work);
        loop {
            let mut follow_rx = None;
            {
                let mut calls = self.calls.lock().unwrap();
                match calls.entry(key.to_string()) {
                    MapEntry::Occupied(in_flight) => {
                        follow_rx = Some(in_flight.get().subscribe());
                    }
                    MapEntry::Vacant(slot) => {
                        let (tx, _) = broadcast::channel(1);
                        slot.insert(tx);
                    }
                }
            }

            match follow_rx {
                Some(mut rx) => match rx.recv().await {
                    Ok(outcome) => return outcome,
                    // Leader vanished without publishing; start over
                    Err(_) => continue,
                },
                None => {
                    // Clears the record even if this future is dropped
                    // mid-flight, so followers can elect a new leader.
                    let mut cleanup = FlightGuard {
                        calls: &self.calls,
                        key,
                        armed: true,
                    };
                    let work = work.take().expect("flight leader elected twice");
                    let outcome = work().await;
                    let tx = self
                        .calls
                        .lock()
                        .unwrap()
                        .remove(key)
                        .expect("in-flight record vanished");
                    cleanup.armed = false;
                    // No waiters is fine; the send result is irrelevant
                    let _ = tx.send(outcome.clone());
                    return outcome;
                }
            }
        }
    }
}

/// Removes a leader's in-flight record when the leader never got to
/// publish its outcome.
struct FlightGuard<'a, T> {
    calls: &'a Mutex<HashMap<String, broadcast::Sender<T>>>,
    key: &'a str,
    armed: bool,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut calls) = self.calls.lock() {
                calls.remove(self.key);
            }
        }
    }
}

impl<T: Clone + Send + 'static> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}
