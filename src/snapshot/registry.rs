use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

type Running<T> = HashMap<String, watch::Receiver<Option<T>>>;

/// Deduplicates concurrent work keyed by id.
///
/// The first caller for an id runs the job; callers arriving while it runs
/// wait for and receive a clone of its result.
pub struct InFlight<T: Clone> {
    running: Mutex<Running<T>>,
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
        }
    }
}

/// Removes the registry entry when the running job finishes or is dropped.
struct EntryGuard<'a, T: Clone> {
    registry: &'a InFlight<T>,
    key: &'a str,
}

impl<T: Clone> Drop for EntryGuard<'_, T> {
    fn drop(&mut self) {
        self.registry.lock().remove(self.key);
    }
}

impl<T: Clone> InFlight<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Running<T>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `job` for `key` unless it is already running, in which case wait for it.
    ///
    /// Returns `None` only if the running job was dropped without producing
    /// a result.
    pub async fn run_or_join<F>(&self, key: &str, job: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let tx = {
            let mut running = self.lock();
            match running.get(key) {
                Some(rx) => Err(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    running.insert(key.to_string(), rx);
                    Ok(tx)
                }
            }
        };

        let tx = match tx {
            Ok(tx) => tx,
            Err(mut rx) => {
                debug!(key, "Joining in-flight job");
                let value = rx.wait_for(Option::is_some).await.ok()?;
                return value.clone();
            }
        };

        let guard = EntryGuard {
            registry: self,
            key,
        };

        let result = job.await;

        drop(guard);
        // Waiters hold their own receivers, so a send error only means nobody joined
        let _ = tx.send(Some(result.clone()));
        Some(result)
    }

    /// Whether a job for `key` is currently running.
    #[must_use]
    pub fn is_running(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}
