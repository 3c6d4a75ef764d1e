//! A mutex per `(environment, module)` pair (spec 4.8, 5): two submissions
//! targeting the same key never run their pipelines concurrently. A
//! submission that cannot acquire the key within `queueWait` fails
//! `AlreadyInProgress` rather than queueing indefinitely.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use deploy_types::Environment;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{OrchestratorError, Result};

type Key = (Environment, String);

#[derive(Default)]
pub struct KeyedLock {
    entries: DashMap<Key, Arc<Mutex<()>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the mutex for `key`, waiting at most `queue_wait`.
    pub async fn acquire(&self, key: Key, queue_wait: Duration) -> Result<OwnedMutexGuard<()>> {
        let mutex = self.entries.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        tokio::time::timeout(queue_wait, mutex.lock_owned())
            .await
            .map_err(|_| OrchestratorError::AlreadyInProgress)
    }
}
