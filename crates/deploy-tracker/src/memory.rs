//! In-memory `Tracker`: one `DashMap` keyed by execution id, each entry
//! behind its own lock for per-execution serialization.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use deploy_types::{DeploymentRequest, DeploymentResult, ExecutionId, PipelineExecutionState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::entry::TrackedEntry;
use crate::error::{Result, TrackerError};
use crate::filter::{ListFilter, Page, Pagination};
use crate::tracker::Tracker;

pub struct InMemoryTracker {
    entries: DashMap<ExecutionId, Mutex<TrackedEntry>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tracker for InMemoryTracker {
    async fn start(
        &self,
        execution_id: ExecutionId,
        request: DeploymentRequest,
    ) -> Result<PipelineExecutionState> {
        if self.entries.contains_key(&execution_id) {
            return Err(TrackerError::Conflict(execution_id));
        }
        let state = PipelineExecutionState::new(execution_id, request);
        self.entries
            .insert(execution_id, Mutex::new(TrackedEntry::InProgress(state.clone())));
        Ok(state)
    }

    async fn update(&self, state: PipelineExecutionState) -> Result<()> {
        let entry_lock = self
            .entries
            .get(&state.execution_id)
            .ok_or(TrackerError::NotFound(state.execution_id))?;
        let mut entry = entry_lock.lock().await;

        let TrackedEntry::InProgress(current) = &*entry else {
            return Err(TrackerError::NonMonotonic(state.execution_id));
        };
        if state.last_updated_at < current.last_updated_at {
            return Err(TrackerError::NonMonotonic(state.execution_id));
        }
        if state.status != current.status && !current.status.can_transition_to(state.status) {
            return Err(TrackerError::NonMonotonic(state.execution_id));
        }

        debug!(execution_id = %state.execution_id, status = %state.status, "tracker: state updated");
        *entry = TrackedEntry::InProgress(state);
        Ok(())
    }

    async fn complete(&self, execution_id: &ExecutionId, result: DeploymentResult) -> Result<()> {
        let entry_lock = self
            .entries
            .get(execution_id)
            .ok_or(TrackerError::NotFound(*execution_id))?;
        let mut entry = entry_lock.lock().await;
        if entry.is_terminal() {
            return Err(TrackerError::NonMonotonic(*execution_id));
        }
        *entry = TrackedEntry::Terminal(result);
        Ok(())
    }

    async fn get(&self, execution_id: &ExecutionId) -> Result<PipelineExecutionState> {
        let entry_lock = self
            .entries
            .get(execution_id)
            .ok_or(TrackerError::NotFound(*execution_id))?;
        let entry = entry_lock.lock().await;
        Ok(entry.state().clone())
    }

    async fn list_in_progress(&self) -> Result<Vec<PipelineExecutionState>> {
        let mut out = Vec::new();
        for entry in self.entries.iter() {
            let guard = entry.value().lock().await;
            if let TrackedEntry::InProgress(state) = &*guard {
                out.push(state.clone());
            }
        }
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.execution_id.cmp(&b.execution_id)));
        Ok(out)
    }

    async fn list_all(&self, filter: ListFilter, pagination: Pagination) -> Result<Page<TrackedEntry>> {
        let mut all = Vec::new();
        for entry in self.entries.iter() {
            let guard = entry.value().lock().await;
            all.push(guard.clone());
        }

        all.retain(|e| {
            let state = e.state();
            if let Some(env) = filter.environment {
                if state.request.target_environment != env {
                    return false;
                }
            }
            if let Some(ref name) = filter.module_name {
                if &state.request.module.name != name {
                    return false;
                }
            }
            if let Some(status) = filter.status {
                if state.status != status {
                    return false;
                }
            }
            if let Some(since) = filter.since {
                if state.started_at < since {
                    return false;
                }
            }
            true
        });

        all.sort_by(|a, b| {
            b.started_at()
                .cmp(&a.started_at())
                .then(a.execution_id().cmp(&b.execution_id()))
        });

        let total = all.len();
        let items: Vec<TrackedEntry> = all
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect();
        Ok(Page { items, total })
    }

    async fn sweep_expired(&self, retention: chrono::Duration) -> Result<usize> {
        let now = Utc::now();
        let mut evicted = 0;
        let mut stale = Vec::new();
        for entry in self.entries.iter() {
            let guard = entry.value().lock().await;
            if let TrackedEntry::Terminal(result) = &*guard {
                if now - result.state.last_updated_at > retention {
                    stale.push(*entry.key());
                }
            }
        }
        for id in stale {
            self.entries.remove(&id);
            evicted += 1;
            warn!(execution_id = %id, "tracker: evicted terminal entry past retention");
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_types::{Environment, Module, ModuleName, PipelineStatus};
    use std::collections::HashMap;

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            module: Module {
                name: ModuleName::parse("auth").unwrap(),
                version: semver::Version::parse("1.0.0").unwrap(),
                binary_ref: "x".into(),
                signature: vec![],
                signer_cert_chain: vec![],
                metadata: HashMap::new(),
            },
            target_environment: Environment::Development,
            strategy: None,
            requester_id: "alice".into(),
            requested_at: Utc::now(),
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn start_twice_is_conflict() {
        let tracker = InMemoryTracker::new();
        let id = ExecutionId::generate();
        tracker.start(id, request()).await.unwrap();
        let err = tracker.start(id, request()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_rejects_illegal_transition() {
        let tracker = InMemoryTracker::new();
        let id = ExecutionId::generate();
        let mut state = tracker.start(id, request()).await.unwrap();
        state.transition(PipelineStatus::Succeeded).unwrap_err();
        // Force an illegal transition bypassing the type-level guard to
        // prove the tracker also rejects it.
        state.status = PipelineStatus::Succeeded;
        let err = tracker.update(state).await.unwrap_err();
        assert!(matches!(err, TrackerError::NonMonotonic(_)));
    }

    #[tokio::test]
    async fn update_accepts_legal_transition() {
        let tracker = InMemoryTracker::new();
        let id = ExecutionId::generate();
        let mut state = tracker.start(id, request()).await.unwrap();
        state.transition(PipelineStatus::Running).unwrap();
        tracker.update(state).await.unwrap();
        let got = tracker.get(&id).await.unwrap();
        assert_eq!(got.status, PipelineStatus::Running);
    }

    #[tokio::test]
    async fn complete_then_update_is_rejected() {
        let tracker = InMemoryTracker::new();
        let id = ExecutionId::generate();
        let mut state = tracker.start(id, request()).await.unwrap();
        state.transition(PipelineStatus::Running).unwrap();
        state.transition(PipelineStatus::Succeeded).unwrap();
        let result = DeploymentResult {
            state: state.clone(),
            nodes_updated: 1,
            nodes_rolled_back: 0,
            duration_ms: 10,
        };
        tracker.complete(&id, result).await.unwrap();
        assert!(tracker.update(state).await.is_err());
    }

    #[tokio::test]
    async fn list_in_progress_excludes_terminal() {
        let tracker = InMemoryTracker::new();
        let id1 = ExecutionId::generate();
        let id2 = ExecutionId::generate();
        let mut s1 = tracker.start(id1, request()).await.unwrap();
        tracker.start(id2, request()).await.unwrap();
        s1.transition(PipelineStatus::Running).unwrap();
        s1.transition(PipelineStatus::Succeeded).unwrap();
        let result = DeploymentResult {
            state: s1.clone(),
            nodes_updated: 1,
            nodes_rolled_back: 0,
            duration_ms: 10,
        };
        tracker.complete(&id1, result).await.unwrap();

        let in_progress = tracker.list_in_progress().await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].execution_id, id2);
    }

    #[tokio::test]
    async fn sweep_never_evicts_in_progress() {
        let tracker = InMemoryTracker::new();
        let id = ExecutionId::generate();
        tracker.start(id, request()).await.unwrap();
        let evicted = tracker.sweep_expired(chrono::Duration::seconds(0)).await.unwrap();
        assert_eq!(evicted, 0);
        assert!(tracker.get(&id).await.is_ok());
    }
}
