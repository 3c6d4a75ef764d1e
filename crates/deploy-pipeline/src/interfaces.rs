//! Host-implemented outbound interfaces (spec 6): `Notifier`, `AuditSink`
//! and `Clock`. Delivery failures on these never alter the pipeline
//! outcome — they are logged and swallowed, fire-and-forget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deploy_types::{AuditRecord, DeployEvent};

/// Receives pipeline lifecycle events. MUST NOT block the pipeline;
/// implementations that need to do slow I/O should buffer internally.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: DeployEvent);
}

/// A `Notifier` that drops every event.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: DeployEvent) {}
}

/// Append-only audit trail. Approval decisions are recorded synchronously
/// before the pipeline resumes; everything else may be written off the
/// hot path (spec 6).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// An `AuditSink` that drops every record. Useful where the host has not
/// wired one in, or in tests.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _record: AuditRecord) {}
}

/// Monotonic time source, injected so tests can control pipeline timing
/// deterministically (spec 6).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) async fn audit(sink: &dyn AuditSink, event: &str, actor: &str, payload: serde_json::Value) {
    sink.record(AuditRecord::new(event, actor, payload)).await;
}
