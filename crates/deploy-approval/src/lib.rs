//! The human-in-the-loop approval gate (spec 4.6): holds staging/production
//! deployments until an approver distinct from the requester resolves them,
//! or `approvalTimeout` elapses and the gate auto-rejects.

#![deny(unsafe_code)]

mod error;
mod gate;
mod memory;
mod request;

pub use error::{ApprovalError, Result};
pub use gate::ApprovalGate;
pub use memory::InMemoryApprovalGate;
pub use request::{ApprovalOutcome, ApprovalRequest};
