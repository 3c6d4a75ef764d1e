//! Module signature verification against a configured trust root (spec 4.3).

#![deny(unsafe_code)]

pub mod error;
pub mod trust;
pub mod verifier;

pub use error::{Result, VerifierError};
pub use trust::TrustRoot;
pub use verifier::{Ed25519Verifier, VerificationMode, Verifier, VerifyOutcome};
