//! Verifier error types. None of these variants carry key material.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("trust root has no signers configured")]
    EmptyTrustRoot,

    #[error("signer cert chain is empty")]
    EmptyCertChain,

    #[error("malformed artifact: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, VerifierError>;
