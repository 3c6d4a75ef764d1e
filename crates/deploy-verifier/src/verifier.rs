//! The `Verifier` contract (spec 4.3): `Verify(module) -> Ok | BadSignature
//! | UntrustedSigner | MalformedArtifact`.

use async_trait::async_trait;
use deploy_types::Module;
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use tracing::warn;

use crate::trust::TrustRoot;

/// Strict mode is the default for Staging/Production; permissive mode is
/// the only sanctioned deviation, available to Dev/QA (spec 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    Strict,
    PermissiveDev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    BadSignature,
    UntrustedSigner,
    MalformedArtifact,
}

impl VerifyOutcome {
    pub fn is_ok(self) -> bool {
        matches!(self, VerifyOutcome::Ok)
    }
}

#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify a module's signature against the configured trust root.
    /// Constant-time with respect to the trust root's key material: every
    /// code path performs the same `ed25519` verification call, and no
    /// error variant carries key bytes.
    async fn verify(&self, module: &Module, mode: VerificationMode) -> VerifyOutcome;
}

pub struct Ed25519Verifier {
    trust_root: TrustRoot,
}

impl Ed25519Verifier {
    pub fn new(trust_root: TrustRoot) -> Self {
        Self { trust_root }
    }
}

#[async_trait]
impl Verifier for Ed25519Verifier {
    async fn verify(&self, module: &Module, mode: VerificationMode) -> VerifyOutcome {
        let Some(leaf_bytes) = module.signer_cert_chain.first() else {
            return VerifyOutcome::MalformedArtifact;
        };
        let Ok(key_bytes) = <[u8; 32]>::try_from(leaf_bytes.as_slice()) else {
            return VerifyOutcome::MalformedArtifact;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return VerifyOutcome::MalformedArtifact;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(module.signature.as_slice()) else {
            return VerifyOutcome::MalformedArtifact;
        };
        let signature = Signature::from_bytes(&sig_bytes);

        let digest = blake3::hash(module.binary_ref.as_bytes());
        let signature_valid = verifying_key.verify(digest.as_bytes(), &signature).is_ok();

        let trusted = self.trust_root.is_trusted(&verifying_key);
        let permissive_self_signed = mode == VerificationMode::PermissiveDev;

        if !signature_valid {
            return VerifyOutcome::BadSignature;
        }
        if !trusted && !permissive_self_signed {
            warn!(module = %module, "signer not present in trust root");
            return VerifyOutcome::UntrustedSigner;
        }
        VerifyOutcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use std::collections::HashMap;

    fn sign_module(signing_key: &SigningKey, binary_ref: &str) -> Module {
        let digest = blake3::hash(binary_ref.as_bytes());
        let signature = signing_key.sign(digest.as_bytes());
        Module {
            name: deploy_types::ModuleName::parse("auth").unwrap(),
            version: semver::Version::parse("1.0.0").unwrap(),
            binary_ref: binary_ref.to_string(),
            signature: signature.to_bytes().to_vec(),
            signer_cert_chain: vec![signing_key.verifying_key().to_bytes().to_vec()],
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn trusted_signer_passes_strict_mode() {
        let key = SigningKey::generate(&mut OsRng);
        let module = sign_module(&key, "blob://auth-1.0.0");
        let verifier = Ed25519Verifier::new(TrustRoot::new([key.verifying_key()]));
        assert_eq!(
            verifier.verify(&module, VerificationMode::Strict).await,
            VerifyOutcome::Ok
        );
    }

    #[tokio::test]
    async fn untrusted_signer_fails_strict_mode() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let module = sign_module(&key, "blob://auth-1.0.0");
        let verifier = Ed25519Verifier::new(TrustRoot::new([other.verifying_key()]));
        assert_eq!(
            verifier.verify(&module, VerificationMode::Strict).await,
            VerifyOutcome::UntrustedSigner
        );
    }

    #[tokio::test]
    async fn untrusted_signer_passes_permissive_dev_mode() {
        let key = SigningKey::generate(&mut OsRng);
        let module = sign_module(&key, "blob://auth-1.0.0");
        let verifier = Ed25519Verifier::new(TrustRoot::new([]));
        assert_eq!(
            verifier.verify(&module, VerificationMode::PermissiveDev).await,
            VerifyOutcome::Ok
        );
    }

    #[tokio::test]
    async fn tampered_artifact_fails_signature_check() {
        let key = SigningKey::generate(&mut OsRng);
        let mut module = sign_module(&key, "blob://auth-1.0.0");
        module.binary_ref = "blob://auth-1.0.1".to_string();
        let verifier = Ed25519Verifier::new(TrustRoot::new([key.verifying_key()]));
        assert_eq!(
            verifier.verify(&module, VerificationMode::Strict).await,
            VerifyOutcome::BadSignature
        );
    }

    #[tokio::test]
    async fn empty_cert_chain_is_malformed() {
        let key = SigningKey::generate(&mut OsRng);
        let mut module = sign_module(&key, "blob://auth-1.0.0");
        module.signer_cert_chain.clear();
        let verifier = Ed25519Verifier::new(TrustRoot::new([key.verifying_key()]));
        assert_eq!(
            verifier.verify(&module, VerificationMode::Strict).await,
            VerifyOutcome::MalformedArtifact
        );
    }
}
