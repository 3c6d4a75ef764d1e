//! The configured trust root: the set of signer public keys accepted in
//! strict mode.

use std::collections::HashSet;

use ed25519_dalek::VerifyingKey;
use zeroize::Zeroize;

/// An immutable set of trusted signer public keys.
#[derive(Clone)]
pub struct TrustRoot {
    trusted: HashSet<[u8; 32]>,
}

impl TrustRoot {
    pub fn new(signers: impl IntoIterator<Item = VerifyingKey>) -> Self {
        Self {
            trusted: signers.into_iter().map(|k| k.to_bytes()).collect(),
        }
    }

    pub fn is_trusted(&self, key: &VerifyingKey) -> bool {
        self.trusted.contains(&key.to_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }
}

impl Drop for TrustRoot {
    fn drop(&mut self) {
        for mut key in std::mem::take(&mut self.trusted) {
            key.zeroize();
        }
    }
}
