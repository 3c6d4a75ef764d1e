//! The deployable artifact and the environments it can target.

use std::collections::HashMap;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Target environment for a deployment. Ordering reflects increasing
/// operational strictness and is relied on by the default strategy mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Development,
    QA,
    Staging,
    Production,
}

impl Environment {
    /// Whether this environment requires the pipeline to suspend at the
    /// approval gate stage (staging/production, per spec 4.2).
    pub fn requires_approval(self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }

    /// Default minimum healthy fraction for this environment (spec 4.1).
    pub fn default_min_healthy_fraction(self) -> f64 {
        match self {
            Environment::Development | Environment::QA => 0.5,
            Environment::Staging => 0.66,
            Environment::Production => 0.75,
        }
    }

    /// Whether permissive (non-strict) signature verification is allowed
    /// for this environment when explicitly requested (spec 4.3).
    pub fn allows_permissive_signatures(self) -> bool {
        matches!(self, Environment::Development | Environment::QA)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::QA => "qa",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        write!(f, "{s}")
    }
}

/// A module name: `1..128` characters matching `^[A-Za-z0-9._-]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleName(String);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ModuleNameError {
    #[error("module name must be 1..128 characters, got {0}")]
    BadLength(usize),
    #[error("module name must match ^[A-Za-z0-9._-]+$: {0:?}")]
    BadCharacters(String),
}

impl ModuleName {
    pub fn parse(name: impl Into<String>) -> Result<Self, ModuleNameError> {
        let name = name.into();
        if name.is_empty() || name.len() > 128 {
            return Err(ModuleNameError::BadLength(name.len()));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err(ModuleNameError::BadCharacters(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, signed deployment artifact. Two modules are equal iff
/// `(name, version)` match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: ModuleName,
    #[serde(with = "semver_serde")]
    pub version: Version,
    pub binary_ref: String,
    pub signature: Vec<u8>,
    pub signer_cert_chain: Vec<Vec<u8>>,
    pub metadata: HashMap<String, String>,
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}
impl Eq for Module {}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

mod semver_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Version, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Version, D::Error> {
        let raw = String::deserialize(d)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
