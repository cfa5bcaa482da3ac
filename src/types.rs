use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a relying party requesting vault data (opaque string).
///
/// The requesting service chooses the format; the vault treats it as a
/// lookup key for legal-basis templates and consent records.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable identifier of a shareable data field (e.g. `name`, `email`).
///
/// Valid ids are defined by the [`FieldCatalog`](crate::FieldCatalog);
/// selections referencing ids outside the catalog are rejected.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Into,
)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Vault-account identifier of the data subject (opaque string).
///
/// The consumer chooses the format (ULID, UUID, etc.).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a durable consent record (ULID, time-ordered).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    From, Into,
)]
#[serde(transparent)]
pub struct RecordId(pub Ulid);

impl RecordId {
    /// Generate a fresh record identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}
