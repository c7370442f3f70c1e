//! Entity keys.
//!
//! Entities use one opaque key token whatever the underlying storage type,
//! tagged with a [`KeyKind`] that drives generation and column typing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Storage kind of an entity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Int,
    Text,
    Uuid,
}

impl KeyKind {
    /// The default (transient) key of this kind
    pub fn default_key(self) -> EntityKey {
        match self {
            KeyKind::Int => EntityKey::Int(0),
            KeyKind::Text => EntityKey::Text(String::new()),
            KeyKind::Uuid => EntityKey::Uuid(Uuid::nil()),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Int => write!(f, "int"),
            KeyKind::Text => write!(f, "text"),
            KeyKind::Uuid => write!(f, "uuid"),
        }
    }
}

impl std::str::FromStr for KeyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" => Ok(KeyKind::Int),
            "text" | "string" => Ok(KeyKind::Text),
            "uuid" | "guid" => Ok(KeyKind::Uuid),
            other => Err(DomainError::invalid_key(format!("unknown key kind `{}`", other))),
        }
    }
}

/// Surrogate key of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i32),
    Text(String),
    Uuid(Uuid),
}

impl EntityKey {
    /// Kind tag of this key
    pub fn kind(&self) -> KeyKind {
        match self {
            EntityKey::Int(_) => KeyKind::Int,
            EntityKey::Text(_) => KeyKind::Text,
            EntityKey::Uuid(_) => KeyKind::Uuid,
        }
    }

    /// True when the key still holds the default value of its kind.
    pub fn is_default(&self) -> bool {
        match self {
            EntityKey::Int(v) => *v == 0,
            EntityKey::Text(v) => v.is_empty(),
            EntityKey::Uuid(v) => v.is_nil(),
        }
    }

    /// Generate a client-side key of the given kind.
    ///
    /// `Int` keys are assigned by the database, so the default key is returned.
    pub fn generate(kind: KeyKind) -> EntityKey {
        match kind {
            KeyKind::Int => EntityKey::Int(0),
            KeyKind::Text => EntityKey::Text(Uuid::new_v4().to_string()),
            KeyKind::Uuid => EntityKey::Uuid(new_comb_uuid()),
        }
    }

    /// Fails unless this key is of `kind`.
    pub fn expect_kind(&self, kind: KeyKind) -> DomainResult<()> {
        if self.kind() != kind {
            return Err(DomainError::invalid_key(format!(
                "expected a {} key, got {}",
                kind, self
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKey::Int(v) => write!(f, "{}", v),
            EntityKey::Text(v) => write!(f, "{}", v),
            EntityKey::Uuid(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for EntityKey {
    fn from(v: i32) -> Self {
        EntityKey::Int(v)
    }
}

impl From<String> for EntityKey {
    fn from(v: String) -> Self {
        EntityKey::Text(v)
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        EntityKey::Text(v.to_string())
    }
}

impl From<Uuid> for EntityKey {
    fn from(v: Uuid) -> Self {
        EntityKey::Uuid(v)
    }
}

/// Sequential "comb" UUID: random high bytes, the last six bytes carry the
/// current time in milliseconds so consecutive keys cluster in an index.
pub fn new_comb_uuid() -> Uuid {
    let mut bytes = Uuid::new_v4().into_bytes();
    let millis = Utc::now().timestamp_millis().to_be_bytes();
    bytes[10..16].copy_from_slice(&millis[2..8]);
    Uuid::from_bytes(bytes)
}

/// Parse a textual user id as a UUID, returning the nil UUID when it is not one.
pub fn parse_uuid_or_nil(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap_or_else(|_| Uuid::nil())
}
