//! Role entity.

use crate::entity::Identity;
use crate::key::{EntityKey, KeyKind};

/// Type lineage of [`IdentityRole`]
pub const ROLE_LINEAGE: &[&str] = &["IdentityRole"];

/// A named role. The users holding it are only reachable through the store.
#[derive(Debug, Clone)]
pub struct IdentityRole {
    identity: Identity,
    pub name: String,
}

impl IdentityRole {
    /// New role with a freshly generated text key
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_key(EntityKey::generate(KeyKind::Text), name)
    }

    pub fn with_key(key: EntityKey, name: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(key, ROLE_LINEAGE),
            name: name.into(),
        }
    }
}

crate::impl_entity!(IdentityRole);
