//! User claim entity and value object.

use serde::{Deserialize, Serialize};

use crate::entity::Identity;
use crate::key::{EntityKey, KeyKind};

/// Type lineage of [`IdentityUserClaim`]
pub const CLAIM_LINEAGE: &[&str] = &["IdentityUserClaim"];

/// Claim type/value pair as exchanged with callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// A claim owned by a user. The integer key is assigned by the database.
#[derive(Debug, Clone)]
pub struct IdentityUserClaim {
    identity: Identity,
    pub claim_type: String,
    pub claim_value: String,
    pub user_id: EntityKey,
}

impl IdentityUserClaim {
    /// New transient claim for a user
    pub fn new(user_id: EntityKey, claim: &Claim) -> Self {
        Self {
            identity: Identity::transient(KeyKind::Int, CLAIM_LINEAGE),
            claim_type: claim.claim_type.clone(),
            claim_value: claim.value.clone(),
            user_id,
        }
    }

    /// Claim loaded with its persisted key
    pub fn with_key(key: EntityKey, user_id: EntityKey, claim: &Claim) -> Self {
        let mut loaded = Self::new(user_id, claim);
        loaded.identity.set_key(key);
        loaded
    }

    pub fn claim(&self) -> Claim {
        Claim::new(self.claim_type.clone(), self.claim_value.clone())
    }

    /// True if type and value both match
    pub fn matches(&self, claim: &Claim) -> bool {
        self.claim_type == claim.claim_type && self.claim_value == claim.value
    }
}

crate::impl_entity!(IdentityUserClaim);
