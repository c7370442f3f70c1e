//! Entity identity and equality.
//!
//! Every persistent entity embeds an [`Identity`]. Two entities are equal when:
//! - they are the same instance, or
//! - one entity's type lineage is a prefix of the other's (same hierarchy),
//!   neither is transient, and their keys are equal.
//!
//! Two distinct transient instances are never equal.
//!
//! The hash is computed on first use and cached for the life of the instance:
//! transient instances hash their instance token, persisted ones their key.
//! An instance hashed while transient keeps that hash after its key is
//! assigned, so it stays in its bucket of any hashed container it was put in,
//! but it no longer matches the hash a fresh instance loaded by key computes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;

use crate::key::{EntityKey, KeyKind};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// Key, type lineage and cached hash of one entity instance.
pub struct Identity {
    key: EntityKey,
    lineage: &'static [&'static str],
    instance: u64,
    cached_hash: OnceCell<u64>,
}

impl Identity {
    /// Identity with an explicit key.
    ///
    /// `lineage` lists type names from the hierarchy root down to the
    /// concrete type, e.g. `&["IdentityUser", "ApplicationUser"]`.
    pub fn new(key: EntityKey, lineage: &'static [&'static str]) -> Self {
        Self {
            key,
            lineage,
            instance: next_instance(),
            cached_hash: OnceCell::new(),
        }
    }

    /// Identity holding the default key of `kind`
    pub fn transient(kind: KeyKind, lineage: &'static [&'static str]) -> Self {
        Self::new(kind.default_key(), lineage)
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Assign the key. A hash cached before this call is kept.
    pub fn set_key(&mut self, key: EntityKey) {
        self.key = key;
    }

    pub fn lineage(&self) -> &'static [&'static str] {
        self.lineage
    }

    /// Name of the concrete type
    pub fn type_name(&self) -> &'static str {
        self.lineage.last().copied().unwrap_or("")
    }

    /// True if the key still holds the default value of its kind
    pub fn is_transient(&self) -> bool {
        self.key.is_default()
    }

    /// True if both identities belong to the same instance
    pub fn is_same_instance(&self, other: &Identity) -> bool {
        self.instance == other.instance
    }

    /// True if one type is the other or derives from it
    pub fn is_assignable(&self, other: &Identity) -> bool {
        let shorter = self.lineage.len().min(other.lineage.len());
        shorter > 0 && self.lineage[..shorter] == other.lineage[..shorter]
    }

    /// Entity equality as described in the module documentation.
    pub fn entity_eq(&self, other: &Identity) -> bool {
        if self.is_same_instance(other) {
            return true;
        }
        if !self.is_assignable(other) {
            return false;
        }
        match (self.is_transient(), other.is_transient()) {
            (false, false) => self.key == other.key,
            _ => false,
        }
    }

    /// Hash computed once and cached.
    pub fn hash_code(&self) -> u64 {
        *self.cached_hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            if self.is_transient() {
                self.instance.hash(&mut hasher);
            } else {
                self.key.hash(&mut hasher);
            }
            hasher.finish()
        })
    }
}

impl Clone for Identity {
    /// A clone is a new instance: fresh token, nothing cached.
    fn clone(&self) -> Self {
        Self::new(self.key.clone(), self.lineage)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("type", &self.type_name())
            .field("key", &self.key)
            .finish()
    }
}

/// Implemented by every entity carrying an [`Identity`].
pub trait Entity {
    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn id(&self) -> &EntityKey {
        self.identity().key()
    }

    fn set_id(&mut self, key: EntityKey) {
        self.identity_mut().set_key(key);
    }

    fn is_transient(&self) -> bool {
        self.identity().is_transient()
    }
}

/// Equality between entities of possibly different concrete types.
pub fn entity_eq<A, B>(a: &A, b: &B) -> bool
where
    A: Entity + ?Sized,
    B: Entity + ?Sized,
{
    a.identity().entity_eq(b.identity())
}

/// Implements [`Entity`], `PartialEq`, `Eq` and `Hash` for a struct with an
/// `identity: Identity` field.
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty) => {
        impl $crate::entity::Entity for $ty {
            fn identity(&self) -> &$crate::entity::Identity {
                &self.identity
            }

            fn identity_mut(&mut self) -> &mut $crate::entity::Identity {
                &mut self.identity
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.identity.entity_eq(&other.identity)
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                state.write_u64(self.identity.hash_code());
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SIMPLE: &[&str] = &["SimpleDomainObject"];
    const SUB_SIMPLE: &[&str] = &["SimpleDomainObject", "SubSimpleDomainObject"];
    const OTHER: &[&str] = &["OtherDomainObject"];

    #[derive(Debug, Clone)]
    struct SimpleDomainObject {
        identity: Identity,
    }

    impl SimpleDomainObject {
        fn new() -> Self {
            Self {
                identity: Identity::transient(KeyKind::Int, SIMPLE),
            }
        }

        fn sub() -> Self {
            Self {
                identity: Identity::transient(KeyKind::Int, SUB_SIMPLE),
            }
        }

        fn other() -> Self {
            Self {
                identity: Identity::transient(KeyKind::Int, OTHER),
            }
        }

        fn with_id(mut self, id: i32) -> Self {
            self.set_id(EntityKey::Int(id));
            self
        }
    }

    impl_entity!(SimpleDomainObject);

    #[test]
    fn test_two_none_objects_are_equal() {
        let obj1: Option<&SimpleDomainObject> = None;
        let obj2: Option<&SimpleDomainObject> = None;
        assert_eq!(obj1, obj2);
    }

    #[test]
    fn test_one_none_object_is_not_equal() {
        let obj1: Option<&SimpleDomainObject> = None;
        let obj2 = SimpleDomainObject::new();
        assert_ne!(obj1, Some(&obj2));
    }

    #[test]
    fn test_two_transient_objects_are_not_equal() {
        let obj1 = SimpleDomainObject::new();
        let obj2 = SimpleDomainObject::new();
        assert_ne!(obj1, obj2);
    }

    #[test]
    fn test_same_transient_instance_is_equal() {
        let obj1 = SimpleDomainObject::new();
        let obj2 = &obj1;
        assert_eq!(&obj1, obj2);
    }

    #[test]
    fn test_one_transient_object_is_not_equal() {
        let obj1 = SimpleDomainObject::new();
        let obj2 = SimpleDomainObject::new().with_id(1);
        assert_ne!(obj1, obj2);
    }

    #[test]
    fn test_same_ids_are_equal() {
        let obj1 = SimpleDomainObject::new().with_id(1);
        let obj2 = SimpleDomainObject::new().with_id(1);
        assert_eq!(obj1, obj2);
    }

    #[test]
    fn test_different_ids_are_not_equal() {
        let obj1 = SimpleDomainObject::new().with_id(1);
        let obj2 = SimpleDomainObject::new().with_id(2);
        assert_ne!(obj1, obj2);
    }

    #[test]
    fn test_same_ids_in_subclass_are_equal_both_ways() {
        let obj1 = SimpleDomainObject::new().with_id(1);
        let obj2 = SimpleDomainObject::sub().with_id(1);
        assert!(entity_eq(&obj1, &obj2));
        assert!(entity_eq(&obj2, &obj1));
    }

    #[test]
    fn test_different_ids_in_subclass_are_not_equal() {
        let obj1 = SimpleDomainObject::new().with_id(1);
        let obj2 = SimpleDomainObject::sub().with_id(2);
        assert!(!entity_eq(&obj1, &obj2));
    }

    #[test]
    fn test_same_ids_in_disparate_types_are_not_equal() {
        let obj1 = SimpleDomainObject::new().with_id(1);
        let obj2 = SimpleDomainObject::other().with_id(1);
        assert!(!entity_eq(&obj1, &obj2));
    }

    #[test]
    fn test_clone_of_transient_is_a_different_instance() {
        let obj1 = SimpleDomainObject::new();
        let obj2 = obj1.clone();
        assert_ne!(obj1, obj2);
    }

    #[test]
    fn test_persisted_hash_follows_key() {
        let obj1 = SimpleDomainObject::new().with_id(5);
        let obj2 = SimpleDomainObject::new().with_id(5);
        assert_eq!(obj1.identity().hash_code(), obj2.identity().hash_code());

        let set: HashSet<_> = [obj1, obj2].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    /// Known sharp edge: hashing while transient pins the transient hash.
    #[test]
    fn test_hash_cached_while_transient_survives_key_assignment() {
        let mut obj = SimpleDomainObject::new();
        let transient_hash = obj.identity().hash_code();

        obj.set_id(EntityKey::Int(9));
        assert_eq!(obj.identity().hash_code(), transient_hash);

        let fresh = SimpleDomainObject::new().with_id(9);
        assert_ne!(fresh.identity().hash_code(), transient_hash);
        assert_eq!(obj, fresh);
    }
}
