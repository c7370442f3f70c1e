//! Domain layer - identity entities and value objects.
//!
//! This crate contains the pure domain model with no infrastructure
//! dependencies: entity keys, entity identity/equality, and the user, role,
//! login and claim types persisted by the identity store.

pub mod claim;
pub mod constants;
pub mod entity;
pub mod error;
pub mod key;
pub mod login;
pub mod role;
pub mod user;

pub use claim::{Claim, IdentityUserClaim};
pub use constants::*;
pub use entity::{entity_eq, Entity, Identity};
pub use error::{require_text, DomainError, DomainResult};
pub use key::{new_comb_uuid, parse_uuid_or_nil, EntityKey, KeyKind};
pub use login::{IdentityUserLogin, UserLoginInfo};
pub use role::IdentityRole;
pub use user::IdentityUser;
