//! Repository layer: user and role stores.

mod role_repository;
mod user_repository;

pub use role_repository::{RoleRepository, RoleStore};
pub use user_repository::{UserRepository, UserStore};

#[cfg(any(test, feature = "test-utils"))]
pub use role_repository::MockRoleRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
