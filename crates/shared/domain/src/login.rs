//! External login entity and value object.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::key::EntityKey;

/// Provider/key pair as exchanged with callers (e.g. "Google", "1234").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserLoginInfo {
    pub login_provider: String,
    pub provider_key: String,
}

impl UserLoginInfo {
    pub fn new(login_provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            login_provider: login_provider.into(),
            provider_key: provider_key.into(),
        }
    }
}

/// A user's login with an external provider.
///
/// Identified by (provider, provider key, owning user); equality and the
/// cached hash cover exactly those three fields.
#[derive(Debug, Clone)]
pub struct IdentityUserLogin {
    pub login_provider: String,
    pub provider_key: String,
    pub user_id: EntityKey,
    cached_hash: OnceCell<u64>,
}

impl IdentityUserLogin {
    pub fn new(user_id: EntityKey, info: &UserLoginInfo) -> Self {
        Self {
            login_provider: info.login_provider.clone(),
            provider_key: info.provider_key.clone(),
            user_id,
            cached_hash: OnceCell::new(),
        }
    }

    pub fn info(&self) -> UserLoginInfo {
        UserLoginInfo::new(self.login_provider.clone(), self.provider_key.clone())
    }

    /// True if this login is for the given provider/key pair
    pub fn matches(&self, info: &UserLoginInfo) -> bool {
        self.login_provider == info.login_provider && self.provider_key == info.provider_key
    }

    fn hash_code(&self) -> u64 {
        *self.cached_hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.login_provider.hash(&mut hasher);
            self.provider_key.hash(&mut hasher);
            self.user_id.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl PartialEq for IdentityUserLogin {
    fn eq(&self, other: &Self) -> bool {
        self.login_provider == other.login_provider
            && self.provider_key == other.provider_key
            && self.user_id == other.user_id
    }
}

impl Eq for IdentityUserLogin {}

impl Hash for IdentityUserLogin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_login_equality_covers_all_three_fields() {
        let info = UserLoginInfo::new("Google", "1234");
        let a = IdentityUserLogin::new("u1".into(), &info);
        let b = IdentityUserLogin::new("u1".into(), &info);
        let other_user = IdentityUserLogin::new("u2".into(), &info);
        let other_key = IdentityUserLogin::new("u1".into(), &UserLoginInfo::new("Google", "99"));

        assert_eq!(a, b);
        assert_ne!(a, other_user);
        assert_ne!(a, other_key);

        let set: HashSet<_> = [a, b, other_user].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_matches_ignores_user() {
        let info = UserLoginInfo::new("GitHub", "abc");
        let login = IdentityUserLogin::new("u1".into(), &info);
        assert!(login.matches(&info));
        assert!(!login.matches(&UserLoginInfo::new("GitHub", "abd")));
        assert_eq!(login.info(), info);
    }
}
