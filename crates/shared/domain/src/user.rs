//! User aggregate.

use chrono::{DateTime, Utc};

use crate::claim::IdentityUserClaim;
use crate::entity::Identity;
use crate::key::{EntityKey, KeyKind};
use crate::login::IdentityUserLogin;
use crate::role::IdentityRole;

/// Type lineage of [`IdentityUser`]
pub const USER_LINEAGE: &[&str] = &["IdentityUser"];

/// A user with its roles, claims and external logins.
#[derive(Debug, Clone)]
pub struct IdentityUser {
    identity: Identity,
    pub user_name: String,
    pub email: Option<String>,
    pub email_confirmed: bool,
    /// Salted/hashed form of the password
    pub password_hash: Option<String>,
    /// Random value that changes whenever the credentials change
    pub security_stamp: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    /// End of the lockout in UTC; any time in the past means not locked out
    pub lockout_end_date_utc: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    /// Failed access attempts counted towards lockout
    pub access_failed_count: i32,
    pub roles: Vec<IdentityRole>,
    pub claims: Vec<IdentityUserClaim>,
    pub logins: Vec<IdentityUserLogin>,
}

impl IdentityUser {
    /// New user with a freshly generated text key.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self::with_key(EntityKey::generate(KeyKind::Text), user_name)
    }

    /// New user with an explicit key; a default key leaves it transient.
    pub fn with_key(key: EntityKey, user_name: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(key, USER_LINEAGE),
            user_name: user_name.into(),
            email: None,
            email_confirmed: false,
            password_hash: None,
            security_stamp: None,
            phone_number: None,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end_date_utc: None,
            lockout_enabled: false,
            access_failed_count: 0,
            roles: Vec::new(),
            claims: Vec::new(),
            logins: Vec::new(),
        }
    }

    /// Role names held by the user
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// True when lockout is enabled and the lockout end lies in the future
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end_date_utc.is_some_and(|end| end > now)
    }
}

crate::impl_entity!(IdentityUser);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use chrono::Duration;

    #[test]
    fn test_new_user_has_text_key() {
        let user = IdentityUser::new("alice");
        assert!(!user.is_transient());
        assert_eq!(user.id().kind(), KeyKind::Text);
        assert!(user.roles.is_empty() && user.claims.is_empty() && user.logins.is_empty());
    }

    #[test]
    fn test_users_with_same_key_are_equal() {
        let a = IdentityUser::with_key("u1".into(), "alice");
        let b = IdentityUser::with_key("u1".into(), "alice-renamed");
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_locked_out() {
        let now = Utc::now();
        let mut user = IdentityUser::new("bob");
        user.lockout_end_date_utc = Some(now + Duration::minutes(5));
        assert!(!user.is_locked_out(now));

        user.lockout_enabled = true;
        assert!(user.is_locked_out(now));
        assert!(!user.is_locked_out(now + Duration::minutes(10)));
    }
}
