//! User store over a session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{AppError, AppResult};
use domain::{
    require_text, Claim, Entity, EntityKey, IdentityUser, IdentityUserClaim, IdentityUserLogin,
    UserLoginInfo,
};

use crate::infra::Session;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// Operations reaching the database are async; the remaining accessors
/// only read or change the user in memory; those changes are persisted by
/// the next `update`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Save a new user with its logins, claims and roles
    async fn create(&self, user: &mut IdentityUser) -> AppResult<()>;

    async fn update(&self, user: &IdentityUser) -> AppResult<()>;

    /// Delete a user with its logins, claims and role links; roles stay
    async fn delete(&self, user: &IdentityUser) -> AppResult<()>;

    async fn find_by_id(&self, user_id: &EntityKey) -> AppResult<Option<IdentityUser>>;

    async fn find_by_name(&self, user_name: &str) -> AppResult<Option<IdentityUser>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<IdentityUser>>;

    /// Find the user owning an external login
    async fn find_by_login(&self, login: &UserLoginInfo) -> AppResult<Option<IdentityUser>>;

    /// All users ordered by user name
    async fn users(&self) -> AppResult<Vec<IdentityUser>>;

    // Logins
    async fn add_login(&self, user: &mut IdentityUser, login: &UserLoginInfo) -> AppResult<()>;

    async fn remove_login(&self, user: &mut IdentityUser, login: &UserLoginInfo) -> AppResult<()>;

    fn get_logins(&self, user: &IdentityUser) -> AppResult<Vec<UserLoginInfo>>;

    // Claims
    async fn add_claim(&self, user: &mut IdentityUser, claim: &Claim) -> AppResult<()>;

    /// Remove every claim with the same type and value
    async fn remove_claim(&self, user: &mut IdentityUser, claim: &Claim) -> AppResult<()>;

    fn get_claims(&self, user: &IdentityUser) -> AppResult<Vec<Claim>>;

    // Roles
    /// Fails with `InvalidOperation` if the role does not exist
    async fn add_to_role(&self, user: &mut IdentityUser, role_name: &str) -> AppResult<()>;

    async fn remove_from_role(&self, user: &mut IdentityUser, role_name: &str) -> AppResult<()>;

    fn get_roles(&self, user: &IdentityUser) -> AppResult<Vec<String>>;

    fn is_in_role(&self, user: &IdentityUser, role_name: &str) -> AppResult<bool>;

    // Password and security stamp
    fn set_password_hash(&self, user: &mut IdentityUser, password_hash: Option<String>) -> AppResult<()>;

    fn get_password_hash(&self, user: &IdentityUser) -> AppResult<Option<String>>;

    fn has_password(&self, user: &IdentityUser) -> AppResult<bool>;

    fn set_security_stamp(&self, user: &mut IdentityUser, stamp: Option<String>) -> AppResult<()>;

    fn get_security_stamp(&self, user: &IdentityUser) -> AppResult<Option<String>>;

    // Email and phone
    fn set_email(&self, user: &mut IdentityUser, email: Option<String>) -> AppResult<()>;

    fn get_email(&self, user: &IdentityUser) -> AppResult<Option<String>>;

    fn get_email_confirmed(&self, user: &IdentityUser) -> AppResult<bool>;

    fn set_email_confirmed(&self, user: &mut IdentityUser, confirmed: bool) -> AppResult<()>;

    fn set_phone_number(&self, user: &mut IdentityUser, phone_number: Option<String>) -> AppResult<()>;

    fn get_phone_number(&self, user: &IdentityUser) -> AppResult<Option<String>>;

    fn get_phone_number_confirmed(&self, user: &IdentityUser) -> AppResult<bool>;

    fn set_phone_number_confirmed(&self, user: &mut IdentityUser, confirmed: bool) -> AppResult<()>;

    // Two factor and lockout
    fn set_two_factor_enabled(&self, user: &mut IdentityUser, enabled: bool) -> AppResult<()>;

    fn get_two_factor_enabled(&self, user: &IdentityUser) -> AppResult<bool>;

    /// `None` when the user is not locked out
    fn get_lockout_end_date(&self, user: &IdentityUser) -> AppResult<Option<DateTime<Utc>>>;

    fn set_lockout_end_date(&self, user: &mut IdentityUser, lockout_end: Option<DateTime<Utc>>) -> AppResult<()>;

    /// Returns the new count
    fn increment_access_failed_count(&self, user: &mut IdentityUser) -> AppResult<i32>;

    fn reset_access_failed_count(&self, user: &mut IdentityUser) -> AppResult<()>;

    fn get_access_failed_count(&self, user: &IdentityUser) -> AppResult<i32>;

    fn get_lockout_enabled(&self, user: &IdentityUser) -> AppResult<bool>;

    fn set_lockout_enabled(&self, user: &mut IdentityUser, enabled: bool) -> AppResult<()>;
}

/// Session backed implementation of [`UserRepository`]
pub struct UserStore {
    session: Arc<Session>,
    auto_save_changes: AtomicBool,
    dispose_context: AtomicBool,
    disposed: AtomicBool,
}

impl UserStore {
    /// Create a store over `session`. Changes are flushed on commit and the
    /// session stays open when the store is disposed.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            auto_save_changes: AtomicBool::new(false),
            dispose_context: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn auto_save_changes(&self) -> bool {
        self.auto_save_changes.load(Ordering::SeqCst)
    }

    /// Flush after every write instead of waiting for a commit
    pub fn set_auto_save_changes(&self, enabled: bool) {
        self.auto_save_changes.store(enabled, Ordering::SeqCst);
    }

    pub fn dispose_context(&self) -> bool {
        self.dispose_context.load(Ordering::SeqCst)
    }

    /// Close the session when the store is disposed
    pub fn set_dispose_context(&self, enabled: bool) {
        self.dispose_context.store(enabled, Ordering::SeqCst);
    }

    /// Release the store; every later call fails with `Disposed`.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.dispose_context() {
            self.session.close().await;
        }
    }

    fn ensure_not_disposed(&self) -> AppResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Disposed("UserStore"));
        }
        Ok(())
    }

    /// Queue the in-memory state of a user the session knows for the next
    /// flush. Unsaved users are written whole by `create`.
    async fn track(&self, user: &IdentityUser) -> AppResult<()> {
        self.session.track_user(user).await
    }

    async fn save_changes(&self) -> AppResult<()> {
        if self.auto_save_changes() {
            self.session.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, user: &mut IdentityUser) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.save_user(user).await?;
        self.save_changes().await
    }

    async fn update(&self, user: &IdentityUser) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.update_user(user).await?;
        self.save_changes().await
    }

    async fn delete(&self, user: &IdentityUser) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.delete_user(user).await?;
        self.save_changes().await
    }

    async fn find_by_id(&self, user_id: &EntityKey) -> AppResult<Option<IdentityUser>> {
        self.ensure_not_disposed()?;
        self.session.find_user_by_id(user_id).await
    }

    async fn find_by_name(&self, user_name: &str) -> AppResult<Option<IdentityUser>> {
        self.ensure_not_disposed()?;
        require_text(user_name, "userName")?;
        self.session.find_user_by_name(user_name).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<IdentityUser>> {
        self.ensure_not_disposed()?;
        require_text(email, "email")?;
        self.session.find_user_by_email(email).await
    }

    async fn find_by_login(&self, login: &UserLoginInfo) -> AppResult<Option<IdentityUser>> {
        self.ensure_not_disposed()?;
        self.session.find_user_by_login(login).await
    }

    async fn users(&self) -> AppResult<Vec<IdentityUser>> {
        self.ensure_not_disposed()?;
        self.session.users().await
    }

    async fn add_login(&self, user: &mut IdentityUser, login: &UserLoginInfo) -> AppResult<()> {
        self.ensure_not_disposed()?;
        if !user.logins.iter().any(|l| l.matches(login)) {
            let owned = IdentityUserLogin::new(user.id().clone(), login);
            user.logins.push(owned);
        }
        self.track(user).await?;
        self.save_changes().await
    }

    async fn remove_login(&self, user: &mut IdentityUser, login: &UserLoginInfo) -> AppResult<()> {
        self.ensure_not_disposed()?;
        if let Some(position) = user.logins.iter().position(|l| l.matches(login)) {
            user.logins.remove(position);
        }
        self.track(user).await?;
        self.save_changes().await
    }

    fn get_logins(&self, user: &IdentityUser) -> AppResult<Vec<UserLoginInfo>> {
        self.ensure_not_disposed()?;
        Ok(user.logins.iter().map(IdentityUserLogin::info).collect())
    }

    async fn add_claim(&self, user: &mut IdentityUser, claim: &Claim) -> AppResult<()> {
        self.ensure_not_disposed()?;
        let owned = IdentityUserClaim::new(user.id().clone(), claim);
        user.claims.push(owned);
        self.track(user).await?;
        self.save_changes().await
    }

    async fn remove_claim(&self, user: &mut IdentityUser, claim: &Claim) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.claims.retain(|c| !c.matches(claim));
        self.track(user).await?;
        self.save_changes().await
    }

    fn get_claims(&self, user: &IdentityUser) -> AppResult<Vec<Claim>> {
        self.ensure_not_disposed()?;
        Ok(user.claims.iter().map(IdentityUserClaim::claim).collect())
    }

    async fn add_to_role(&self, user: &mut IdentityUser, role_name: &str) -> AppResult<()> {
        self.ensure_not_disposed()?;
        require_text(role_name, "roleName")?;
        let role = self
            .session
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::invalid_operation(format!("Role {} does not exist.", role_name)))?;

        if !user.roles.contains(&role) {
            user.roles.push(role);
        }
        self.track(user).await?;
        self.save_changes().await
    }

    async fn remove_from_role(&self, user: &mut IdentityUser, role_name: &str) -> AppResult<()> {
        self.ensure_not_disposed()?;
        require_text(role_name, "roleName")?;
        if let Some(position) = user.roles.iter().position(|r| r.name == role_name) {
            user.roles.remove(position);
        }
        self.track(user).await?;
        self.save_changes().await
    }

    fn get_roles(&self, user: &IdentityUser) -> AppResult<Vec<String>> {
        self.ensure_not_disposed()?;
        Ok(user.role_names())
    }

    fn is_in_role(&self, user: &IdentityUser, role_name: &str) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        require_text(role_name, "roleName")?;
        Ok(user.roles.iter().any(|r| r.name == role_name))
    }

    fn set_password_hash(&self, user: &mut IdentityUser, password_hash: Option<String>) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.password_hash = password_hash;
        Ok(())
    }

    fn get_password_hash(&self, user: &IdentityUser) -> AppResult<Option<String>> {
        self.ensure_not_disposed()?;
        Ok(user.password_hash.clone())
    }

    fn has_password(&self, user: &IdentityUser) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        Ok(user.password_hash.is_some())
    }

    fn set_security_stamp(&self, user: &mut IdentityUser, stamp: Option<String>) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.security_stamp = stamp;
        Ok(())
    }

    fn get_security_stamp(&self, user: &IdentityUser) -> AppResult<Option<String>> {
        self.ensure_not_disposed()?;
        Ok(user.security_stamp.clone())
    }

    fn set_email(&self, user: &mut IdentityUser, email: Option<String>) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.email = email;
        Ok(())
    }

    fn get_email(&self, user: &IdentityUser) -> AppResult<Option<String>> {
        self.ensure_not_disposed()?;
        Ok(user.email.clone())
    }

    fn get_email_confirmed(&self, user: &IdentityUser) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        Ok(user.email_confirmed)
    }

    fn set_email_confirmed(&self, user: &mut IdentityUser, confirmed: bool) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.email_confirmed = confirmed;
        Ok(())
    }

    fn set_phone_number(&self, user: &mut IdentityUser, phone_number: Option<String>) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.phone_number = phone_number;
        Ok(())
    }

    fn get_phone_number(&self, user: &IdentityUser) -> AppResult<Option<String>> {
        self.ensure_not_disposed()?;
        Ok(user.phone_number.clone())
    }

    fn get_phone_number_confirmed(&self, user: &IdentityUser) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        Ok(user.phone_number_confirmed)
    }

    fn set_phone_number_confirmed(&self, user: &mut IdentityUser, confirmed: bool) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.phone_number_confirmed = confirmed;
        Ok(())
    }

    fn set_two_factor_enabled(&self, user: &mut IdentityUser, enabled: bool) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.two_factor_enabled = enabled;
        Ok(())
    }

    fn get_two_factor_enabled(&self, user: &IdentityUser) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        Ok(user.two_factor_enabled)
    }

    fn get_lockout_end_date(&self, user: &IdentityUser) -> AppResult<Option<DateTime<Utc>>> {
        self.ensure_not_disposed()?;
        Ok(user.lockout_end_date_utc)
    }

    fn set_lockout_end_date(&self, user: &mut IdentityUser, lockout_end: Option<DateTime<Utc>>) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.lockout_end_date_utc = lockout_end;
        Ok(())
    }

    fn increment_access_failed_count(&self, user: &mut IdentityUser) -> AppResult<i32> {
        self.ensure_not_disposed()?;
        user.access_failed_count += 1;
        Ok(user.access_failed_count)
    }

    fn reset_access_failed_count(&self, user: &mut IdentityUser) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.access_failed_count = 0;
        Ok(())
    }

    fn get_access_failed_count(&self, user: &IdentityUser) -> AppResult<i32> {
        self.ensure_not_disposed()?;
        Ok(user.access_failed_count)
    }

    fn get_lockout_enabled(&self, user: &IdentityUser) -> AppResult<bool> {
        self.ensure_not_disposed()?;
        Ok(user.lockout_enabled)
    }

    fn set_lockout_enabled(&self, user: &mut IdentityUser, enabled: bool) -> AppResult<()> {
        self.ensure_not_disposed()?;
        user.lockout_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::SessionFactory;
    use mapping::IdentityMapping;
    use mockall::predicate::eq;
    use sea_orm::DatabaseConnection;

    fn offline_store() -> UserStore {
        let factory =
            SessionFactory::from_mapping(DatabaseConnection::default(), &IdentityMapping::default())
                .unwrap();
        UserStore::new(factory.open_session())
    }

    #[test]
    fn test_store_defaults() {
        let store = offline_store();
        assert!(!store.auto_save_changes());
        assert!(!store.dispose_context());
    }

    #[test]
    fn test_access_failed_count() {
        let store = offline_store();
        let mut user = IdentityUser::new("alice");

        assert_eq!(store.increment_access_failed_count(&mut user).unwrap(), 1);
        assert_eq!(store.increment_access_failed_count(&mut user).unwrap(), 2);
        store.reset_access_failed_count(&mut user).unwrap();
        assert_eq!(store.get_access_failed_count(&user).unwrap(), 0);
    }

    #[test]
    fn test_password_and_contact_fields() {
        let store = offline_store();
        let mut user = IdentityUser::new("alice");

        assert!(!store.has_password(&user).unwrap());
        store.set_password_hash(&mut user, Some("hash".to_string())).unwrap();
        assert!(store.has_password(&user).unwrap());

        store.set_email(&mut user, Some("alice@example.com".to_string())).unwrap();
        store.set_email_confirmed(&mut user, true).unwrap();
        store.set_phone_number(&mut user, Some("555-0100".to_string())).unwrap();
        assert_eq!(store.get_email(&user).unwrap().as_deref(), Some("alice@example.com"));
        assert!(store.get_email_confirmed(&user).unwrap());
        assert!(!store.get_phone_number_confirmed(&user).unwrap());
    }

    #[tokio::test]
    async fn test_disposed_store_rejects_calls() {
        let store = offline_store();
        store.dispose().await;

        let user = IdentityUser::new("alice");
        assert!(matches!(store.get_logins(&user), Err(AppError::Disposed("UserStore"))));
        // Disposal is checked before the arguments
        assert!(matches!(
            store.find_by_name("").await,
            Err(AppError::Disposed(_))
        ));
        // The session is left open unless the store owns it
        assert!(store.session().is_open().await);
    }

    #[tokio::test]
    async fn test_dispose_closes_owned_session() {
        let store = offline_store();
        store.set_dispose_context(true);
        store.dispose().await;

        assert!(!store.session().is_open().await);
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let store = offline_store();
        let mut user = IdentityUser::new("alice");

        assert!(matches!(store.find_by_name("  ").await, Err(AppError::Argument(_))));
        assert!(matches!(store.find_by_email("").await, Err(AppError::Argument(_))));
        assert!(matches!(
            store.add_to_role(&mut user, "").await,
            Err(AppError::Argument(_))
        ));
        assert!(matches!(store.is_in_role(&user, " "), Err(AppError::Argument(_))));
    }

    #[tokio::test]
    async fn test_mock_find_by_name() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_name()
            .with(eq("alice"))
            .times(1)
            .returning(|name| Ok(Some(IdentityUser::new(name))));

        let found = repo.find_by_name("alice").await.unwrap().unwrap();
        assert_eq!(found.user_name, "alice");
    }
}
