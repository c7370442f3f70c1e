//! Role store over a session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common::{AppError, AppResult};
use domain::{require_text, EntityKey, IdentityRole};

use crate::infra::Session;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Role repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, role: &mut IdentityRole) -> AppResult<()>;

    async fn update(&self, role: &IdentityRole) -> AppResult<()>;

    /// Delete a role and every user link to it
    async fn delete(&self, role: &IdentityRole) -> AppResult<()>;

    async fn find_by_id(&self, role_id: &EntityKey) -> AppResult<Option<IdentityRole>>;

    async fn find_by_name(&self, role_name: &str) -> AppResult<Option<IdentityRole>>;

    /// All roles ordered by name
    async fn roles(&self) -> AppResult<Vec<IdentityRole>>;

    /// Keys of the users holding the role
    async fn user_ids_in_role(&self, role_id: &EntityKey) -> AppResult<Vec<EntityKey>>;
}

/// Session backed implementation of [`RoleRepository`]
pub struct RoleStore {
    session: Arc<Session>,
    auto_save_changes: AtomicBool,
    dispose_context: AtomicBool,
    disposed: AtomicBool,
}

impl RoleStore {
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

    pub fn set_auto_save_changes(&self, enabled: bool) {
        self.auto_save_changes.store(enabled, Ordering::SeqCst);
    }

    pub fn dispose_context(&self) -> bool {
        self.dispose_context.load(Ordering::SeqCst)
    }

    pub fn set_dispose_context(&self, enabled: bool) {
        self.dispose_context.store(enabled, Ordering::SeqCst);
    }

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
            return Err(AppError::Disposed("RoleStore"));
        }
        Ok(())
    }

    async fn save_changes(&self) -> AppResult<()> {
        if self.auto_save_changes() {
            self.session.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for RoleStore {
    async fn create(&self, role: &mut IdentityRole) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.save_role(role).await?;
        self.save_changes().await
    }

    async fn update(&self, role: &IdentityRole) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.update_role(role).await?;
        self.save_changes().await
    }

    async fn delete(&self, role: &IdentityRole) -> AppResult<()> {
        self.ensure_not_disposed()?;
        self.session.delete_role(role).await?;
        self.save_changes().await
    }

    async fn find_by_id(&self, role_id: &EntityKey) -> AppResult<Option<IdentityRole>> {
        self.ensure_not_disposed()?;
        self.session.find_role_by_id(role_id).await
    }

    async fn find_by_name(&self, role_name: &str) -> AppResult<Option<IdentityRole>> {
        self.ensure_not_disposed()?;
        require_text(role_name, "roleName")?;
        self.session.find_role_by_name(role_name).await
    }

    async fn roles(&self) -> AppResult<Vec<IdentityRole>> {
        self.ensure_not_disposed()?;
        self.session.roles().await
    }

    async fn user_ids_in_role(&self, role_id: &EntityKey) -> AppResult<Vec<EntityKey>> {
        self.ensure_not_disposed()?;
        self.session.user_ids_in_role(role_id).await
    }
}
