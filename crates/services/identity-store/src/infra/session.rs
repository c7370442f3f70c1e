//! Sessions over the identity tables.
//!
//! A [`SessionFactory`] is built once per database and mapping and handed
//! around explicitly. Each logical request opens its own [`Session`], which
//! queues writes and flushes them in order:
//! - inside the open transaction when there is one
//! - otherwise inside a short transaction of its own
//!
//! Reads flush pending writes first, so a query always sees them.
//!
//! A session knows the users it saved, loaded or was asked to update.
//! Changes to any other user stay in memory until it is saved.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tokio::sync::{Mutex, MutexGuard};

use common::{AppError, AppResult};
use domain::{Entity, EntityKey, IdentityRole, IdentityUser, IdentityUserLogin, KeyKind, UserLoginInfo};
use mapping::{IdentityMapping, MappingDocument};

use super::persister::{Persister, UserLookup};
use super::tables::IdentityTables;

/// Runs `$body` with `$conn` bound to the open transaction, or to the pool
/// when no transaction is open.
macro_rules! on_connection {
    ($session:expr, $state:expr, |$conn:ident| $body:expr) => {
        match $state.transaction.as_ref() {
            Some($conn) => $body,
            None => {
                let $conn = &$session.db;
                $body
            }
        }
    };
}

/// Builds sessions sharing one connection pool and one compiled mapping.
pub struct SessionFactory {
    db: DatabaseConnection,
    document: Arc<MappingDocument>,
    tables: Arc<IdentityTables>,
}

impl SessionFactory {
    /// Create a factory from an already compiled mapping document.
    pub fn new(db: DatabaseConnection, document: MappingDocument) -> AppResult<Self> {
        let tables = IdentityTables::resolve(&document)?;
        Ok(Self {
            db,
            document: Arc::new(document),
            tables: Arc::new(tables),
        })
    }

    /// Compile `mapping` and create a factory for it.
    pub fn from_mapping(db: DatabaseConnection, mapping: &IdentityMapping) -> AppResult<Self> {
        let document = mapping.compile()?;
        tracing::debug!(tables = document.tables.len(), "Identity mapping compiled");
        Self::new(db, document)
    }

    pub fn document(&self) -> &MappingDocument {
        &self.document
    }

    pub fn tables(&self) -> &IdentityTables {
        &self.tables
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn open_session(&self) -> Arc<Session> {
        Arc::new(Session {
            db: self.db.clone(),
            tables: self.tables.clone(),
            state: Mutex::new(SessionState::default()),
        })
    }
}

/// A write waiting for the next flush.
enum PendingWrite {
    InsertUser(IdentityUser),
    UpdateUser(IdentityUser),
    DeleteUser(EntityKey),
    InsertRole(IdentityRole),
    UpdateRole(IdentityRole),
    DeleteRole(EntityKey),
}

impl fmt::Display for PendingWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingWrite::InsertUser(user) => write!(f, "insert user {}", user.user_name),
            PendingWrite::UpdateUser(user) => write!(f, "update user {}", user.user_name),
            PendingWrite::DeleteUser(key) => write!(f, "delete user {}", key),
            PendingWrite::InsertRole(role) => write!(f, "insert role {}", role.name),
            PendingWrite::UpdateRole(role) => write!(f, "update role {}", role.name),
            PendingWrite::DeleteRole(key) => write!(f, "delete role {}", key),
        }
    }
}

#[derive(Default)]
struct SessionState {
    transaction: Option<DatabaseTransaction>,
    pending: VecDeque<PendingWrite>,
    known_users: HashSet<EntityKey>,
    closed: bool,
}

impl SessionState {
    fn queue_user_update(&mut self, user: &IdentityUser) {
        let mut snapshot = user.clone();
        Session::adopt_children(&mut snapshot);
        self.known_users.insert(snapshot.id().clone());
        let write = PendingWrite::UpdateUser(snapshot);
        tracing::debug!("Queued {}", write);
        self.pending.push_back(write);
    }

    fn remember_users<'u>(&mut self, users: impl IntoIterator<Item = &'u IdentityUser>) {
        self.known_users
            .extend(users.into_iter().map(|u| u.id().clone()));
    }
}

/// Unit of persistence for one logical request.
pub struct Session {
    db: DatabaseConnection,
    tables: Arc<IdentityTables>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn tables(&self) -> &IdentityTables {
        &self.tables
    }

    fn persister(&self) -> Persister<'_> {
        Persister::new(&self.tables)
    }

    async fn open_state(&self) -> AppResult<MutexGuard<'_, SessionState>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(AppError::Disposed("Session"));
        }
        Ok(state)
    }

    /// Point the children of `user` at its key.
    fn adopt_children(user: &mut IdentityUser) {
        let key = user.id().clone();
        for login in user.logins.iter_mut() {
            if login.user_id != key {
                *login = IdentityUserLogin::new(key.clone(), &login.info());
            }
        }
        for claim in user.claims.iter_mut() {
            claim.user_id = key.clone();
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Make a user persistent.
    ///
    /// Empty text keys and nil UUID keys are generated here. A transient
    /// integer key is assigned by the database, so the row is inserted at
    /// once and the children follow on the next flush.
    pub async fn save_user(&self, user: &mut IdentityUser) -> AppResult<()> {
        let mut state = self.open_state().await?;
        let kind = self.tables.user_key;
        user.id().expect_kind(kind)?;

        if kind == KeyKind::Int && user.is_transient() {
            self.flush_pending(&mut state).await?;
            let persister = self.persister();
            let key = on_connection!(self, state, |conn| persister.insert_user_row(conn, user).await)?;
            user.set_id(key);
            Self::adopt_children(user);
            tracing::debug!(user = %user.user_name, key = %user.id(), "User inserted");
            state.queue_user_update(user);
            return Ok(());
        }

        if user.is_transient() {
            user.set_id(EntityKey::generate(kind));
        }
        Self::adopt_children(user);
        state.known_users.insert(user.id().clone());
        let write = PendingWrite::InsertUser(user.clone());
        tracing::debug!("Queued {}", write);
        state.pending.push_back(write);
        Ok(())
    }

    /// Queue an update of a persistent user, attaching it to the session.
    pub async fn update_user(&self, user: &IdentityUser) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if user.is_transient() {
            return Err(AppError::invalid_operation(format!(
                "user {} has not been saved",
                user.user_name
            )));
        }
        state.queue_user_update(user);
        Ok(())
    }

    /// Queue an update only when the session already knows the user.
    /// A user that was never saved keeps its changes in memory; they are
    /// written by [`Session::save_user`].
    pub async fn track_user(&self, user: &IdentityUser) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if user.is_transient() || !state.known_users.contains(user.id()) {
            tracing::debug!(user = %user.user_name, "User not attached, change kept in memory");
            return Ok(());
        }
        state.queue_user_update(user);
        Ok(())
    }

    pub async fn delete_user(&self, user: &IdentityUser) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if user.is_transient() {
            return Err(AppError::invalid_operation(format!(
                "user {} has not been saved",
                user.user_name
            )));
        }
        state.known_users.remove(user.id());
        let write = PendingWrite::DeleteUser(user.id().clone());
        tracing::debug!("Queued {}", write);
        state.pending.push_back(write);
        Ok(())
    }

    /// Make a role persistent; key handling as for [`Session::save_user`].
    pub async fn save_role(&self, role: &mut IdentityRole) -> AppResult<()> {
        let mut state = self.open_state().await?;
        let kind = self.tables.role_key;
        role.id().expect_kind(kind)?;

        if kind == KeyKind::Int && role.is_transient() {
            self.flush_pending(&mut state).await?;
            let persister = self.persister();
            let key = on_connection!(self, state, |conn| persister.insert_role(conn, role).await)?;
            role.set_id(key);
            tracing::debug!(role = %role.name, key = %role.id(), "Role inserted");
            return Ok(());
        }

        if role.is_transient() {
            role.set_id(EntityKey::generate(kind));
        }
        let write = PendingWrite::InsertRole(role.clone());
        tracing::debug!("Queued {}", write);
        state.pending.push_back(write);
        Ok(())
    }

    pub async fn update_role(&self, role: &IdentityRole) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if role.is_transient() {
            return Err(AppError::invalid_operation(format!(
                "role {} has not been saved",
                role.name
            )));
        }
        let write = PendingWrite::UpdateRole(role.clone());
        tracing::debug!("Queued {}", write);
        state.pending.push_back(write);
        Ok(())
    }

    pub async fn delete_role(&self, role: &IdentityRole) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if role.is_transient() {
            return Err(AppError::invalid_operation(format!(
                "role {} has not been saved",
                role.name
            )));
        }
        let write = PendingWrite::DeleteRole(role.id().clone());
        tracing::debug!("Queued {}", write);
        state.pending.push_back(write);
        Ok(())
    }

    /// Execute every pending write.
    pub async fn flush(&self) -> AppResult<()> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await
    }

    /// Number of writes waiting for the next flush
    pub async fn pending_writes(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    async fn flush_pending(&self, state: &mut SessionState) -> AppResult<()> {
        if state.pending.is_empty() {
            return Ok(());
        }
        let writes: Vec<PendingWrite> = state.pending.drain(..).collect();

        if let Some(txn) = state.transaction.as_ref() {
            return self.apply(txn, writes).await;
        }

        let txn = self.db.begin().await?;
        match self.apply(&txn, writes).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, txn: &DatabaseTransaction, writes: Vec<PendingWrite>) -> AppResult<()> {
        let persister = self.persister();
        for write in writes {
            tracing::debug!("Flushing {}", write);
            match write {
                PendingWrite::InsertUser(user) => {
                    persister.insert_user(txn, &user).await?;
                }
                PendingWrite::UpdateUser(user) => persister.update_user(txn, &user).await?,
                PendingWrite::DeleteUser(key) => persister.delete_user(txn, &key).await?,
                PendingWrite::InsertRole(role) => {
                    persister.insert_role(txn, &role).await?;
                }
                PendingWrite::UpdateRole(role) => persister.update_role(txn, &role).await?,
                PendingWrite::DeleteRole(key) => persister.delete_role(txn, &key).await?,
            }
        }
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn begin_transaction(&self) -> AppResult<()> {
        let mut state = self.open_state().await?;
        if state.transaction.is_some() {
            return Err(AppError::invalid_operation("a transaction is already active"));
        }
        state.transaction = Some(self.db.begin().await?);
        tracing::debug!("Transaction started");
        Ok(())
    }

    /// Flush pending writes into the open transaction and commit it.
    /// The transaction is released whatever the outcome.
    pub async fn commit(&self) -> AppResult<()> {
        let mut state = self.open_state().await?;
        let txn = state
            .transaction
            .take()
            .ok_or_else(|| AppError::invalid_operation("no transaction is active"))?;
        let writes: Vec<PendingWrite> = state.pending.drain(..).collect();

        match self.apply(&txn, writes).await {
            Ok(()) => {
                txn.commit().await?;
                tracing::debug!("Transaction committed");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Roll back the open transaction, if any, discarding pending writes.
    pub async fn rollback(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.pending.clear();
        state.known_users.clear();
        if let Some(txn) = state.transaction.take() {
            txn.rollback().await?;
            tracing::debug!("Transaction rolled back");
        }
        Ok(())
    }

    pub async fn is_transaction_active(&self) -> bool {
        self.state.lock().await.transaction.is_some()
    }

    /// Close the session. Pending writes are dropped and an open
    /// transaction is rolled back.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.pending.clear();
        state.known_users.clear();
        if let Some(txn) = state.transaction.take() {
            if let Err(e) = txn.rollback().await {
                tracing::error!("Transaction rollback failed: {}", e);
            }
        }
        tracing::debug!("Session closed");
    }

    pub async fn is_open(&self) -> bool {
        !self.state.lock().await.closed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    async fn find_user(&self, lookup: UserLookup<'_>) -> AppResult<Option<IdentityUser>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        let user = on_connection!(self, state, |conn| persister.find_user(conn, lookup).await)?;
        state.remember_users(&user);
        Ok(user)
    }

    pub async fn find_user_by_id(&self, user_id: &EntityKey) -> AppResult<Option<IdentityUser>> {
        user_id.expect_kind(self.tables.user_key)?;
        self.find_user(UserLookup::Id(user_id)).await
    }

    pub async fn find_user_by_name(&self, user_name: &str) -> AppResult<Option<IdentityUser>> {
        self.find_user(UserLookup::UserName(user_name)).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<IdentityUser>> {
        self.find_user(UserLookup::Email(email)).await
    }

    pub async fn find_user_by_login(&self, login: &UserLoginInfo) -> AppResult<Option<IdentityUser>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        let user = on_connection!(self, state, |conn| {
            match persister.find_user_id_by_login(conn, login).await? {
                Some(user_id) => persister.find_user(conn, UserLookup::Id(&user_id)).await,
                None => Ok(None),
            }
        })?;
        state.remember_users(&user);
        Ok(user)
    }

    pub async fn users(&self) -> AppResult<Vec<IdentityUser>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        let users = on_connection!(self, state, |conn| persister.list_users(conn).await)?;
        state.remember_users(&users);
        Ok(users)
    }

    pub async fn find_role_by_id(&self, role_id: &EntityKey) -> AppResult<Option<IdentityRole>> {
        role_id.expect_kind(self.tables.role_key)?;
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        on_connection!(self, state, |conn| persister.find_role_by_id(conn, role_id).await)
    }

    pub async fn find_role_by_name(&self, role_name: &str) -> AppResult<Option<IdentityRole>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        on_connection!(self, state, |conn| persister.find_role_by_name(conn, role_name).await)
    }

    pub async fn roles(&self) -> AppResult<Vec<IdentityRole>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        on_connection!(self, state, |conn| persister.list_roles(conn).await)
    }

    pub async fn user_ids_in_role(&self, role_id: &EntityKey) -> AppResult<Vec<EntityKey>> {
        let mut state = self.open_state().await?;
        self.flush_pending(&mut state).await?;
        let persister = self.persister();
        on_connection!(self, state, |conn| persister.user_ids_in_role(conn, role_id).await)
    }
}
