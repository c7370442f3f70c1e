//! Unit of Work over a session transaction.
//!
//! A unit of work moves through three states:
//! - `NotStarted`: `begin()` opens a session transaction
//! - `Active`: `commit()` flushes and commits, `cancel()` rolls back
//! - `Ended`: only `cancel()` is still accepted
//!
//! `cancel()` rolls back whenever the session holds a transaction, whatever
//! the state, and is a no-op otherwise.
//!
//! Commit and cancel always release the transaction before returning,
//! including on failure.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use common::{AppError, AppResult};

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    NotStarted,
    Active,
    Ended,
}

/// Unit of Work trait for dependency injection.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Open a transaction on the session.
    async fn begin(&self) -> AppResult<()>;

    /// Flush pending writes and commit.
    async fn commit(&self) -> AppResult<()>;

    /// Roll back, discarding pending writes.
    async fn cancel(&self) -> AppResult<()>;

    async fn state(&self) -> UnitOfWorkState;
}

/// Unit of work bound to one session
pub struct SessionUnitOfWork {
    session: Arc<Session>,
    state: Mutex<UnitOfWorkState>,
}

impl SessionUnitOfWork {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Mutex::new(UnitOfWorkState::NotStarted),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

#[async_trait]
impl UnitOfWork for SessionUnitOfWork {
    async fn begin(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if *state != UnitOfWorkState::NotStarted {
            return Err(AppError::invalid_operation(
                "the unit of work has already begun",
            ));
        }
        self.session.begin_transaction().await?;
        *state = UnitOfWorkState::Active;
        Ok(())
    }

    async fn commit(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if *state != UnitOfWorkState::Active {
            return Err(AppError::invalid_operation(
                "there is no transaction to commit; the unit of work has not begun or has already ended",
            ));
        }
        *state = UnitOfWorkState::Ended;

        // The session transaction may already have been ended directly.
        if !self.session.is_transaction_active().await {
            return Ok(());
        }
        self.session.commit().await
    }

    async fn cancel(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let was_active = *state == UnitOfWorkState::Active;
        if was_active {
            *state = UnitOfWorkState::Ended;
        }

        // A transaction opened directly on the session is rolled back too.
        if !was_active && !self.session.is_transaction_active().await {
            return Ok(());
        }
        if let Err(e) = self.session.rollback().await {
            tracing::error!("Transaction rollback failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    async fn state(&self) -> UnitOfWorkState {
        *self.state.lock().await
    }
}
