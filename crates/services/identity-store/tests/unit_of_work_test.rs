//! Unit of work tests against an in-memory database.
//!
//! The pool holds a single connection, so nothing outside the unit of work
//! touches the database while its transaction is open.

mod support;

use common::AppError;
use domain::{Entity, IdentityUser};
use identity_store::infra::{SessionUnitOfWork, UnitOfWork, UnitOfWorkState};
use identity_store::repository::{UserRepository, UserStore};

#[tokio::test]
async fn test_commit_persists_writes() {
    let factory = support::text_factory().await;
    let session = factory.open_session();
    let uow = SessionUnitOfWork::new(session.clone());
    let store = UserStore::new(session.clone());

    uow.begin().await.unwrap();
    assert_eq!(uow.state().await, UnitOfWorkState::Active);
    assert!(session.is_transaction_active().await);

    let mut user = IdentityUser::new("olga");
    store.create(&mut user).await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(uow.state().await, UnitOfWorkState::Ended);
    assert!(!session.is_transaction_active().await);
    let found = UserStore::new(factory.open_session())
        .find_by_id(user.id())
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_cancel_discards_flushed_writes() {
    let factory = support::text_factory().await;
    let session = factory.open_session();
    let uow = SessionUnitOfWork::new(session.clone());
    let store = UserStore::new(session.clone());

    uow.begin().await.unwrap();
    let mut user = IdentityUser::new("pete");
    store.create(&mut user).await.unwrap();
    session.flush().await.unwrap();
    // Visible inside the transaction
    assert!(store.find_by_name("pete").await.unwrap().is_some());

    uow.cancel().await.unwrap();

    assert_eq!(uow.state().await, UnitOfWorkState::Ended);
    assert_eq!(session.pending_writes().await, 0);
    assert!(store.find_by_name("pete").await.unwrap().is_none());
}

#[tokio::test]
async fn test_begin_twice_fails() {
    let factory = support::text_factory().await;
    let uow = SessionUnitOfWork::new(factory.open_session());

    uow.begin().await.unwrap();
    assert!(matches!(uow.begin().await, Err(AppError::InvalidOperation(_))));
    uow.cancel().await.unwrap();
}

#[tokio::test]
async fn test_commit_requires_active_unit() {
    let factory = support::text_factory().await;
    let uow = SessionUnitOfWork::new(factory.open_session());

    assert!(matches!(uow.commit().await, Err(AppError::InvalidOperation(_))));

    uow.begin().await.unwrap();
    uow.commit().await.unwrap();
    assert!(matches!(uow.commit().await, Err(AppError::InvalidOperation(_))));
    assert!(matches!(uow.begin().await, Err(AppError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let factory = support::text_factory().await;
    let uow = SessionUnitOfWork::new(factory.open_session());

    // Nothing to cancel yet
    uow.cancel().await.unwrap();
    assert_eq!(uow.state().await, UnitOfWorkState::NotStarted);

    uow.begin().await.unwrap();
    uow.cancel().await.unwrap();
    uow.cancel().await.unwrap();
    assert_eq!(uow.state().await, UnitOfWorkState::Ended);
}

#[tokio::test]
async fn test_cancel_rolls_back_session_transaction() {
    let factory = support::text_factory().await;
    let session = factory.open_session();
    let uow = SessionUnitOfWork::new(session.clone());
    let store = UserStore::new(session.clone());

    // Transaction opened on the session, not through the unit of work
    session.begin_transaction().await.unwrap();
    let mut user = IdentityUser::new("rita");
    store.create(&mut user).await.unwrap();
    session.flush().await.unwrap();

    uow.cancel().await.unwrap();

    assert!(!session.is_transaction_active().await);
    assert_eq!(uow.state().await, UnitOfWorkState::NotStarted);
    assert!(store.find_by_name("rita").await.unwrap().is_none());
}

#[tokio::test]
async fn test_commit_after_direct_session_commit() {
    let factory = support::text_factory().await;
    let session = factory.open_session();
    let uow = SessionUnitOfWork::new(session.clone());

    uow.begin().await.unwrap();
    session.commit().await.unwrap();

    uow.commit().await.unwrap();
    assert_eq!(uow.state().await, UnitOfWorkState::Ended);
}
