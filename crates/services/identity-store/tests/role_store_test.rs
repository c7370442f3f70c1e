//! Role store tests against an in-memory database.

mod support;

use common::AppError;
use domain::{Entity, EntityKey, IdentityRole, IdentityUser, KeyKind};
use identity_store::repository::{RoleRepository, RoleStore, UserRepository, UserStore};

#[tokio::test]
async fn test_create_and_find_role() {
    let factory = support::text_factory().await;
    let store = RoleStore::new(factory.open_session());

    let mut role = IdentityRole::new("Admin");
    store.create(&mut role).await.unwrap();
    store.session().flush().await.unwrap();

    let other = RoleStore::new(factory.open_session());
    let by_id = other.find_by_id(role.id()).await.unwrap().unwrap();
    assert_eq!(by_id, role);
    assert_eq!(by_id.name, "Admin");
    let by_name = other.find_by_name("Admin").await.unwrap().unwrap();
    assert_eq!(by_name, role);
    assert!(other.find_by_name("Nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rename_role() {
    let factory = support::text_factory().await;
    let store = RoleStore::new(factory.open_session());
    store.set_auto_save_changes(true);

    let mut role = IdentityRole::new("Editor");
    store.create(&mut role).await.unwrap();
    role.name = "Editors".to_string();
    store.update(&role).await.unwrap();

    let names: Vec<String> = store
        .roles()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Editors"]);
}

#[tokio::test]
async fn test_delete_role_removes_links() {
    let factory = support::text_factory().await;
    let roles = RoleStore::new(factory.open_session());
    let mut role = IdentityRole::new("Support");
    roles.create(&mut role).await.unwrap();
    roles.session().flush().await.unwrap();

    let users = UserStore::new(factory.open_session());
    let mut user = IdentityUser::new("nina");
    users.create(&mut user).await.unwrap();
    users.add_to_role(&mut user, "Support").await.unwrap();
    users.session().flush().await.unwrap();
    assert_eq!(
        roles.user_ids_in_role(role.id()).await.unwrap(),
        vec![user.id().clone()]
    );

    roles.delete(&role).await.unwrap();
    roles.session().flush().await.unwrap();

    assert!(roles.find_by_id(role.id()).await.unwrap().is_none());
    let reloaded = UserStore::new(factory.open_session())
        .find_by_id(user.id())
        .await
        .unwrap()
        .unwrap();
    assert!(reloaded.roles.is_empty());
}

#[tokio::test]
async fn test_integer_role_keys() {
    let factory = support::int_factory().await;
    let store = RoleStore::new(factory.open_session());

    let mut first = IdentityRole::with_key(KeyKind::Int.default_key(), "One");
    let mut second = IdentityRole::with_key(KeyKind::Int.default_key(), "Two");
    store.create(&mut first).await.unwrap();
    store.create(&mut second).await.unwrap();

    assert!(matches!(first.id(), EntityKey::Int(id) if *id > 0));
    assert_ne!(first.id(), second.id());
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_disposed_role_store() {
    let factory = support::text_factory().await;
    let store = RoleStore::new(factory.open_session());
    store.set_dispose_context(true);
    store.dispose().await;

    let result = store.roles().await;
    assert!(matches!(result, Err(AppError::Disposed("RoleStore"))));
    assert!(!store.session().is_open().await);
}

#[tokio::test]
async fn test_closed_session_rejects_writes() {
    let factory = support::text_factory().await;
    let session = factory.open_session();
    let store = RoleStore::new(session.clone());
    session.close().await;

    let mut role = IdentityRole::new("Late");
    let result = store.create(&mut role).await;
    assert!(matches!(result, Err(AppError::Disposed("Session"))));
}
