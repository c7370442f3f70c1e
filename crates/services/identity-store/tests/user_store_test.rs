//! User store tests against an in-memory database.

mod support;

use chrono::{Duration, TimeZone, Utc};

use common::AppError;
use domain::{Claim, Entity, EntityKey, IdentityRole, IdentityUser, KeyKind, UserLoginInfo};
use identity_store::config::IdentityStoreConfig;
use identity_store::infra::SessionFactory;
use identity_store::repository::{RoleRepository, RoleStore, UserRepository, UserStore};

async fn create_role(factory: &SessionFactory, name: &str) -> IdentityRole {
    let store = RoleStore::new(factory.open_session());
    let mut role = IdentityRole::new(name);
    store.create(&mut role).await.unwrap();
    store.session().flush().await.unwrap();
    role
}

/// Load a user through a fresh session so nothing comes from memory.
async fn reload(factory: &SessionFactory, user_id: &EntityKey) -> Option<IdentityUser> {
    UserStore::new(factory.open_session())
        .find_by_id(user_id)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_user_with_logins() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("alice");
    user.email = Some("alice@example.com".to_string());
    store.create(&mut user).await.unwrap();
    store
        .add_login(&mut user, &UserLoginInfo::new("Google", "g-123"))
        .await
        .unwrap();
    store
        .add_login(&mut user, &UserLoginInfo::new("GitHub", "gh-456"))
        .await
        .unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(loaded, user);
    assert_eq!(loaded.user_name, "alice");
    assert_eq!(loaded.email.as_deref(), Some("alice@example.com"));
    assert_eq!(loaded.logins.len(), 2);
    assert!(loaded.logins.iter().all(|l| &l.user_id == user.id()));
}

#[tokio::test]
async fn test_writes_wait_for_flush_without_auto_save() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("bob");
    store.create(&mut user).await.unwrap();
    assert_eq!(store.session().pending_writes().await, 1);

    store.set_auto_save_changes(true);
    let mut other = IdentityUser::new("carol");
    store.create(&mut other).await.unwrap();
    assert_eq!(store.session().pending_writes().await, 0);
    assert!(reload(&factory, user.id()).await.is_some());
}

#[tokio::test]
async fn test_configured_auto_save_flushes_each_write() {
    let factory = support::text_factory().await;
    let config = IdentityStoreConfig {
        auto_save_changes: true,
        ..IdentityStoreConfig::default()
    };
    let store = config.user_store(factory.open_session());

    let mut user = IdentityUser::new("quinn");
    store.create(&mut user).await.unwrap();
    store
        .add_claim(&mut user, &Claim::new("desk", "4B"))
        .await
        .unwrap();

    assert_eq!(store.session().pending_writes().await, 0);
    assert_eq!(reload(&factory, user.id()).await.unwrap().claims.len(), 1);
}

#[tokio::test]
async fn test_find_by_name_and_email() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("dave");
    user.email = Some("dave@example.com".to_string());
    store.create(&mut user).await.unwrap();

    // Reads see pending writes
    let by_name = store.find_by_name("dave").await.unwrap().unwrap();
    assert_eq!(by_name, user);
    let by_email = store.find_by_email("dave@example.com").await.unwrap().unwrap();
    assert_eq!(by_email, user);

    assert!(store.find_by_name("nobody").await.unwrap().is_none());

    let fresh = UserStore::new(factory.open_session());
    let reloaded = fresh.find_by_name("dave").await.unwrap().unwrap();
    assert_eq!(reloaded.id(), user.id());
    assert_eq!(reloaded.user_name, "dave");
}

#[tokio::test]
async fn test_users_are_listed_by_name() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    for name in ["zoe", "adam", "mia"] {
        let mut user = IdentityUser::new(name);
        store.create(&mut user).await.unwrap();
    }

    let names: Vec<String> = store
        .users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.user_name)
        .collect();
    assert_eq!(names, vec!["adam", "mia", "zoe"]);
}

#[tokio::test]
async fn test_add_and_remove_role() {
    let factory = support::text_factory().await;
    create_role(&factory, "Admin").await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("erin");
    store.create(&mut user).await.unwrap();
    store.add_to_role(&mut user, "Admin").await.unwrap();
    // Adding twice keeps one link
    store.add_to_role(&mut user, "Admin").await.unwrap();
    store.session().flush().await.unwrap();

    let mut loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(store.get_roles(&loaded).unwrap(), vec!["Admin"]);
    assert!(store.is_in_role(&loaded, "Admin").unwrap());

    // Removing a role the user does not hold is a no-op
    store.remove_from_role(&mut loaded, "Editors").await.unwrap();
    store.remove_from_role(&mut loaded, "Admin").await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert!(loaded.roles.is_empty());
    let roles = RoleStore::new(factory.open_session());
    assert!(roles.find_by_name("Admin").await.unwrap().is_some());
}

#[tokio::test]
async fn test_add_to_missing_role_fails() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("frank");
    store.create(&mut user).await.unwrap();

    let result = store.add_to_role(&mut user, "Ghosts").await;
    assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    assert!(user.roles.is_empty());
}

#[tokio::test]
async fn test_claims_round_trip() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("gina");
    store.create(&mut user).await.unwrap();
    let department = Claim::new("department", "engineering");
    store.add_claim(&mut user, &department).await.unwrap();
    store.add_claim(&mut user, &department).await.unwrap();
    store
        .add_claim(&mut user, &Claim::new("level", "senior"))
        .await
        .unwrap();
    store.session().flush().await.unwrap();

    let mut loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(loaded.claims.len(), 3);
    assert!(loaded.claims.iter().all(|c| !c.is_transient()));

    // Removes every matching claim
    store.remove_claim(&mut loaded, &department).await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(store.get_claims(&loaded).unwrap(), vec![Claim::new("level", "senior")]);
}

#[tokio::test]
async fn test_find_by_login() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());

    let login = UserLoginInfo::new("Microsoft", "ms-789");
    let mut user = IdentityUser::new("hank");
    store.create(&mut user).await.unwrap();
    store.add_login(&mut user, &login).await.unwrap();

    let found = store.find_by_login(&login).await.unwrap().unwrap();
    assert_eq!(found, user);
    assert_eq!(store.get_logins(&found).unwrap(), vec![login.clone()]);

    let missing = UserLoginInfo::new("Microsoft", "unknown");
    assert!(store.find_by_login(&missing).await.unwrap().is_none());

    store.remove_login(&mut user, &login).await.unwrap();
    assert!(store.find_by_login(&login).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_user_keeps_roles() {
    let factory = support::text_factory().await;
    let role = create_role(&factory, "Members").await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("ivy");
    store.create(&mut user).await.unwrap();
    store
        .add_login(&mut user, &UserLoginInfo::new("Google", "g-ivy"))
        .await
        .unwrap();
    store
        .add_claim(&mut user, &Claim::new("team", "blue"))
        .await
        .unwrap();
    store
        .add_claim(&mut user, &Claim::new("site", "north"))
        .await
        .unwrap();
    store.add_to_role(&mut user, "Members").await.unwrap();
    store.session().flush().await.unwrap();

    store.delete(&user).await.unwrap();
    store.session().flush().await.unwrap();

    assert!(reload(&factory, user.id()).await.is_none());
    let roles = RoleStore::new(factory.open_session());
    assert!(roles.find_by_id(role.id()).await.unwrap().is_some());
    assert!(roles.user_ids_in_role(role.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lockout_fields_persist() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());
    let lockout_end = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

    let mut user = IdentityUser::new("jack");
    store.create(&mut user).await.unwrap();
    store.set_lockout_enabled(&mut user, true).unwrap();
    store.set_lockout_end_date(&mut user, Some(lockout_end)).unwrap();
    store.increment_access_failed_count(&mut user).unwrap();
    store.set_two_factor_enabled(&mut user, true).unwrap();
    store.update(&user).await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert!(store.get_lockout_enabled(&loaded).unwrap());
    assert_eq!(store.get_lockout_end_date(&loaded).unwrap(), Some(lockout_end));
    assert_eq!(store.get_access_failed_count(&loaded).unwrap(), 1);
    assert!(store.get_two_factor_enabled(&loaded).unwrap());
    assert!(loaded.is_locked_out(lockout_end - Duration::hours(1)));
}

#[tokio::test]
async fn test_update_transient_user_fails() {
    let factory = support::int_factory().await;
    let store = UserStore::new(factory.open_session());

    let user = IdentityUser::with_key(KeyKind::Int.default_key(), "kate");
    let result = store.update(&user).await;
    assert!(matches!(result, Err(AppError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_integer_keys_are_generated() {
    let factory = support::int_factory().await;
    let roles = RoleStore::new(factory.open_session());
    let mut role = IdentityRole::with_key(KeyKind::Int.default_key(), "Staff");
    roles.create(&mut role).await.unwrap();
    assert!(!role.is_transient());

    let store = UserStore::new(factory.open_session());
    let mut user = IdentityUser::with_key(KeyKind::Int.default_key(), "liam");
    store
        .add_login(&mut user, &UserLoginInfo::new("Google", "g-liam"))
        .await
        .unwrap();
    store.create(&mut user).await.unwrap();
    assert!(matches!(user.id(), EntityKey::Int(id) if *id > 0));

    store.add_to_role(&mut user, "Staff").await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(loaded.logins.len(), 1);
    assert_eq!(&loaded.logins[0].user_id, user.id());
    assert_eq!(loaded.role_names(), vec!["Staff"]);
}

#[tokio::test]
async fn test_collections_set_before_create_are_saved() {
    let factory = support::text_factory().await;
    create_role(&factory, "Auditors").await;
    let store = UserStore::new(factory.open_session());

    let mut user = IdentityUser::new("nora");
    assert!(!user.is_transient());
    store
        .add_login(&mut user, &UserLoginInfo::new("Google", "g-nora"))
        .await
        .unwrap();
    store
        .add_claim(&mut user, &Claim::new("region", "west"))
        .await
        .unwrap();
    store.add_to_role(&mut user, "Auditors").await.unwrap();
    // Nothing reaches the session before the user is created
    assert_eq!(store.session().pending_writes().await, 0);

    store.create(&mut user).await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(loaded.logins.len(), 1);
    assert_eq!(store.get_claims(&loaded).unwrap(), vec![Claim::new("region", "west")]);
    assert_eq!(loaded.role_names(), vec!["Auditors"]);
}

#[tokio::test]
async fn test_collections_set_before_create_are_saved_with_integer_keys() {
    let factory = support::int_factory().await;
    let roles = RoleStore::new(factory.open_session());
    let mut role = IdentityRole::with_key(KeyKind::Int.default_key(), "Auditors");
    roles.create(&mut role).await.unwrap();

    let store = UserStore::new(factory.open_session());
    let mut user = IdentityUser::with_key(KeyKind::Int.default_key(), "owen");
    store
        .add_login(&mut user, &UserLoginInfo::new("GitHub", "gh-owen"))
        .await
        .unwrap();
    store
        .add_claim(&mut user, &Claim::new("region", "east"))
        .await
        .unwrap();
    store.add_to_role(&mut user, "Auditors").await.unwrap();

    store.create(&mut user).await.unwrap();
    store.session().flush().await.unwrap();

    let loaded = reload(&factory, user.id()).await.unwrap();
    assert_eq!(loaded.logins.len(), 1);
    assert_eq!(&loaded.claims[0].user_id, user.id());
    assert_eq!(loaded.role_names(), vec!["Auditors"]);
}

#[tokio::test]
async fn test_user_loaded_elsewhere_is_tracked_after_update() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());
    store.set_auto_save_changes(true);
    let mut user = IdentityUser::new("pia");
    store.create(&mut user).await.unwrap();

    // Loaded through another session, so this session does not know it yet
    let other = UserStore::new(factory.open_session());
    let mut detached = reload(&factory, user.id()).await.unwrap();
    other
        .add_claim(&mut detached, &Claim::new("shift", "night"))
        .await
        .unwrap();
    assert!(reload(&factory, user.id()).await.unwrap().claims.is_empty());

    other.update(&detached).await.unwrap();
    other.session().flush().await.unwrap();
    assert_eq!(reload(&factory, user.id()).await.unwrap().claims.len(), 1);
}

#[tokio::test]
async fn test_wrong_key_kind_is_rejected() {
    let factory = support::int_factory().await;
    let store = UserStore::new(factory.open_session());

    let result = store.find_by_id(&EntityKey::from("not-a-number")).await;
    assert!(matches!(result, Err(AppError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_duplicate_user_name_conflicts() {
    let factory = support::text_factory().await;
    let store = UserStore::new(factory.open_session());
    store.set_auto_save_changes(true);

    let mut first = IdentityUser::new("mona");
    store.create(&mut first).await.unwrap();

    let mut second = IdentityUser::new("mona");
    let result = store.create(&mut second).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // The failed flush left nothing behind
    assert_eq!(store.users().await.unwrap().len(), 1);
}
