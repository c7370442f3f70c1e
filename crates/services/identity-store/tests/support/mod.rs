//! Shared fixtures: an in-memory SQLite database with the identity schema.

#![allow(dead_code)]

use common::NamingOptions;
use domain::KeyKind;
use identity_store::infra::{SchemaExport, SessionFactory};
use mapping::IdentityMapping;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// One pooled connection keeps the in-memory database alive and shared.
pub async fn memory_database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    Database::connect(options).await.unwrap()
}

pub async fn factory_for(mapping: IdentityMapping) -> SessionFactory {
    let db = memory_database().await;
    let document = mapping.compile().unwrap();
    SchemaExport::new(&document).create(&db).await.unwrap();
    SessionFactory::new(db, document).unwrap()
}

/// Text user and role keys
pub async fn text_factory() -> SessionFactory {
    factory_for(IdentityMapping::new(NamingOptions::default())).await
}

/// Database-generated integer user and role keys
pub async fn int_factory() -> SessionFactory {
    factory_for(
        IdentityMapping::new(NamingOptions::default())
            .with_user_key(KeyKind::Int)
            .with_role_key(KeyKind::Int),
    )
    .await
}
