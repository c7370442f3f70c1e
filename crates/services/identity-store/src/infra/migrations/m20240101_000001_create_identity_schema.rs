//! Migration: create the identity tables from the configured mapping.

use sea_orm_migration::prelude::*;

use crate::config::IdentityStoreConfig;
use crate::infra::schema::SchemaExport;
use mapping::MappingDocument;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn identity_document() -> Result<MappingDocument, DbErr> {
    IdentityStoreConfig::from_env()
        .mapping()
        .compile()
        .map_err(|e| DbErr::Custom(e.to_string()))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let document = identity_document()?;
        let export = SchemaExport::new(&document);

        for table in export.create_table_statements() {
            manager.create_table(table).await?;
        }
        for index in export.create_index_statements() {
            manager.create_index(index).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let document = identity_document()?;

        for table in SchemaExport::new(&document).drop_table_statements() {
            manager.drop_table(table).await?;
        }
        Ok(())
    }
}
