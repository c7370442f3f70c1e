//! DDL generated from a compiled mapping document.

use domain::MAX_SIZE_FOR_LENGTH_LIMITED_STRING;
use mapping::{ColumnMapping, ColumnType, MappingDocument, TableMapping};
use sea_orm::sea_query::{
    Alias, ColumnDef, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement, Table,
    TableCreateStatement, TableDropStatement,
};
use sea_orm::{ConnectionTrait, DbBackend, DbErr};

/// Creates and drops the tables of a mapping document.
pub struct SchemaExport<'a> {
    document: &'a MappingDocument,
}

fn column_def(column: &ColumnMapping, sole_primary_key: bool) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(&column.name));
    match column.column_type {
        ColumnType::Bool => def.boolean(),
        ColumnType::Int => def.integer(),
        ColumnType::BigInt => def.big_integer(),
        ColumnType::Text => match column.length {
            Some(length) if length <= MAX_SIZE_FOR_LENGTH_LIMITED_STRING => def.string_len(length),
            _ => def.text(),
        },
        ColumnType::DateTime | ColumnType::DateTimeOffset => def.timestamp_with_time_zone(),
        ColumnType::Uuid => def.uuid(),
    };

    if column.not_null || sole_primary_key {
        def.not_null();
    } else {
        def.null();
    }
    if sole_primary_key {
        def.primary_key();
    }
    if column.auto_increment {
        def.auto_increment();
    }
    if column.unique && !sole_primary_key {
        def.unique_key();
    }
    def
}

fn create_table(table: &TableMapping) -> TableCreateStatement {
    let sole_key = match table.primary_key.as_slice() {
        [single] => Some(single.as_str()),
        _ => None,
    };

    let mut stmt = Table::create();
    stmt.table(Alias::new(&table.name)).if_not_exists();

    for column in &table.columns {
        let mut def = column_def(column, sole_key == Some(column.name.as_str()));
        stmt.col(&mut def);
    }

    if table.primary_key.len() > 1 {
        let mut key = Index::create();
        key.name(format!("PK_{}", table.name));
        for column in &table.primary_key {
            key.col(Alias::new(column));
        }
        stmt.primary_key(&mut key);
    }

    for fk in &table.foreign_keys {
        let mut foreign_key = ForeignKey::create();
        foreign_key
            .name(&fk.name)
            .from_tbl(Alias::new(&table.name))
            .to_tbl(Alias::new(&fk.referenced_table));
        for column in &fk.columns {
            foreign_key.from_col(Alias::new(column));
        }
        for column in &fk.referenced_columns {
            foreign_key.to_col(Alias::new(column));
        }
        if fk.on_delete_cascade {
            foreign_key.on_delete(ForeignKeyAction::Cascade);
        }
        stmt.foreign_key(&mut foreign_key);
    }

    stmt
}

fn create_indexes(table: &TableMapping) -> Vec<IndexCreateStatement> {
    table
        .indexes
        .iter()
        .map(|index| {
            let mut stmt = Index::create();
            stmt.name(&index.name)
                .table(Alias::new(&table.name))
                .if_not_exists();
            for column in &index.columns {
                stmt.col(Alias::new(column));
            }
            if index.unique {
                stmt.unique();
            }
            stmt
        })
        .collect()
}

impl<'a> SchemaExport<'a> {
    pub fn new(document: &'a MappingDocument) -> Self {
        Self { document }
    }

    /// Table creation, referenced tables first
    pub fn create_table_statements(&self) -> Vec<TableCreateStatement> {
        self.document
            .tables_in_dependency_order()
            .into_iter()
            .map(create_table)
            .collect()
    }

    pub fn create_index_statements(&self) -> Vec<IndexCreateStatement> {
        self.document
            .tables_in_dependency_order()
            .into_iter()
            .flat_map(create_indexes)
            .collect()
    }

    /// Table removal, referencing tables first
    pub fn drop_table_statements(&self) -> Vec<TableDropStatement> {
        self.document
            .tables_in_dependency_order()
            .into_iter()
            .rev()
            .map(|table| Table::drop().table(Alias::new(&table.name)).if_exists().to_owned())
            .collect()
    }

    /// Full creation script for `backend`, one statement per entry.
    pub fn create_script(&self, backend: DbBackend) -> Vec<String> {
        let tables = self
            .create_table_statements()
            .into_iter()
            .map(|stmt| backend.build(&stmt).to_string());
        let indexes = self
            .create_index_statements()
            .into_iter()
            .map(|stmt| backend.build(&stmt).to_string());
        tables.chain(indexes).collect()
    }

    pub fn drop_script(&self, backend: DbBackend) -> Vec<String> {
        self.drop_table_statements()
            .into_iter()
            .map(|stmt| backend.build(&stmt).to_string())
            .collect()
    }

    /// Create every table and index.
    pub async fn create<C: ConnectionTrait>(&self, conn: &C) -> Result<(), DbErr> {
        let backend = conn.get_database_backend();
        for stmt in self.create_table_statements() {
            conn.execute(backend.build(&stmt)).await?;
        }
        for stmt in self.create_index_statements() {
            conn.execute(backend.build(&stmt)).await?;
        }
        tracing::info!(tables = self.document.tables.len(), "Identity schema created");
        Ok(())
    }

    /// Drop every table.
    pub async fn drop<C: ConnectionTrait>(&self, conn: &C) -> Result<(), DbErr> {
        let backend = conn.get_database_backend();
        for stmt in self.drop_table_statements() {
            conn.execute(backend.build(&stmt)).await?;
        }
        tracing::info!(tables = self.document.tables.len(), "Identity schema dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping::IdentityMapping;

    fn script(backend: DbBackend) -> Vec<String> {
        let doc = IdentityMapping::default().compile().unwrap();
        SchemaExport::new(&doc).create_script(backend)
    }

    #[test]
    fn test_create_script_orders_tables_by_dependency() {
        let script = script(DbBackend::Postgres);
        let position = |needle: &str| {
            script
                .iter()
                .position(|s| s.starts_with("CREATE TABLE") && s.contains(needle))
                .unwrap()
        };

        assert!(position("\"Users\"") < position("\"UserLogins\""));
        assert!(position("\"Roles\"") < position("\"UserRoles\""));
    }

    #[test]
    fn test_create_script_names_constraints() {
        let script = script(DbBackend::Postgres).join(";\n");

        assert!(script.contains("\"FK_UserLogins_Users_UserId\""));
        assert!(script.contains("\"FK_UserRoles_Roles_RoleId\""));
        assert!(script.contains("ON DELETE CASCADE"));
        assert!(script.contains("CREATE UNIQUE INDEX IF NOT EXISTS \"UX_Users_UserName\""));
        assert!(script.contains("\"PK_UserLogins\""));
    }

    #[test]
    fn test_long_strings_become_text() {
        let script = script(DbBackend::Postgres).join(";\n");

        assert!(script.contains("\"ClaimType\" text"));
        assert!(script.contains("\"UserName\" varchar(256) NOT NULL"));
    }

    #[test]
    fn test_drop_script_reverses_order() {
        let doc = IdentityMapping::default().compile().unwrap();
        let script = SchemaExport::new(&doc).drop_script(DbBackend::Postgres);

        assert_eq!(script.len(), 5);
        assert!(script[0].contains("\"UserRoles\""));
        assert!(script[4].contains("\"Users\""));
    }

    #[test]
    fn test_split_date_time_offset_adds_offset_column() {
        use mapping::{MemberKind, MemberModel};

        let doc = IdentityMapping::default()
            .extend_user(MemberModel::new(
                "LastSeen",
                MemberKind::Property {
                    column_type: ColumnType::DateTimeOffset,
                    nullable: true,
                },
            ))
            .customize(|mapper| {
                mapper.split_date_time_offset();
            })
            .compile()
            .unwrap();
        let script = SchemaExport::new(&doc).create_script(DbBackend::Postgres).join(";\n");

        assert!(script.contains("\"LastSeen\" timestamp with time zone"));
        assert!(script.contains("\"LastSeenOffset\" integer"));
    }
}
