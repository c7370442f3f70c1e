//! Compiled mapping document.
//!
//! A [`MappingDocument`] carries two views of the same mapping:
//! - the object view ([`ClassMapping`]): which member lands in which column
//! - the relational view ([`TableMapping`]): tables with their columns,
//!   primary key, foreign keys and indexes, link tables included
//!
//! Everything is kept in `Vec`s in declaration order so the JSON rendering
//! is byte-identical across runs.

use domain::KeyKind;
use serde::Serialize;

use crate::error::{MappingError, MappingResult};
use crate::model::ColumnType;

// =============================================================================
// Object view
// =============================================================================

/// Key generation strategy of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Generator {
    /// Database assigned (auto-increment)
    Native,
    /// Client generated sequential UUID
    GuidComb,
    /// Assigned by the application
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdMapping {
    pub member: String,
    pub column: String,
    pub key_kind: KeyKind,
    pub generator: Generator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyMapping {
    pub member: String,
    pub column: String,
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    pub not_null: bool,
    pub unique: bool,
    /// Second column holding the offset, when the value is split
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_column: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unique_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManyToOneMapping {
    pub member: String,
    pub target: String,
    pub column: String,
    pub foreign_key: String,
    pub not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    OneToMany,
    ManyToMany,
}

/// How operations on the owner flow to collection elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cascade {
    #[default]
    None,
    /// Saves, updates and deletes flow to elements; removed elements are deleted
    AllDeleteOrphan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionMapping {
    pub member: String,
    pub kind: CollectionKind,
    pub element: String,
    /// Element table for one-to-many, link table for many-to-many
    pub table: String,
    pub key_column: String,
    pub key_foreign_key: String,
    pub key_not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_foreign_key: Option<String>,
    pub inverse: bool,
    pub cascade: Cascade,
    pub on_delete_cascade: bool,
}

/// Object view of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassMapping {
    pub entity: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<IdMapping>,
    /// Members forming a composed id, in key order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub composed_id: Vec<String>,
    pub properties: Vec<PropertyMapping>,
    pub references: Vec<ManyToOneMapping>,
    pub collections: Vec<CollectionMapping>,
}

impl ClassMapping {
    pub fn property(&self, member: &str) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.member == member)
    }

    pub fn reference(&self, member: &str) -> Option<&ManyToOneMapping> {
        self.references.iter().find(|r| r.member == member)
    }

    pub fn collection(&self, member: &str) -> Option<&CollectionMapping> {
        self.collections.iter().find(|c| c.member == member)
    }

    /// Column a scalar, identifier or reference member is stored in
    pub fn column_of(&self, member: &str) -> Option<&str> {
        if let Some(id) = self.id.as_ref().filter(|id| id.member == member) {
            return Some(&id.column);
        }
        self.property(member)
            .map(|p| p.column.as_str())
            .or_else(|| self.reference(member).map(|r| r.column.as_str()))
    }
}

// =============================================================================
// Relational view
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    pub not_null: bool,
    pub unique: bool,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyMapping {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete_cascade: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMapping {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Relational view of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMapping {
    pub name: String,
    pub columns: Vec<ColumnMapping>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyMapping>,
    pub indexes: Vec<IndexMapping>,
}

impl TableMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeyMapping> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexMapping> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Add a column, merging with an existing one of the same name.
    ///
    /// Type, length and auto-increment must agree; not-null and unique are
    /// combined, the stricter setting winning.
    pub fn merge_column(&mut self, column: ColumnMapping) -> MappingResult<()> {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            None => self.columns.push(column),
            Some(existing) => {
                if existing.column_type != column.column_type
                    || existing.length != column.length
                    || existing.auto_increment != column.auto_increment
                {
                    return Err(MappingError::ConflictingColumn {
                        table: self.name.clone(),
                        column: column.name,
                    });
                }
                existing.not_null |= column.not_null;
                existing.unique |= column.unique;
            }
        }
        Ok(())
    }

    /// Add a foreign key. A key over the same columns and referenced table
    /// must carry the same name, and a name may only be used once.
    pub fn merge_foreign_key(&mut self, fk: ForeignKeyMapping) -> MappingResult<()> {
        let same_target = self.foreign_keys.iter_mut().find(|existing| {
            existing.columns == fk.columns && existing.referenced_table == fk.referenced_table
        });
        if let Some(existing) = same_target {
            if existing.name != fk.name {
                return Err(MappingError::ForeignKeyNameCollision {
                    table: self.name.clone(),
                    first: existing.name.clone(),
                    second: fk.name,
                });
            }
            existing.on_delete_cascade |= fk.on_delete_cascade;
            return Ok(());
        }
        if let Some(existing) = self.foreign_keys.iter().find(|e| e.name == fk.name) {
            return Err(MappingError::ForeignKeyNameCollision {
                table: self.name.clone(),
                first: format!("{} ({})", existing.name, existing.columns.join(", ")),
                second: format!("{} ({})", fk.name, fk.columns.join(", ")),
            });
        }
        self.foreign_keys.push(fk);
        Ok(())
    }

    /// Add an index; redeclaring one with the same name must be identical.
    pub fn merge_index(&mut self, index: IndexMapping) -> MappingResult<()> {
        match self.indexes.iter().find(|i| i.name == index.name) {
            None => {
                self.indexes.push(index);
                Ok(())
            }
            Some(existing) if *existing == index => Ok(()),
            Some(_) => Err(MappingError::ConflictingIndex {
                table: self.name.clone(),
                index: index.name,
            }),
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// Compiled mapping for a set of entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingDocument {
    pub classes: Vec<ClassMapping>,
    pub tables: Vec<TableMapping>,
}

impl MappingDocument {
    pub fn class(&self, entity: &str) -> Option<&ClassMapping> {
        self.classes.iter().find(|c| c.entity == entity)
    }

    pub fn table(&self, name: &str) -> Option<&TableMapping> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables ordered so that every table comes after the tables its
    /// foreign keys reference. Self references and cycles keep declaration
    /// order.
    pub fn tables_in_dependency_order(&self) -> Vec<&TableMapping> {
        let mut ordered: Vec<&TableMapping> = Vec::with_capacity(self.tables.len());
        let mut pending: Vec<&TableMapping> = self.tables.iter().collect();

        while !pending.is_empty() {
            let ready = pending.iter().position(|table| {
                table.foreign_keys.iter().all(|fk| {
                    fk.referenced_table == table.name
                        || ordered.iter().any(|t| t.name == fk.referenced_table)
                        || !pending.iter().any(|p| p.name == fk.referenced_table)
                })
            });
            // A cycle: take the first pending table as is.
            let next = ready.unwrap_or(0);
            ordered.push(pending.remove(next));
        }
        ordered
    }

    /// Pretty JSON rendering of the whole document
    pub fn to_json(&self) -> String {
        // Only plain strings, numbers and enums: serialisation cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
