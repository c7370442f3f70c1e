//! Mapping configuration errors.
//!
//! Every error here is raised while declaring or compiling a mapping, never
//! while reading or writing data. Compilation fails as a whole on the first
//! one found.

use common::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Index name cannot be null or whitespace")]
    BlankIndexName,

    #[error("No entities to map")]
    EmptyEntitySet,

    #[error("Entity {entity} referenced by {referenced_by} is not part of the mapped entity set")]
    UnknownEntity { entity: String, referenced_by: String },

    #[error("Entity {entity} has no member named {member}")]
    UnknownMember { entity: String, member: String },

    #[error("Member {entity}.{member} is not a {expected}")]
    MemberKindMismatch {
        entity: String,
        member: String,
        expected: &'static str,
    },

    #[error("Entity {0} has neither an identifier nor a composed id")]
    MissingIdentifier(String),

    #[error("Entity {entity} cannot be referenced by {referenced_by}: it has a composed id")]
    CompositeKeyReference { entity: String, referenced_by: String },

    #[error("Table {0} is mapped more than once")]
    DuplicateTable(String),

    #[error("Column {table}.{column} is declared with conflicting definitions")]
    ConflictingColumn { table: String, column: String },

    #[error("Index {index} on table {table} is declared with conflicting definitions")]
    ConflictingIndex { table: String, index: String },

    #[error("Foreign key on table {table} is declared as both {first} and {second}")]
    ForeignKeyNameCollision {
        table: String,
        first: String,
        second: String,
    },
}

pub type MappingResult<T> = Result<T, MappingError>;

impl From<MappingError> for AppError {
    fn from(err: MappingError) -> Self {
        AppError::Configuration(err.to_string())
    }
}
