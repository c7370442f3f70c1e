//! Convention-driven mapping layer.
//!
//! This crate derives relational schema names from static entity models:
//! - `attributes` / `model`: declared entity metadata
//! - `conventions`: pure naming rules
//! - `mapper`: conventions plus per-class overrides, compiled to a document
//! - `identity`: the identity entities mapped to the EF identity schema

pub mod attributes;
pub mod conventions;
pub mod document;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod model;

pub use attributes::{IndexAttribute, PropertyAttributes};
pub use conventions::{pluralize, NamingConventions};
pub use document::{
    Cascade, ClassMapping, CollectionKind, CollectionMapping, ColumnMapping, ForeignKeyMapping,
    Generator, IdMapping, IndexMapping, ManyToOneMapping, MappingDocument, PropertyMapping,
    TableMapping,
};
pub use error::{MappingError, MappingResult};
pub use identity::{IdentityMapping, CLAIM_ENTITY, LOGIN_ENTITY, ROLE_ENTITY, USER_ENTITY};
pub use mapper::{ClassCustomizer, CollectionCustomizer, ManyToOneCustomizer, ModelMapper, PropertyCustomizer};
pub use model::{ColumnType, EntityModel, MemberKind, MemberModel};
