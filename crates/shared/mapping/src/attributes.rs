//! Declarative metadata attached to entity members.
//!
//! These are the static counterparts of the length, required, not-mapped and
//! index annotations the naming conventions read.

use serde::Serialize;

use crate::error::{MappingError, MappingResult};

/// A named, optionally unique index on a property.
///
/// Properties of one entity that carry an index with the same name form a
/// single multi-column index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexAttribute {
    name: String,
    unique: bool,
}

impl IndexAttribute {
    /// Fails with [`MappingError::BlankIndexName`] when `name` is blank.
    pub fn new(name: impl Into<String>, unique: bool) -> MappingResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MappingError::BlankIndexName);
        }
        Ok(Self { name, unique })
    }

    pub fn index(name: impl Into<String>) -> MappingResult<Self> {
        Self::new(name, false)
    }

    pub fn unique(name: impl Into<String>) -> MappingResult<Self> {
        Self::new(name, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Attributes declared on one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// Declared maximum length; zero means "not declared"
    pub string_length: u32,
    pub required: bool,
    pub not_mapped: bool,
    pub indexes: Vec<IndexAttribute>,
}

impl PropertyAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string_length(mut self, length: u32) -> Self {
        self.string_length = length;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn with_index(mut self, index: IndexAttribute) -> Self {
        self.indexes.push(index);
        self
    }

    /// Declared length, if one greater than zero was given
    pub fn declared_length(&self) -> Option<u32> {
        (self.string_length > 0).then_some(self.string_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_index_name_is_rejected() {
        assert_eq!(IndexAttribute::index(""), Err(MappingError::BlankIndexName));
        assert_eq!(IndexAttribute::unique("   "), Err(MappingError::BlankIndexName));
        assert_eq!(IndexAttribute::new("\t\n", false), Err(MappingError::BlankIndexName));
    }

    #[test]
    fn test_index_attribute() {
        let idx = IndexAttribute::unique("Email").unwrap();
        assert_eq!(idx.name(), "Email");
        assert!(idx.is_unique());
        assert!(!IndexAttribute::index("Email").unwrap().is_unique());
    }

    #[test]
    fn test_zero_length_is_not_declared() {
        assert_eq!(PropertyAttributes::new().declared_length(), None);
        assert_eq!(PropertyAttributes::new().string_length(8).declared_length(), Some(8));
    }
}
