//! Static entity model tables.
//!
//! An [`EntityModel`] lists the members of one entity type together with
//! their declared attributes. Models are built once from static declarations
//! and handed to the mapper; nothing is discovered at runtime.

use domain::KeyKind;
use serde::Serialize;

use crate::attributes::PropertyAttributes;

/// Storage type of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Bool,
    Int,
    BigInt,
    Text,
    DateTime,
    /// Instant together with the offset it was recorded in
    DateTimeOffset,
    Uuid,
}

impl ColumnType {
    /// Column type holding keys of the given kind
    pub fn for_key(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Int => ColumnType::Int,
            KeyKind::Text => ColumnType::Text,
            KeyKind::Uuid => ColumnType::Uuid,
        }
    }
}

/// What a member is, from the mapper's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// Surrogate identifier
    Id(KeyKind),
    /// Scalar value; `nullable` is true for reference or optional types
    Property { column_type: ColumnType, nullable: bool },
    /// Reference to one instance of `target`
    ManyToOne { target: String },
    /// Owned collection of `element`, linked by a key column on its table
    OneToMany { element: String },
    /// Collection of `element` linked through a link table
    ManyToMany { element: String },
}

impl MemberKind {
    pub fn describe(&self) -> &'static str {
        match self {
            MemberKind::Id(_) => "identifier",
            MemberKind::Property { .. } => "property",
            MemberKind::ManyToOne { .. } => "many-to-one reference",
            MemberKind::OneToMany { .. } => "one-to-many collection",
            MemberKind::ManyToMany { .. } => "many-to-many collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberModel {
    pub name: String,
    pub kind: MemberKind,
    pub attributes: PropertyAttributes,
}

impl MemberModel {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: PropertyAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: PropertyAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Metadata of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    pub name: String,
    /// Abstract types are never mapped as root entities
    pub is_abstract: bool,
    pub members: Vec<MemberModel>,
}

impl EntityModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            members: Vec::new(),
        }
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn member(mut self, member: MemberModel) -> Self {
        self.members.push(member);
        self
    }

    /// Identifier member named `Id`
    pub fn id(self, kind: KeyKind) -> Self {
        self.member(MemberModel::new("Id", MemberKind::Id(kind)))
    }

    /// Identifier member named `Id` with attributes (e.g. a declared length)
    pub fn id_with(self, kind: KeyKind, attributes: PropertyAttributes) -> Self {
        self.member(MemberModel::new("Id", MemberKind::Id(kind)).with_attributes(attributes))
    }

    /// String property; strings admit null unless marked required
    pub fn text(self, name: &str, attributes: PropertyAttributes) -> Self {
        self.member(
            MemberModel::new(
                name,
                MemberKind::Property {
                    column_type: ColumnType::Text,
                    nullable: true,
                },
            )
            .with_attributes(attributes),
        )
    }

    /// Non-nullable value property
    pub fn value(self, name: &str, column_type: ColumnType) -> Self {
        self.member(MemberModel::new(
            name,
            MemberKind::Property {
                column_type,
                nullable: false,
            },
        ))
    }

    /// Optional value property
    pub fn optional(self, name: &str, column_type: ColumnType) -> Self {
        self.member(MemberModel::new(
            name,
            MemberKind::Property {
                column_type,
                nullable: true,
            },
        ))
    }

    pub fn many_to_one(self, name: &str, target: &str) -> Self {
        self.member(MemberModel::new(
            name,
            MemberKind::ManyToOne {
                target: target.to_string(),
            },
        ))
    }

    pub fn one_to_many(self, name: &str, element: &str) -> Self {
        self.member(MemberModel::new(
            name,
            MemberKind::OneToMany {
                element: element.to_string(),
            },
        ))
    }

    pub fn many_to_many(self, name: &str, element: &str) -> Self {
        self.member(MemberModel::new(
            name,
            MemberKind::ManyToMany {
                element: element.to_string(),
            },
        ))
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberModel> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Mapped members, skipping those marked not-mapped
    pub fn mapped_members(&self) -> impl Iterator<Item = &MemberModel> {
        self.members.iter().filter(|m| !m.attributes.not_mapped)
    }

    /// Identifier member and its key kind, if the entity declares one
    pub fn id_member(&self) -> Option<(&MemberModel, KeyKind)> {
        self.mapped_members().find_map(|m| match m.kind {
            MemberKind::Id(kind) => Some((m, kind)),
            _ => None,
        })
    }

    /// First many-to-one member pointing at `target`
    pub fn first_reference_to(&self, target: &str) -> Option<&MemberModel> {
        self.mapped_members().find(|m| {
            matches!(&m.kind, MemberKind::ManyToOne { target: t } if t == target)
        })
    }
}
