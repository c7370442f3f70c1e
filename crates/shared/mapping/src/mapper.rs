//! Convention model mapper.
//!
//! [`ModelMapper`] maps entity models to a [`MappingDocument`] in two layers:
//! the naming conventions first, then any per-class overrides registered with
//! [`ModelMapper::class`]. Overrides are plain data, so a mapper can be cloned
//! and compiled any number of times with identical results.

use crate::conventions::NamingConventions;
use crate::document::{
    Cascade, ClassMapping, CollectionKind, CollectionMapping, ColumnMapping, ForeignKeyMapping,
    Generator, IdMapping, IndexMapping, ManyToOneMapping, MappingDocument, PropertyMapping,
    TableMapping,
};
use crate::error::{MappingError, MappingResult};
use crate::model::{ColumnType, EntityModel, MemberKind};
use common::NamingOptions;
use domain::KeyKind;

// =============================================================================
// Customizers
// =============================================================================

/// Overrides for a scalar property.
#[derive(Debug, Clone, Default)]
pub struct PropertyCustomizer {
    column: Option<String>,
    length: Option<u32>,
    not_null: Option<bool>,
    unique: Option<bool>,
    unique_keys: Vec<String>,
    indexes: Vec<String>,
}

impl PropertyCustomizer {
    pub fn column(&mut self, name: &str) -> &mut Self {
        self.column = Some(name.to_string());
        self
    }

    pub fn length(&mut self, length: u32) -> &mut Self {
        self.length = Some(length);
        self
    }

    pub fn not_null(&mut self, not_null: bool) -> &mut Self {
        self.not_null = Some(not_null);
        self
    }

    /// Single-column unique constraint
    pub fn unique(&mut self, unique: bool) -> &mut Self {
        self.unique = Some(unique);
        self
    }

    /// Named unique key; properties sharing the name form one key
    pub fn unique_key(&mut self, name: &str) -> &mut Self {
        self.unique_keys.push(name.to_string());
        self
    }

    pub fn index(&mut self, name: &str) -> &mut Self {
        self.indexes.push(name.to_string());
        self
    }

    fn apply(&self, mapping: &mut PropertyMapping) {
        if let Some(column) = &self.column {
            mapping.column = column.clone();
        }
        if self.length.is_some() {
            mapping.length = self.length;
        }
        if let Some(not_null) = self.not_null {
            mapping.not_null = not_null;
        }
        if let Some(unique) = self.unique {
            mapping.unique = unique;
        }
        extend_unique(&mut mapping.unique_keys, &self.unique_keys);
        extend_unique(&mut mapping.indexes, &self.indexes);
    }
}

/// Overrides for a many-to-one reference.
#[derive(Debug, Clone, Default)]
pub struct ManyToOneCustomizer {
    column: Option<String>,
    not_null: Option<bool>,
    index: Option<String>,
    foreign_key: Option<String>,
}

impl ManyToOneCustomizer {
    pub fn column(&mut self, name: &str) -> &mut Self {
        self.column = Some(name.to_string());
        self
    }

    pub fn not_null(&mut self, not_null: bool) -> &mut Self {
        self.not_null = Some(not_null);
        self
    }

    pub fn index(&mut self, name: &str) -> &mut Self {
        self.index = Some(name.to_string());
        self
    }

    pub fn foreign_key(&mut self, name: &str) -> &mut Self {
        self.foreign_key = Some(name.to_string());
        self
    }

    fn apply(&self, mapping: &mut ManyToOneMapping) {
        if let Some(column) = &self.column {
            mapping.column = column.clone();
        }
        if let Some(not_null) = self.not_null {
            mapping.not_null = not_null;
        }
        if self.index.is_some() {
            mapping.index = self.index.clone();
        }
        if let Some(fk) = &self.foreign_key {
            mapping.foreign_key = fk.clone();
        }
    }
}

/// Overrides for a collection, its key and, for many-to-many, its element.
#[derive(Debug, Clone, Default)]
pub struct CollectionCustomizer {
    table: Option<String>,
    key_column: Option<String>,
    key_not_null: Option<bool>,
    key_index: Option<String>,
    key_foreign_key: Option<String>,
    element_column: Option<String>,
    element_foreign_key: Option<String>,
    inverse: Option<bool>,
    cascade: Option<Cascade>,
    on_delete_cascade: Option<bool>,
}

impl CollectionCustomizer {
    /// Link table name (many-to-many only)
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    pub fn key_column(&mut self, name: &str) -> &mut Self {
        self.key_column = Some(name.to_string());
        self
    }

    pub fn key_not_null(&mut self, not_null: bool) -> &mut Self {
        self.key_not_null = Some(not_null);
        self
    }

    pub fn key_index(&mut self, name: &str) -> &mut Self {
        self.key_index = Some(name.to_string());
        self
    }

    pub fn key_foreign_key(&mut self, name: &str) -> &mut Self {
        self.key_foreign_key = Some(name.to_string());
        self
    }

    pub fn element_column(&mut self, name: &str) -> &mut Self {
        self.element_column = Some(name.to_string());
        self
    }

    pub fn element_foreign_key(&mut self, name: &str) -> &mut Self {
        self.element_foreign_key = Some(name.to_string());
        self
    }

    pub fn inverse(&mut self, inverse: bool) -> &mut Self {
        self.inverse = Some(inverse);
        self
    }

    pub fn cascade(&mut self, cascade: Cascade) -> &mut Self {
        self.cascade = Some(cascade);
        self
    }

    /// `ON DELETE CASCADE` on the key foreign key
    pub fn on_delete_cascade(&mut self) -> &mut Self {
        self.on_delete_cascade = Some(true);
        self
    }

    fn apply(&self, mapping: &mut CollectionMapping) {
        if let Some(table) = &self.table {
            mapping.table = table.clone();
        }
        if let Some(column) = &self.key_column {
            mapping.key_column = column.clone();
        }
        if let Some(not_null) = self.key_not_null {
            mapping.key_not_null = not_null;
        }
        if self.key_index.is_some() {
            mapping.key_index = self.key_index.clone();
        }
        if let Some(fk) = &self.key_foreign_key {
            mapping.key_foreign_key = fk.clone();
        }
        if self.element_column.is_some() {
            mapping.element_column = self.element_column.clone();
        }
        if self.element_foreign_key.is_some() {
            mapping.element_foreign_key = self.element_foreign_key.clone();
        }
        if let Some(inverse) = self.inverse {
            mapping.inverse = inverse;
        }
        if let Some(cascade) = self.cascade {
            mapping.cascade = cascade;
        }
        if let Some(on_delete) = self.on_delete_cascade {
            mapping.on_delete_cascade = on_delete;
        }
    }
}

/// Overrides registered for one entity.
#[derive(Debug, Clone)]
pub struct ClassCustomizer {
    entity: String,
    table: Option<String>,
    composed_id: Option<Vec<String>>,
    properties: Vec<(String, PropertyCustomizer)>,
    references: Vec<(String, ManyToOneCustomizer)>,
    collections: Vec<(String, CollectionCustomizer)>,
}

impl ClassCustomizer {
    fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            table: None,
            composed_id: None,
            properties: Vec::new(),
            references: Vec::new(),
            collections: Vec::new(),
        }
    }

    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    /// Replace the identifier by a key made of the given members, in order
    pub fn composed_id(&mut self, members: &[&str]) -> &mut Self {
        self.composed_id = Some(members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn property(&mut self, member: &str, f: impl FnOnce(&mut PropertyCustomizer)) -> &mut Self {
        f(entry(&mut self.properties, member));
        self
    }

    pub fn many_to_one(
        &mut self,
        member: &str,
        f: impl FnOnce(&mut ManyToOneCustomizer),
    ) -> &mut Self {
        f(entry(&mut self.references, member));
        self
    }

    pub fn collection(
        &mut self,
        member: &str,
        f: impl FnOnce(&mut CollectionCustomizer),
    ) -> &mut Self {
        f(entry(&mut self.collections, member));
        self
    }

    fn validate(&self, model: &EntityModel) -> MappingResult<()> {
        let check = |member: &str,
                     expected: &'static str,
                     ok: fn(&MemberKind) -> bool|
         -> MappingResult<()> {
            let found = model
                .mapped_members()
                .find(|m| m.name == member)
                .ok_or_else(|| MappingError::UnknownMember {
                    entity: model.name.clone(),
                    member: member.to_string(),
                })?;
            if ok(&found.kind) {
                Ok(())
            } else {
                Err(MappingError::MemberKindMismatch {
                    entity: model.name.clone(),
                    member: member.to_string(),
                    expected,
                })
            }
        };

        for (member, _) in &self.properties {
            check(member.as_str(), "property", |k| matches!(k, MemberKind::Property { .. }))?;
        }
        for (member, _) in &self.references {
            check(member.as_str(), "many-to-one reference", |k| {
                matches!(k, MemberKind::ManyToOne { .. })
            })?;
        }
        for (member, _) in &self.collections {
            check(member.as_str(), "collection", |k| {
                matches!(k, MemberKind::OneToMany { .. } | MemberKind::ManyToMany { .. })
            })?;
        }
        for member in self.composed_id.iter().flatten() {
            check(member.as_str(), "property or many-to-one reference", |k| {
                matches!(k, MemberKind::Property { .. } | MemberKind::ManyToOne { .. })
            })?;
        }
        Ok(())
    }
}

fn entry<'a, T: Default>(items: &'a mut Vec<(String, T)>, member: &str) -> &'a mut T {
    let pos = match items.iter().position(|(name, _)| name == member) {
        Some(pos) => pos,
        None => {
            items.push((member.to_string(), T::default()));
            items.len() - 1
        }
    };
    &mut items[pos].1
}

fn extend_unique(target: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !target.contains(name) {
            target.push(name.clone());
        }
    }
}

// =============================================================================
// Mapper
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ModelMapper {
    conventions: NamingConventions,
    classes: Vec<ClassCustomizer>,
    split_date_time_offset: bool,
}

impl ModelMapper {
    pub fn new(options: NamingOptions) -> Self {
        Self {
            conventions: NamingConventions::new(options),
            classes: Vec::new(),
            split_date_time_offset: false,
        }
    }

    pub fn conventions(&self) -> &NamingConventions {
        &self.conventions
    }

    /// Store date-time-offset properties in two columns: the UTC instant
    /// under the property's column and the offset in minutes beside it.
    /// For databases without a native offset-aware timestamp (e.g. SQLite).
    pub fn split_date_time_offset(&mut self) -> &mut Self {
        self.split_date_time_offset = true;
        self
    }

    /// Register overrides for `entity`. Repeated calls for the same entity
    /// accumulate; a later setting replaces an earlier one.
    pub fn class(&mut self, entity: &str, f: impl FnOnce(&mut ClassCustomizer)) -> &mut Self {
        let pos = match self.classes.iter().position(|c| c.entity == entity) {
            Some(pos) => pos,
            None => {
                self.classes.push(ClassCustomizer::new(entity));
                self.classes.len() - 1
            }
        };
        f(&mut self.classes[pos]);
        self
    }

    /// Compile the mapping for `entities`.
    ///
    /// Abstract entities are skipped. Fails as a whole on the first
    /// configuration error.
    pub fn compile_mapping_for(&self, entities: &[EntityModel]) -> MappingResult<MappingDocument> {
        let roots: Vec<&EntityModel> = entities.iter().filter(|e| !e.is_abstract).collect();
        if roots.is_empty() {
            return Err(MappingError::EmptyEntitySet);
        }

        for customizer in &self.classes {
            let model = find_root(&roots, &customizer.entity, "class override")?;
            customizer.validate(model)?;
        }

        let classes = roots
            .iter()
            .map(|model| self.map_class(model, &roots))
            .collect::<MappingResult<Vec<_>>>()?;
        let tables = build_tables(&classes)?;

        tracing::debug!(
            classes = classes.len(),
            tables = tables.len(),
            "Compiled mapping"
        );

        Ok(MappingDocument { classes, tables })
    }

    fn customizer(&self, entity: &str) -> Option<&ClassCustomizer> {
        self.classes.iter().find(|c| c.entity == entity)
    }

    fn table_of(&self, model: &EntityModel) -> String {
        self.customizer(&model.name)
            .and_then(|c| c.table.clone())
            .unwrap_or_else(|| self.conventions.table_name(&model.name))
    }

    fn map_class(&self, model: &EntityModel, roots: &[&EntityModel]) -> MappingResult<ClassMapping> {
        let conventions = &self.conventions;
        let customizer = self.customizer(&model.name);
        let composed_id = customizer
            .and_then(|c| c.composed_id.clone())
            .unwrap_or_default();

        let id = if composed_id.is_empty() {
            let (member, kind) = model
                .id_member()
                .ok_or_else(|| MappingError::MissingIdentifier(model.name.clone()))?;
            Some(IdMapping {
                member: member.name.clone(),
                column: conventions.column_name(&member.name),
                key_kind: kind,
                generator: conventions.generator(kind),
                length: (kind == KeyKind::Text)
                    .then(|| conventions.string_id_length(member.attributes.declared_length())),
            })
        } else {
            None
        };

        let mut properties = Vec::new();
        let mut references = Vec::new();
        let mut collections = Vec::new();

        for member in model.mapped_members() {
            match &member.kind {
                MemberKind::Id(_) => {}
                MemberKind::Property {
                    column_type,
                    nullable,
                } => {
                    let attrs = &member.attributes;
                    let mut mapping = PropertyMapping {
                        member: member.name.clone(),
                        column: conventions.column_name(&member.name),
                        column_type: *column_type,
                        length: (*column_type == ColumnType::Text)
                            .then(|| conventions.string_length(attrs.declared_length())),
                        not_null: conventions.is_not_null(*nullable, attrs.required),
                        unique: false,
                        offset_column: None,
                        unique_keys: Vec::new(),
                        indexes: Vec::new(),
                    };
                    for index in &attrs.indexes {
                        let name =
                            conventions.index_name(&model.name, index.name(), index.is_unique());
                        if index.is_unique() {
                            extend_unique(&mut mapping.unique_keys, &[name]);
                        } else {
                            extend_unique(&mut mapping.indexes, &[name]);
                        }
                    }
                    if let Some((_, c)) = customizer
                        .and_then(|c| c.properties.iter().find(|(m, _)| *m == member.name))
                    {
                        c.apply(&mut mapping);
                    }
                    if self.split_date_time_offset
                        && mapping.column_type == ColumnType::DateTimeOffset
                    {
                        mapping.column_type = ColumnType::DateTime;
                        mapping.offset_column =
                            Some(conventions.offset_column_name(&mapping.column));
                    }
                    properties.push(mapping);
                }
                MemberKind::ManyToOne { target } => {
                    find_root(roots, target, &model.name)?;
                    let column = conventions.foreign_key_column(&member.name);
                    let mut mapping = ManyToOneMapping {
                        member: member.name.clone(),
                        target: target.clone(),
                        foreign_key: conventions.foreign_key_name(&model.name, &column),
                        column,
                        not_null: member.attributes.required,
                        index: None,
                    };
                    if let Some((_, c)) = customizer
                        .and_then(|c| c.references.iter().find(|(m, _)| *m == member.name))
                    {
                        c.apply(&mut mapping);
                    }
                    references.push(mapping);
                }
                MemberKind::OneToMany { element } => {
                    let element_model = find_root(roots, element, &model.name)?;
                    let back_reference = element_model
                        .first_reference_to(&model.name)
                        .map(|m| m.name.as_str());
                    let key_column = conventions.collection_key_column(&model.name, back_reference);
                    let mut mapping = CollectionMapping {
                        member: member.name.clone(),
                        kind: CollectionKind::OneToMany,
                        element: element.clone(),
                        table: self.table_of(element_model),
                        key_foreign_key: conventions.foreign_key_name(element, &key_column),
                        key_column,
                        key_not_null: false,
                        key_index: None,
                        element_column: None,
                        element_foreign_key: None,
                        inverse: false,
                        cascade: Cascade::None,
                        on_delete_cascade: false,
                    };
                    if let Some((_, c)) = customizer
                        .and_then(|c| c.collections.iter().find(|(m, _)| *m == member.name))
                    {
                        // The element table is fixed by the element's own mapping.
                        let table = mapping.table.clone();
                        c.apply(&mut mapping);
                        mapping.table = table;
                    }
                    collections.push(mapping);
                }
                MemberKind::ManyToMany { element } => {
                    find_root(roots, element, &model.name)?;
                    let link = conventions.link_table_name(&model.name, element);
                    let key_column = conventions.collection_key_column(&model.name, None);
                    let element_column = conventions.element_column(element);
                    let mut mapping = CollectionMapping {
                        member: member.name.clone(),
                        kind: CollectionKind::ManyToMany,
                        element: element.clone(),
                        key_foreign_key: conventions.foreign_key_name(&link, &key_column),
                        element_foreign_key: Some(
                            conventions.foreign_key_name(&link, &element_column),
                        ),
                        table: link,
                        key_column,
                        key_not_null: true,
                        key_index: None,
                        element_column: Some(element_column),
                        inverse: false,
                        cascade: Cascade::None,
                        on_delete_cascade: false,
                    };
                    if let Some((_, c)) = customizer
                        .and_then(|c| c.collections.iter().find(|(m, _)| *m == member.name))
                    {
                        c.apply(&mut mapping);
                    }
                    collections.push(mapping);
                }
            }
        }

        Ok(ClassMapping {
            entity: model.name.clone(),
            table: self.table_of(model),
            id,
            composed_id,
            properties,
            references,
            collections,
        })
    }
}

fn find_root<'a>(
    roots: &[&'a EntityModel],
    entity: &str,
    referenced_by: &str,
) -> MappingResult<&'a EntityModel> {
    roots
        .iter()
        .copied()
        .find(|e| e.name == entity)
        .ok_or_else(|| MappingError::UnknownEntity {
            entity: entity.to_string(),
            referenced_by: referenced_by.to_string(),
        })
}

// =============================================================================
// Relational view
// =============================================================================

/// Table, column, type and length of an entity's simple identifier.
struct KeyTarget {
    table: String,
    column: String,
    column_type: ColumnType,
    length: Option<u32>,
}

fn key_target(classes: &[ClassMapping], entity: &str, referenced_by: &str) -> MappingResult<KeyTarget> {
    let class = classes
        .iter()
        .find(|c| c.entity == entity)
        .ok_or_else(|| MappingError::UnknownEntity {
            entity: entity.to_string(),
            referenced_by: referenced_by.to_string(),
        })?;
    let id = class
        .id
        .as_ref()
        .ok_or_else(|| MappingError::CompositeKeyReference {
            entity: entity.to_string(),
            referenced_by: referenced_by.to_string(),
        })?;
    Ok(KeyTarget {
        table: class.table.clone(),
        column: id.column.clone(),
        column_type: ColumnType::for_key(id.key_kind),
        length: id.length,
    })
}

fn key_column(name: &str, target: &KeyTarget, not_null: bool) -> ColumnMapping {
    ColumnMapping {
        name: name.to_string(),
        column_type: target.column_type,
        length: target.length,
        not_null,
        unique: false,
        auto_increment: false,
    }
}

fn foreign_key(name: &str, column: &str, target: &KeyTarget, on_delete_cascade: bool) -> ForeignKeyMapping {
    ForeignKeyMapping {
        name: name.to_string(),
        columns: vec![column.to_string()],
        referenced_table: target.table.clone(),
        referenced_columns: vec![target.column.clone()],
        on_delete_cascade,
    }
}

fn single_index(name: &str, column: &str) -> IndexMapping {
    IndexMapping {
        name: name.to_string(),
        columns: vec![column.to_string()],
        unique: false,
    }
}

fn class_table(class: &ClassMapping, classes: &[ClassMapping]) -> MappingResult<TableMapping> {
    let mut table = TableMapping::new(&class.table);

    if let Some(id) = &class.id {
        table.merge_column(ColumnMapping {
            name: id.column.clone(),
            column_type: ColumnType::for_key(id.key_kind),
            length: id.length,
            not_null: true,
            unique: false,
            auto_increment: id.generator == Generator::Native,
        })?;
        table.primary_key = vec![id.column.clone()];
    }

    // Attribute and override indexes, grouped by name in declaration order.
    let mut grouped: Vec<IndexMapping> = Vec::new();
    for property in &class.properties {
        table.merge_column(ColumnMapping {
            name: property.column.clone(),
            column_type: property.column_type,
            length: property.length,
            not_null: property.not_null,
            unique: property.unique,
            auto_increment: false,
        })?;
        if let Some(offset) = &property.offset_column {
            table.merge_column(ColumnMapping {
                name: offset.clone(),
                column_type: ColumnType::Int,
                length: None,
                not_null: property.not_null,
                unique: false,
                auto_increment: false,
            })?;
        }
        let names = property
            .unique_keys
            .iter()
            .map(|n| (n, true))
            .chain(property.indexes.iter().map(|n| (n, false)));
        for (name, unique) in names {
            match grouped.iter_mut().find(|i| &i.name == name) {
                Some(index) if index.unique == unique => index.columns.push(property.column.clone()),
                Some(_) => {
                    return Err(MappingError::ConflictingIndex {
                        table: class.table.clone(),
                        index: name.clone(),
                    })
                }
                None => grouped.push(IndexMapping {
                    name: name.clone(),
                    columns: vec![property.column.clone()],
                    unique,
                }),
            }
        }
    }

    for reference in &class.references {
        let target = key_target(classes, &reference.target, &class.entity)?;
        table.merge_column(key_column(&reference.column, &target, reference.not_null))?;
        table.merge_foreign_key(foreign_key(
            &reference.foreign_key,
            &reference.column,
            &target,
            false,
        ))?;
        if let Some(index) = &reference.index {
            table.merge_index(single_index(index, &reference.column))?;
        }
    }

    if !class.composed_id.is_empty() {
        let mut pk = Vec::with_capacity(class.composed_id.len());
        for member in &class.composed_id {
            let column = class
                .column_of(member)
                .ok_or_else(|| MappingError::UnknownMember {
                    entity: class.entity.clone(),
                    member: member.clone(),
                })?
                .to_string();
            if let Some(c) = table.columns.iter_mut().find(|c| c.name == column) {
                c.not_null = true;
            }
            pk.push(column);
        }
        table.primary_key = pk;
    }

    for index in grouped {
        table.merge_index(index)?;
    }
    Ok(table)
}

fn build_tables(classes: &[ClassMapping]) -> MappingResult<Vec<TableMapping>> {
    let mut tables: Vec<TableMapping> = Vec::new();
    for class in classes {
        if tables.iter().any(|t| t.name == class.table) {
            return Err(MappingError::DuplicateTable(class.table.clone()));
        }
        tables.push(class_table(class, classes)?);
    }
    let class_tables = tables.len();

    for class in classes {
        for collection in &class.collections {
            let owner = key_target(classes, &class.entity, &collection.element)?;
            match collection.kind {
                CollectionKind::OneToMany => {
                    let table = tables
                        .iter_mut()
                        .find(|t| t.name == collection.table)
                        .ok_or_else(|| MappingError::UnknownEntity {
                            entity: collection.element.clone(),
                            referenced_by: class.entity.clone(),
                        })?;
                    table.merge_column(key_column(
                        &collection.key_column,
                        &owner,
                        collection.key_not_null,
                    ))?;
                    table.merge_foreign_key(foreign_key(
                        &collection.key_foreign_key,
                        &collection.key_column,
                        &owner,
                        collection.on_delete_cascade,
                    ))?;
                    if let Some(index) = &collection.key_index {
                        table.merge_index(single_index(index, &collection.key_column))?;
                    }
                }
                CollectionKind::ManyToMany => {
                    let element = key_target(classes, &collection.element, &class.entity)?;
                    if tables[..class_tables]
                        .iter()
                        .any(|t| t.name == collection.table)
                    {
                        return Err(MappingError::DuplicateTable(collection.table.clone()));
                    }
                    let pos = match tables.iter().position(|t| t.name == collection.table) {
                        Some(pos) => pos,
                        None => {
                            tables.push(TableMapping::new(&collection.table));
                            tables.len() - 1
                        }
                    };
                    let link = &mut tables[pos];

                    let element_column = collection
                        .element_column
                        .clone()
                        .unwrap_or_else(|| element.column.clone());
                    link.merge_column(key_column(&collection.key_column, &owner, true))?;
                    link.merge_column(key_column(&element_column, &element, true))?;
                    if link.primary_key.is_empty() {
                        link.primary_key = vec![collection.key_column.clone(), element_column.clone()];
                    }
                    link.merge_foreign_key(foreign_key(
                        &collection.key_foreign_key,
                        &collection.key_column,
                        &owner,
                        collection.on_delete_cascade,
                    ))?;
                    if let Some(fk) = &collection.element_foreign_key {
                        link.merge_foreign_key(foreign_key(fk, &element_column, &element, false))?;
                    }
                    if let Some(index) = &collection.key_index {
                        link.merge_index(single_index(index, &collection.key_column))?;
                    }
                }
            }
        }
    }
    Ok(tables)
}
