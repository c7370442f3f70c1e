//! Naming conventions.
//!
//! Pure functions from entity and member names to schema names. Given the
//! same [`NamingOptions`] they always produce the same names, which is what
//! keeps repeated mapping runs byte-identical.

use common::NamingOptions;
use domain::KeyKind;

use crate::document::Generator;

// =============================================================================
// Pluralisation
// =============================================================================

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Replace the last `suffix_len` bytes of `word` by `replacement`, keeping the
/// case of the first replaced letter.
fn replace_suffix(word: &str, suffix_len: usize, replacement: &str) -> String {
    let stem = &word[..word.len() - suffix_len];
    let first_upper = word[stem.len()..]
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase());
    let mut out = String::with_capacity(stem.len() + replacement.len());
    out.push_str(stem);
    let mut chars = replacement.chars();
    if let Some(first) = chars.next() {
        if first_upper {
            out.extend(first.to_uppercase());
        } else {
            out.push(first);
        }
        out.extend(chars);
    }
    out
}

/// English plural of a (PascalCase) type name.
///
/// Only the trailing word is inflected: `UserLogin` becomes `UserLogins`,
/// `TestAddress` becomes `TestAddresses`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();

    // Whole-word rules apply to the trailing PascalCase segment only.
    let tail_start = word
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_uppercase())
        .map_or(0, |(i, _)| i);
    let tail = &lower[tail_start..];
    if UNCOUNTABLE.contains(&tail) {
        return word.to_string();
    }
    if let Some((singular, plural)) = IRREGULAR.iter().find(|(s, _)| *s == tail) {
        return replace_suffix(word, singular.len(), plural);
    }

    let mut rev = lower.chars().rev();
    let last = rev.next().unwrap_or_default();
    let before_last = rev.next();

    if matches!(last, 's' | 'x' | 'z') || lower.ends_with("sh") || lower.ends_with("ch") {
        return format!("{word}es");
    }
    if last == 'y' && before_last.is_some_and(|c| !is_vowel(c)) {
        return replace_suffix(word, 1, "ies");
    }
    if lower.ends_with("fe") {
        return replace_suffix(word, 2, "ves");
    }
    if lower.ends_with("lf") || lower.ends_with("rf") {
        return replace_suffix(word, 1, "ves");
    }
    format!("{word}s")
}

// =============================================================================
// Conventions
// =============================================================================

/// Naming conventions configured by [`NamingOptions`].
#[derive(Debug, Clone, Default)]
pub struct NamingConventions {
    options: NamingOptions,
}

impl NamingConventions {
    pub fn new(options: NamingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NamingOptions {
        &self.options
    }

    /// Table of an entity: its pluralised type name
    pub fn table_name(&self, entity: &str) -> String {
        pluralize(entity)
    }

    /// Column of a scalar member: the member name
    pub fn column_name(&self, member: &str) -> String {
        member.to_string()
    }

    /// Offset column of a split date-time-offset value
    pub fn offset_column_name(&self, column: &str) -> String {
        format!("{}Offset", column)
    }

    /// Foreign key column of a reference: member name plus suffix
    pub fn foreign_key_column(&self, member: &str) -> String {
        format!("{}{}", member, self.options.foreign_key_column_suffix)
    }

    /// Foreign key constraint name: prefix, table, underscore, column
    pub fn foreign_key_name(&self, table: &str, column: &str) -> String {
        format!("{}{}_{}", self.options.foreign_key_name_prefix, table, column)
    }

    /// Link table for a many-to-many between two types: both names
    /// pluralised, sorted, and joined by the link-table insert
    pub fn link_table_name(&self, a: &str, b: &str) -> String {
        let mut sides = [pluralize(a), pluralize(b)];
        sides.sort();
        sides.join(&self.options.many_to_many_link_table_insert)
    }

    /// Key column of a collection on the element side.
    ///
    /// One-to-many collections use the element's back reference to the
    /// owner when it has one; otherwise the owner's type name is used.
    pub fn collection_key_column(&self, owner: &str, back_reference: Option<&str>) -> String {
        match back_reference {
            Some(reference) => self.foreign_key_column(reference),
            None => self.foreign_key_column(owner),
        }
    }

    /// Element column of a many-to-many link table: element type plus suffix
    pub fn element_column(&self, element: &str) -> String {
        self.foreign_key_column(element)
    }

    /// Name of an attribute-declared index: `UI_` for unique keys, `IX_`
    /// otherwise, followed by entity and index name
    pub fn index_name(&self, entity: &str, name: &str, unique: bool) -> String {
        if unique {
            format!("UI_{}_{}", entity, name)
        } else {
            format!("IX_{}_{}", entity, name)
        }
    }

    /// Length of a string column
    pub fn string_length(&self, declared: Option<u32>) -> u32 {
        declared.unwrap_or(self.options.default_string_length)
    }

    /// Length of a string primary key
    pub fn string_id_length(&self, declared: Option<u32>) -> u32 {
        declared.unwrap_or(self.options.default_string_id_length)
    }

    /// Key generator for an identifier kind
    pub fn generator(&self, kind: KeyKind) -> Generator {
        match kind {
            KeyKind::Int => Generator::Native,
            KeyKind::Uuid => Generator::GuidComb,
            KeyKind::Text => Generator::Assigned,
        }
    }

    /// Value types are not null unless optional; anything marked required is
    /// not null
    pub fn is_not_null(&self, nullable: bool, required: bool) -> bool {
        !nullable || required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("User"), "Users");
        assert_eq!(pluralize("Role"), "Roles");
        assert_eq!(pluralize("UserLogin"), "UserLogins");
        assert_eq!(pluralize("UserClaim"), "UserClaims");
        assert_eq!(pluralize("TestAddress"), "TestAddresses");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Branch"), "Branches");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Key"), "Keys");
        assert_eq!(pluralize("Status"), "Statuses");
        assert_eq!(pluralize("SalesPerson"), "SalesPeople");
        assert_eq!(pluralize("Child"), "Children");
        assert_eq!(pluralize("Knife"), "Knives");
        assert_eq!(pluralize("Shelf"), "Shelves");
        assert_eq!(pluralize("Equipment"), "Equipment");
        assert_eq!(pluralize("Price"), "Prices");
        assert_eq!(pluralize(""), "");
    }

    #[test]
    fn test_foreign_key_names() {
        let c = NamingConventions::default();
        assert_eq!(c.foreign_key_column("User"), "UserId");
        assert_eq!(c.foreign_key_name("TestAddress", "UserId"), "FK_TestAddress_UserId");
    }

    #[test]
    fn test_link_table_is_sorted() {
        let c = NamingConventions::default();
        assert_eq!(c.link_table_name("TestUser", "TestCar"), "TestCarsToTestUsers");
        assert_eq!(c.link_table_name("TestCar", "TestUser"), "TestCarsToTestUsers");
    }

    #[test]
    fn test_collection_key_column() {
        let c = NamingConventions::default();
        assert_eq!(c.collection_key_column("TestUser", Some("Owner")), "OwnerId");
        assert_eq!(c.collection_key_column("TestUser", None), "TestUserId");
    }

    #[test]
    fn test_index_names() {
        let c = NamingConventions::default();
        assert_eq!(c.index_name("TestCar", "Reg", true), "UI_TestCar_Reg");
        assert_eq!(c.index_name("TestCar", "Reg", false), "IX_TestCar_Reg");
    }

    #[test]
    fn test_lengths_and_generators() {
        let c = NamingConventions::default();
        assert_eq!(c.string_length(None), 4001);
        assert_eq!(c.string_length(Some(8)), 8);
        assert_eq!(c.string_id_length(None), 128);
        assert_eq!(c.generator(KeyKind::Int), Generator::Native);
        assert_eq!(c.generator(KeyKind::Uuid), Generator::GuidComb);
        assert_eq!(c.generator(KeyKind::Text), Generator::Assigned);
    }

    #[test]
    fn test_custom_options() {
        let c = NamingConventions::new(NamingOptions {
            foreign_key_column_suffix: "_id".to_string(),
            foreign_key_name_prefix: "fk_".to_string(),
            many_to_many_link_table_insert: "_".to_string(),
            ..NamingOptions::default()
        });
        assert_eq!(c.foreign_key_column("Owner"), "Owner_id");
        assert_eq!(c.foreign_key_name("Cars", "Owner_id"), "fk_Cars_Owner_id");
        assert_eq!(c.link_table_name("User", "Role"), "Roles_Users");
    }
}
