//! Domain-level constants.
//!
//! These values describe the target identity schema and the defaults of the
//! naming conventions.

// =============================================================================
// Naming conventions
// =============================================================================

/// Suffix appended to a property or type name to form a foreign key column
pub const DEFAULT_FOREIGN_KEY_COLUMN_SUFFIX: &str = "Id";

/// Prefix placed before a foreign key constraint name
pub const DEFAULT_FOREIGN_KEY_NAME_PREFIX: &str = "FK_";

/// Token inserted between the two table names of a many-to-many link table
pub const DEFAULT_MANY_TO_MANY_LINK_TABLE_INSERT: &str = "To";

/// Largest length SQL Server accepts for a length-limited string column
pub const MAX_SIZE_FOR_LENGTH_LIMITED_STRING: u32 = 4000;

/// Default length for string columns: one past the limit, i.e. `MAX`
pub const DEFAULT_STRING_LENGTH: u32 = MAX_SIZE_FOR_LENGTH_LIMITED_STRING + 1;

/// Default length for string primary keys
pub const DEFAULT_STRING_ID_LENGTH: u32 = 128;

// =============================================================================
// Identity schema
// =============================================================================

/// Length of user names, emails and role names
pub const IDENTITY_NAME_LENGTH: u32 = 256;

/// Length of the login provider and provider key columns
pub const LOGIN_KEY_LENGTH: u32 = 128;

/// Foreign key column referencing the user table
pub const USER_ID_COLUMN: &str = "UserId";

/// Foreign key column referencing the role table
pub const ROLE_ID_COLUMN: &str = "RoleId";
