//! Identity mapping assembly.
//!
//! Declares the static models of the four identity entities and the
//! overrides that reproduce the Entity Framework identity schema on top of
//! the naming conventions: fixed table names, the `UserRoles` link table,
//! `UserId`/`RoleId` key columns and the EF foreign key and index names.

use std::fmt;
use std::sync::Arc;

use common::NamingOptions;
use domain::constants::{
    DEFAULT_FOREIGN_KEY_NAME_PREFIX, DEFAULT_STRING_LENGTH, IDENTITY_NAME_LENGTH,
    LOGIN_KEY_LENGTH, ROLE_ID_COLUMN, USER_ID_COLUMN,
};
use domain::KeyKind;

use crate::attributes::PropertyAttributes;
use crate::document::{Cascade, MappingDocument};
use crate::error::MappingResult;
use crate::mapper::ModelMapper;
use crate::model::{ColumnType, EntityModel, MemberModel};

pub const USER_ENTITY: &str = "IdentityUser";
pub const ROLE_ENTITY: &str = "IdentityRole";
pub const LOGIN_ENTITY: &str = "IdentityUserLogin";
pub const CLAIM_ENTITY: &str = "IdentityUserClaim";

/// Member names of the identity entities.
pub mod members {
    pub const ID: &str = "Id";
    pub const USER_NAME: &str = "UserName";
    pub const EMAIL: &str = "Email";
    pub const EMAIL_CONFIRMED: &str = "EmailConfirmed";
    pub const PASSWORD_HASH: &str = "PasswordHash";
    pub const SECURITY_STAMP: &str = "SecurityStamp";
    pub const PHONE_NUMBER: &str = "PhoneNumber";
    pub const PHONE_NUMBER_CONFIRMED: &str = "PhoneNumberConfirmed";
    pub const TWO_FACTOR_ENABLED: &str = "TwoFactorEnabled";
    pub const LOCKOUT_END_DATE_UTC: &str = "LockoutEndDateUtc";
    pub const LOCKOUT_ENABLED: &str = "LockoutEnabled";
    pub const ACCESS_FAILED_COUNT: &str = "AccessFailedCount";
    pub const ROLES: &str = "Roles";
    pub const CLAIMS: &str = "Claims";
    pub const LOGINS: &str = "Logins";
    pub const NAME: &str = "Name";
    pub const USERS: &str = "Users";
    pub const LOGIN_PROVIDER: &str = "LoginProvider";
    pub const PROVIDER_KEY: &str = "ProviderKey";
    pub const USER: &str = "User";
    pub const CLAIM_TYPE: &str = "ClaimType";
    pub const CLAIM_VALUE: &str = "ClaimValue";
}

use members::*;

type Customization = Arc<dyn Fn(&mut ModelMapper) + Send + Sync>;

/// Builds the identity mapping for a choice of user and role key kinds.
#[derive(Clone)]
pub struct IdentityMapping {
    naming: NamingOptions,
    user_key: KeyKind,
    role_key: KeyKind,
    table_prefix: String,
    user_members: Vec<MemberModel>,
    entities: Vec<EntityModel>,
    customizations: Vec<Customization>,
}

impl fmt::Debug for IdentityMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMapping")
            .field("naming", &self.naming)
            .field("user_key", &self.user_key)
            .field("role_key", &self.role_key)
            .field("table_prefix", &self.table_prefix)
            .field("user_members", &self.user_members.len())
            .field("entities", &self.entities.len())
            .field("customizations", &self.customizations.len())
            .finish()
    }
}

impl Default for IdentityMapping {
    fn default() -> Self {
        Self::new(NamingOptions::default())
    }
}

impl IdentityMapping {
    /// Text user and role keys, no table prefix.
    pub fn new(naming: NamingOptions) -> Self {
        Self {
            naming,
            user_key: KeyKind::Text,
            role_key: KeyKind::Text,
            table_prefix: String::new(),
            user_members: Vec::new(),
            entities: Vec::new(),
            customizations: Vec::new(),
        }
    }

    pub fn with_user_key(mut self, kind: KeyKind) -> Self {
        self.user_key = kind;
        self
    }

    pub fn with_role_key(mut self, kind: KeyKind) -> Self {
        self.role_key = kind;
        self
    }

    /// Prefix for every identity table, e.g. `AspNet` for `AspNetUsers`
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Add an application-specific member to the user entity
    pub fn extend_user(mut self, member: MemberModel) -> Self {
        self.user_members.push(member);
        self
    }

    /// Map an additional application entity alongside the identity ones
    pub fn with_entity(mut self, entity: EntityModel) -> Self {
        self.entities.push(entity);
        self
    }

    /// Register overrides applied after the identity ones
    pub fn customize(mut self, f: impl Fn(&mut ModelMapper) + Send + Sync + 'static) -> Self {
        self.customizations.push(Arc::new(f));
        self
    }

    pub fn user_key(&self) -> KeyKind {
        self.user_key
    }

    pub fn role_key(&self) -> KeyKind {
        self.role_key
    }

    pub fn users_table(&self) -> String {
        format!("{}Users", self.table_prefix)
    }

    pub fn roles_table(&self) -> String {
        format!("{}Roles", self.table_prefix)
    }

    pub fn logins_table(&self) -> String {
        format!("{}UserLogins", self.table_prefix)
    }

    pub fn claims_table(&self) -> String {
        format!("{}UserClaims", self.table_prefix)
    }

    pub fn user_roles_table(&self) -> String {
        format!("{}UserRoles", self.table_prefix)
    }

    // =========================================================================
    // Models
    // =========================================================================

    pub fn user_model(&self) -> EntityModel {
        let mut model = EntityModel::new(USER_ENTITY)
            .id(self.user_key)
            .text(USER_NAME, PropertyAttributes::new())
            .text(EMAIL, PropertyAttributes::new())
            .value(EMAIL_CONFIRMED, ColumnType::Bool)
            .text(PASSWORD_HASH, PropertyAttributes::new())
            .text(SECURITY_STAMP, PropertyAttributes::new())
            .text(PHONE_NUMBER, PropertyAttributes::new())
            .value(PHONE_NUMBER_CONFIRMED, ColumnType::Bool)
            .value(TWO_FACTOR_ENABLED, ColumnType::Bool)
            .optional(LOCKOUT_END_DATE_UTC, ColumnType::DateTime)
            .value(LOCKOUT_ENABLED, ColumnType::Bool)
            .value(ACCESS_FAILED_COUNT, ColumnType::Int)
            .many_to_many(ROLES, ROLE_ENTITY)
            .one_to_many(CLAIMS, CLAIM_ENTITY)
            .one_to_many(LOGINS, LOGIN_ENTITY);
        model.members.extend(self.user_members.iter().cloned());
        model
    }

    pub fn login_model(&self) -> EntityModel {
        EntityModel::new(LOGIN_ENTITY)
            .text(LOGIN_PROVIDER, PropertyAttributes::new())
            .text(PROVIDER_KEY, PropertyAttributes::new())
            .many_to_one(USER, USER_ENTITY)
    }

    pub fn role_model(&self) -> EntityModel {
        EntityModel::new(ROLE_ENTITY)
            .id(self.role_key)
            .text(NAME, PropertyAttributes::new())
            .many_to_many(USERS, USER_ENTITY)
    }

    pub fn claim_model(&self) -> EntityModel {
        EntityModel::new(CLAIM_ENTITY)
            .id(KeyKind::Int)
            .text(CLAIM_TYPE, PropertyAttributes::new())
            .text(CLAIM_VALUE, PropertyAttributes::new())
            .many_to_one(USER, USER_ENTITY)
    }

    /// All entities to compile, identity ones first
    pub fn entities(&self) -> Vec<EntityModel> {
        let mut entities = vec![
            self.user_model(),
            self.login_model(),
            self.role_model(),
            self.claim_model(),
        ];
        entities.extend(self.entities.iter().cloned());
        entities
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    fn foreign_key(child: &str, parent: &str, column: &str) -> String {
        format!("{DEFAULT_FOREIGN_KEY_NAME_PREFIX}{child}_{parent}_{column}")
    }

    /// Mapper with the identity overrides and any registered customisations
    pub fn mapper(&self) -> ModelMapper {
        let users = self.users_table();
        let roles = self.roles_table();
        let logins = self.logins_table();
        let claims = self.claims_table();
        let user_roles = self.user_roles_table();

        let login_user_fk = Self::foreign_key(&logins, &users, USER_ID_COLUMN);
        let claim_user_fk = Self::foreign_key(&claims, &users, USER_ID_COLUMN);
        let link_user_fk = Self::foreign_key(&user_roles, &users, USER_ID_COLUMN);
        let link_role_fk = Self::foreign_key(&user_roles, &roles, ROLE_ID_COLUMN);

        let mut mapper = ModelMapper::new(self.naming.clone());

        mapper.class(USER_ENTITY, |c| {
            c.table(&users);
            c.property(USER_NAME, |m| {
                m.length(IDENTITY_NAME_LENGTH)
                    .not_null(true)
                    .unique_key("UX_Users_UserName");
            });
            c.property(EMAIL, |m| {
                m.length(IDENTITY_NAME_LENGTH);
            });
            c.collection(LOGINS, |m| {
                m.key_column(USER_ID_COLUMN)
                    .on_delete_cascade()
                    .key_foreign_key(&login_user_fk)
                    .inverse(true)
                    .cascade(Cascade::AllDeleteOrphan);
            });
            c.collection(ROLES, |m| {
                m.table(&user_roles)
                    .key_column(USER_ID_COLUMN)
                    .key_not_null(true)
                    .key_index("IX_UserRoles_UserId")
                    .key_foreign_key(&link_user_fk)
                    .inverse(false)
                    .element_column(ROLE_ID_COLUMN)
                    .element_foreign_key(&link_role_fk);
            });
            c.collection(CLAIMS, |m| {
                m.key_column(USER_ID_COLUMN)
                    .on_delete_cascade()
                    .key_foreign_key(&claim_user_fk)
                    .inverse(true)
                    .cascade(Cascade::AllDeleteOrphan);
            });
        });

        mapper.class(LOGIN_ENTITY, |c| {
            c.table(&logins);
            c.composed_id(&[LOGIN_PROVIDER, PROVIDER_KEY, USER]);
            c.property(LOGIN_PROVIDER, |m| {
                m.length(LOGIN_KEY_LENGTH);
            });
            c.property(PROVIDER_KEY, |m| {
                m.length(LOGIN_KEY_LENGTH);
            });
            c.many_to_one(USER, |m| {
                m.column(USER_ID_COLUMN)
                    .index("IX_Logins_UserId")
                    .foreign_key(&login_user_fk);
            });
        });

        mapper.class(ROLE_ENTITY, |c| {
            c.table(&roles);
            c.property(NAME, |m| {
                m.length(IDENTITY_NAME_LENGTH).not_null(true).unique(true);
            });
            c.collection(USERS, |m| {
                m.table(&user_roles)
                    .key_column(ROLE_ID_COLUMN)
                    .key_not_null(true)
                    .key_index("IX_UserRoles_RoleId")
                    .key_foreign_key(&link_role_fk)
                    .inverse(true)
                    .element_column(USER_ID_COLUMN)
                    .element_foreign_key(&link_user_fk);
            });
        });

        mapper.class(CLAIM_ENTITY, |c| {
            c.table(&claims);
            c.many_to_one(USER, |m| {
                m.column(USER_ID_COLUMN)
                    .not_null(true)
                    .index("IX_UserClaims_UserId")
                    .foreign_key(&claim_user_fk);
            });
            c.property(CLAIM_TYPE, |m| {
                m.length(DEFAULT_STRING_LENGTH);
            });
            c.property(CLAIM_VALUE, |m| {
                m.length(DEFAULT_STRING_LENGTH);
            });
        });

        for customization in &self.customizations {
            customization(&mut mapper);
        }
        mapper
    }

    /// Compile the identity mapping
    pub fn compile(&self) -> MappingResult<MappingDocument> {
        self.mapper().compile_mapping_for(&self.entities())
    }
}
