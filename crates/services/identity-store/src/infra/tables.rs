//! Table and column names of the identity entities, resolved once from a
//! compiled mapping document.
//!
//! The session never guesses a name: everything it writes or reads goes
//! through these structs, so prefixes and convention overrides apply to
//! the SQL exactly as they apply to the schema.

use common::{AppError, AppResult};
use domain::KeyKind;
use mapping::identity::members;
use mapping::{
    ClassMapping, CollectionMapping, MappingDocument, CLAIM_ENTITY, LOGIN_ENTITY, ROLE_ENTITY,
    USER_ENTITY,
};

#[derive(Debug, Clone)]
pub struct UserTable {
    pub name: String,
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmed: String,
    pub password_hash: String,
    pub security_stamp: String,
    pub phone_number: String,
    pub phone_number_confirmed: String,
    pub two_factor_enabled: String,
    pub lockout_end_date_utc: String,
    pub lockout_enabled: String,
    pub access_failed_count: String,
}

#[derive(Debug, Clone)]
pub struct RoleTable {
    pub name: String,
    pub id: String,
    pub role_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginTable {
    pub name: String,
    pub login_provider: String,
    pub provider_key: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct ClaimTable {
    pub name: String,
    pub id: String,
    pub claim_type: String,
    pub claim_value: String,
    pub user_id: String,
}

/// Many-to-many link between users and roles
#[derive(Debug, Clone)]
pub struct UserRoleTable {
    pub name: String,
    pub user_id: String,
    pub role_id: String,
}

/// Resolved names plus the key kinds of users and roles.
#[derive(Debug, Clone)]
pub struct IdentityTables {
    pub user_key: KeyKind,
    pub role_key: KeyKind,
    pub users: UserTable,
    pub roles: RoleTable,
    pub logins: LoginTable,
    pub claims: ClaimTable,
    pub user_roles: UserRoleTable,
}

fn class<'a>(doc: &'a MappingDocument, entity: &str) -> AppResult<&'a ClassMapping> {
    doc.class(entity)
        .ok_or_else(|| AppError::configuration(format!("entity {} is not mapped", entity)))
}

fn column(class: &ClassMapping, member: &str) -> AppResult<String> {
    class.column_of(member).map(str::to_string).ok_or_else(|| {
        AppError::configuration(format!("member {}.{} is not mapped", class.entity, member))
    })
}

fn collection<'a>(class: &'a ClassMapping, member: &str) -> AppResult<&'a CollectionMapping> {
    class.collection(member).ok_or_else(|| {
        AppError::configuration(format!("collection {}.{} is not mapped", class.entity, member))
    })
}

fn key_kind(class: &ClassMapping) -> AppResult<KeyKind> {
    class
        .id
        .as_ref()
        .map(|id| id.key_kind)
        .ok_or_else(|| AppError::configuration(format!("entity {} has no identifier", class.entity)))
}

impl IdentityTables {
    /// Resolve every identity name from `doc`.
    pub fn resolve(doc: &MappingDocument) -> AppResult<Self> {
        let user = class(doc, USER_ENTITY)?;
        let role = class(doc, ROLE_ENTITY)?;
        let login = class(doc, LOGIN_ENTITY)?;
        let claim = class(doc, CLAIM_ENTITY)?;
        let link = collection(user, members::ROLES)?;

        Ok(Self {
            user_key: key_kind(user)?,
            role_key: key_kind(role)?,
            users: UserTable {
                name: user.table.clone(),
                id: column(user, members::ID)?,
                user_name: column(user, members::USER_NAME)?,
                email: column(user, members::EMAIL)?,
                email_confirmed: column(user, members::EMAIL_CONFIRMED)?,
                password_hash: column(user, members::PASSWORD_HASH)?,
                security_stamp: column(user, members::SECURITY_STAMP)?,
                phone_number: column(user, members::PHONE_NUMBER)?,
                phone_number_confirmed: column(user, members::PHONE_NUMBER_CONFIRMED)?,
                two_factor_enabled: column(user, members::TWO_FACTOR_ENABLED)?,
                lockout_end_date_utc: column(user, members::LOCKOUT_END_DATE_UTC)?,
                lockout_enabled: column(user, members::LOCKOUT_ENABLED)?,
                access_failed_count: column(user, members::ACCESS_FAILED_COUNT)?,
            },
            roles: RoleTable {
                name: role.table.clone(),
                id: column(role, members::ID)?,
                role_name: column(role, members::NAME)?,
            },
            logins: LoginTable {
                name: login.table.clone(),
                login_provider: column(login, members::LOGIN_PROVIDER)?,
                provider_key: column(login, members::PROVIDER_KEY)?,
                user_id: column(login, members::USER)?,
            },
            claims: ClaimTable {
                name: claim.table.clone(),
                id: column(claim, members::ID)?,
                claim_type: column(claim, members::CLAIM_TYPE)?,
                claim_value: column(claim, members::CLAIM_VALUE)?,
                user_id: column(claim, members::USER)?,
            },
            user_roles: UserRoleTable {
                name: link.table.clone(),
                user_id: link.key_column.clone(),
                role_id: link.element_column.clone().ok_or_else(|| {
                    AppError::configuration("user roles link has no element column")
                })?,
            },
        })
    }
}
