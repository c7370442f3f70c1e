//! SQL for the identity aggregates.
//!
//! Every statement is built with sea-query against the names in
//! [`IdentityTables`] and runs on any [`ConnectionTrait`], so the same code
//! serves an open transaction and the bare pool.

use sea_orm::sea_query::{Alias, Expr, Order, Query, SelectStatement, SimpleExpr, Value};
use sea_orm::{ConnectionTrait, DbErr, QueryResult};

use common::{AppError, AppResult};
use domain::{
    Claim, Entity, EntityKey, IdentityRole, IdentityUser, IdentityUserClaim, IdentityUserLogin,
    KeyKind, UserLoginInfo,
};

use super::tables::IdentityTables;

/// How a single user is looked up.
#[derive(Debug, Clone, Copy)]
pub(crate) enum UserLookup<'a> {
    Id(&'a EntityKey),
    UserName(&'a str),
    Email(&'a str),
}

fn ident(name: &str) -> Alias {
    Alias::new(name)
}

pub(crate) fn key_value(key: &EntityKey) -> Value {
    match key {
        EntityKey::Int(v) => (*v).into(),
        EntityKey::Text(v) => v.clone().into(),
        EntityKey::Uuid(v) => (*v).into(),
    }
}

fn read_key(row: &QueryResult, column: &str, kind: KeyKind) -> Result<EntityKey, DbErr> {
    Ok(match kind {
        KeyKind::Int => EntityKey::Int(row.try_get("", column)?),
        KeyKind::Text => EntityKey::Text(row.try_get("", column)?),
        KeyKind::Uuid => EntityKey::Uuid(row.try_get("", column)?),
    })
}

/// Plain insert of the given column values.
async fn insert<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    values: Vec<(&str, SimpleExpr)>,
) -> AppResult<()> {
    let backend = conn.get_database_backend();
    let (columns, exprs): (Vec<Alias>, Vec<SimpleExpr>) =
        values.into_iter().map(|(c, v)| (ident(c), v)).unzip();

    let mut stmt = Query::insert();
    stmt.into_table(ident(table))
        .columns(columns)
        .values(exprs)
        .map_err(|e| AppError::internal(e.to_string()))?;

    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Insert into a table with a database generated integer key and return it.
async fn insert_generated<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    id_column: &str,
    values: Vec<(&str, SimpleExpr)>,
) -> AppResult<i32> {
    let backend = conn.get_database_backend();
    let (columns, exprs): (Vec<Alias>, Vec<SimpleExpr>) =
        values.into_iter().map(|(c, v)| (ident(c), v)).unzip();

    let mut stmt = Query::insert();
    stmt.into_table(ident(table))
        .columns(columns)
        .values(exprs)
        .map_err(|e| AppError::internal(e.to_string()))?;

    if backend.support_returning() {
        stmt.returning_col(ident(id_column));
        let row = conn
            .query_one(backend.build(&stmt))
            .await?
            .ok_or_else(|| AppError::internal(format!("insert into {} returned no key", table)))?;
        return Ok(row.try_get("", id_column)?);
    }

    let result = conn.execute(backend.build(&stmt)).await?;
    i32::try_from(result.last_insert_id())
        .map_err(|_| AppError::internal(format!("generated key of {} overflows", table)))
}

async fn delete_where<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    condition: SimpleExpr,
) -> AppResult<u64> {
    let backend = conn.get_database_backend();
    let stmt = Query::delete()
        .from_table(ident(table))
        .and_where(condition)
        .to_owned();
    Ok(conn.execute(backend.build(&stmt)).await?.rows_affected())
}

async fn query_all<C: ConnectionTrait>(conn: &C, stmt: &SelectStatement) -> AppResult<Vec<QueryResult>> {
    let backend = conn.get_database_backend();
    Ok(conn.query_all(backend.build(stmt)).await?)
}

async fn query_one<C: ConnectionTrait>(conn: &C, stmt: &SelectStatement) -> AppResult<Option<QueryResult>> {
    let backend = conn.get_database_backend();
    Ok(conn.query_one(backend.build(stmt)).await?)
}

/// Reads and writes identity aggregates.
pub(crate) struct Persister<'a> {
    tables: &'a IdentityTables,
}

impl<'a> Persister<'a> {
    pub fn new(tables: &'a IdentityTables) -> Self {
        Self { tables }
    }

    // =========================================================================
    // Users
    // =========================================================================

    fn user_values(&self, user: &IdentityUser) -> Vec<(&'a str, SimpleExpr)> {
        let tables: &'a IdentityTables = self.tables;
        let t = &tables.users;
        vec![
            (t.user_name.as_str(), user.user_name.clone().into()),
            (t.email.as_str(), user.email.clone().into()),
            (t.email_confirmed.as_str(), user.email_confirmed.into()),
            (t.password_hash.as_str(), user.password_hash.clone().into()),
            (t.security_stamp.as_str(), user.security_stamp.clone().into()),
            (t.phone_number.as_str(), user.phone_number.clone().into()),
            (t.phone_number_confirmed.as_str(), user.phone_number_confirmed.into()),
            (t.two_factor_enabled.as_str(), user.two_factor_enabled.into()),
            (t.lockout_end_date_utc.as_str(), user.lockout_end_date_utc.into()),
            (t.lockout_enabled.as_str(), user.lockout_enabled.into()),
            (t.access_failed_count.as_str(), user.access_failed_count.into()),
        ]
    }

    fn user_select(&self) -> SelectStatement {
        let t = &self.tables.users;
        Query::select()
            .columns([
                ident(&t.id),
                ident(&t.user_name),
                ident(&t.email),
                ident(&t.email_confirmed),
                ident(&t.password_hash),
                ident(&t.security_stamp),
                ident(&t.phone_number),
                ident(&t.phone_number_confirmed),
                ident(&t.two_factor_enabled),
                ident(&t.lockout_end_date_utc),
                ident(&t.lockout_enabled),
                ident(&t.access_failed_count),
            ])
            .from(ident(&t.name))
            .to_owned()
    }

    fn user_from_row(&self, row: &QueryResult) -> AppResult<IdentityUser> {
        let t = &self.tables.users;
        let key = read_key(row, &t.id, self.tables.user_key)?;
        let mut user = IdentityUser::with_key(key, row.try_get::<String>("", &t.user_name)?);
        user.email = row.try_get("", &t.email)?;
        user.email_confirmed = row.try_get("", &t.email_confirmed)?;
        user.password_hash = row.try_get("", &t.password_hash)?;
        user.security_stamp = row.try_get("", &t.security_stamp)?;
        user.phone_number = row.try_get("", &t.phone_number)?;
        user.phone_number_confirmed = row.try_get("", &t.phone_number_confirmed)?;
        user.two_factor_enabled = row.try_get("", &t.two_factor_enabled)?;
        user.lockout_end_date_utc = row.try_get("", &t.lockout_end_date_utc)?;
        user.lockout_enabled = row.try_get("", &t.lockout_enabled)?;
        user.access_failed_count = row.try_get("", &t.access_failed_count)?;
        Ok(user)
    }

    /// Insert the user row and every child row. Returns the user's key,
    /// generated by the database for a transient integer key.
    pub async fn insert_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &IdentityUser,
    ) -> AppResult<EntityKey> {
        let key = self.insert_user_row(conn, user).await?;
        self.sync_children(conn, &key, user).await?;
        Ok(key)
    }

    /// Insert the user row only.
    pub async fn insert_user_row<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &IdentityUser,
    ) -> AppResult<EntityKey> {
        let t = &self.tables.users;
        let mut values = self.user_values(user);

        if self.tables.user_key == KeyKind::Int && user.is_transient() {
            let id = insert_generated(conn, &t.name, &t.id, values).await?;
            return Ok(EntityKey::Int(id));
        }
        values.insert(0, (t.id.as_str(), key_value(user.id()).into()));
        insert(conn, &t.name, values).await?;
        Ok(user.id().clone())
    }

    /// Update the user row and reconcile its logins, claims and roles.
    pub async fn update_user<C: ConnectionTrait>(&self, conn: &C, user: &IdentityUser) -> AppResult<()> {
        let t = &self.tables.users;
        let backend = conn.get_database_backend();
        let stmt = Query::update()
            .table(ident(&t.name))
            .values(
                self.user_values(user)
                    .into_iter()
                    .map(|(column, value)| (ident(column), value)),
            )
            .and_where(Expr::col(ident(&t.id)).eq(key_value(user.id())))
            .to_owned();

        let result = conn.execute(backend.build(&stmt)).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.sync_children(conn, user.id(), user).await
    }

    /// Delete a user with its claims, logins and role links. Roles stay.
    pub async fn delete_user<C: ConnectionTrait>(&self, conn: &C, user_id: &EntityKey) -> AppResult<()> {
        let key = key_value(user_id);
        let claims = &self.tables.claims;
        let logins = &self.tables.logins;
        let link = &self.tables.user_roles;
        let users = &self.tables.users;

        delete_where(conn, &claims.name, Expr::col(ident(&claims.user_id)).eq(key.clone())).await?;
        delete_where(conn, &logins.name, Expr::col(ident(&logins.user_id)).eq(key.clone())).await?;
        delete_where(conn, &link.name, Expr::col(ident(&link.user_id)).eq(key.clone())).await?;
        delete_where(conn, &users.name, Expr::col(ident(&users.id)).eq(key)).await?;
        Ok(())
    }

    /// First user matching `lookup`, with roles, claims and logins loaded.
    pub async fn find_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        lookup: UserLookup<'_>,
    ) -> AppResult<Option<IdentityUser>> {
        let t = &self.tables.users;
        let condition = match lookup {
            UserLookup::Id(key) => Expr::col(ident(&t.id)).eq(key_value(key)),
            UserLookup::UserName(name) => Expr::col(ident(&t.user_name)).eq(name),
            UserLookup::Email(email) => Expr::col(ident(&t.email)).eq(email),
        };
        let stmt = self.user_select().and_where(condition).limit(1).to_owned();

        match query_one(conn, &stmt).await? {
            Some(row) => {
                let mut user = self.user_from_row(&row)?;
                self.load_children(conn, &mut user).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Key of the user owning a login
    pub async fn find_user_id_by_login<C: ConnectionTrait>(
        &self,
        conn: &C,
        login: &UserLoginInfo,
    ) -> AppResult<Option<EntityKey>> {
        let l = &self.tables.logins;
        let stmt = Query::select()
            .column(ident(&l.user_id))
            .from(ident(&l.name))
            .and_where(Expr::col(ident(&l.login_provider)).eq(login.login_provider.as_str()))
            .and_where(Expr::col(ident(&l.provider_key)).eq(login.provider_key.as_str()))
            .to_owned();

        match query_one(conn, &stmt).await? {
            Some(row) => Ok(Some(read_key(&row, &l.user_id, self.tables.user_key)?)),
            None => Ok(None),
        }
    }

    /// Every user ordered by user name, aggregates loaded
    pub async fn list_users<C: ConnectionTrait>(&self, conn: &C) -> AppResult<Vec<IdentityUser>> {
        let t = &self.tables.users;
        let stmt = self
            .user_select()
            .order_by(ident(&t.user_name), Order::Asc)
            .to_owned();

        let mut users = Vec::new();
        for row in query_all(conn, &stmt).await? {
            let mut user = self.user_from_row(&row)?;
            self.load_children(conn, &mut user).await?;
            users.push(user);
        }
        Ok(users)
    }

    async fn load_children<C: ConnectionTrait>(&self, conn: &C, user: &mut IdentityUser) -> AppResult<()> {
        let user_id = user.id().clone();
        user.roles = self.roles_of(conn, &user_id).await?;
        user.claims = self.claims_of(conn, &user_id).await?;
        user.logins = self.logins_of(conn, &user_id).await?;
        Ok(())
    }

    // =========================================================================
    // Children
    // =========================================================================

    async fn roles_of<C: ConnectionTrait>(&self, conn: &C, user_id: &EntityKey) -> AppResult<Vec<IdentityRole>> {
        let r = &self.tables.roles;
        let l = &self.tables.user_roles;
        let stmt = Query::select()
            .column((ident(&r.name), ident(&r.id)))
            .column((ident(&r.name), ident(&r.role_name)))
            .from(ident(&l.name))
            .inner_join(
                ident(&r.name),
                Expr::col((ident(&l.name), ident(&l.role_id))).equals((ident(&r.name), ident(&r.id))),
            )
            .and_where(Expr::col((ident(&l.name), ident(&l.user_id))).eq(key_value(user_id)))
            .order_by((ident(&r.name), ident(&r.role_name)), Order::Asc)
            .to_owned();

        query_all(conn, &stmt)
            .await?
            .iter()
            .map(|row| self.role_from_row(row))
            .collect()
    }

    async fn claims_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
    ) -> AppResult<Vec<IdentityUserClaim>> {
        let c = &self.tables.claims;
        let stmt = Query::select()
            .columns([ident(&c.id), ident(&c.claim_type), ident(&c.claim_value)])
            .from(ident(&c.name))
            .and_where(Expr::col(ident(&c.user_id)).eq(key_value(user_id)))
            .order_by(ident(&c.id), Order::Asc)
            .to_owned();

        let mut claims = Vec::new();
        for row in query_all(conn, &stmt).await? {
            let claim = Claim::new(
                row.try_get::<String>("", &c.claim_type)?,
                row.try_get::<String>("", &c.claim_value)?,
            );
            let key = EntityKey::Int(row.try_get("", &c.id)?);
            claims.push(IdentityUserClaim::with_key(key, user_id.clone(), &claim));
        }
        Ok(claims)
    }

    async fn logins_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
    ) -> AppResult<Vec<IdentityUserLogin>> {
        let l = &self.tables.logins;
        let stmt = Query::select()
            .columns([ident(&l.login_provider), ident(&l.provider_key)])
            .from(ident(&l.name))
            .and_where(Expr::col(ident(&l.user_id)).eq(key_value(user_id)))
            .order_by(ident(&l.login_provider), Order::Asc)
            .order_by(ident(&l.provider_key), Order::Asc)
            .to_owned();

        let mut logins = Vec::new();
        for row in query_all(conn, &stmt).await? {
            let info = UserLoginInfo::new(
                row.try_get::<String>("", &l.login_provider)?,
                row.try_get::<String>("", &l.provider_key)?,
            );
            logins.push(IdentityUserLogin::new(user_id.clone(), &info));
        }
        Ok(logins)
    }

    async fn sync_children<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
        user: &IdentityUser,
    ) -> AppResult<()> {
        self.sync_logins(conn, user_id, &user.logins).await?;
        self.sync_claims(conn, user_id, &user.claims).await?;
        self.sync_roles(conn, user_id, &user.roles).await
    }

    /// Logins are identified by provider and provider key.
    async fn sync_logins<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
        logins: &[IdentityUserLogin],
    ) -> AppResult<()> {
        let l = &self.tables.logins;
        let stored: Vec<UserLoginInfo> = self
            .logins_of(conn, user_id)
            .await?
            .iter()
            .map(IdentityUserLogin::info)
            .collect();
        let mut wanted: Vec<UserLoginInfo> = Vec::with_capacity(logins.len());
        for login in logins {
            let info = login.info();
            if !wanted.contains(&info) {
                wanted.push(info);
            }
        }

        for info in stored.iter().filter(|info| !wanted.contains(info)) {
            let condition = Expr::col(ident(&l.user_id))
                .eq(key_value(user_id))
                .and(Expr::col(ident(&l.login_provider)).eq(info.login_provider.as_str()))
                .and(Expr::col(ident(&l.provider_key)).eq(info.provider_key.as_str()));
            delete_where(conn, &l.name, condition).await?;
        }
        for info in wanted.iter().filter(|info| !stored.contains(info)) {
            let values = vec![
                (l.login_provider.as_str(), info.login_provider.clone().into()),
                (l.provider_key.as_str(), info.provider_key.clone().into()),
                (l.user_id.as_str(), key_value(user_id).into()),
            ];
            insert(conn, &l.name, values).await?;
        }
        Ok(())
    }

    /// Claims are matched by key; a transient claim takes over a stored row
    /// with the same type and value before a new row is inserted.
    async fn sync_claims<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
        claims: &[IdentityUserClaim],
    ) -> AppResult<()> {
        let c = &self.tables.claims;
        let mut unmatched = self.claims_of(conn, user_id).await?;

        for claim in claims {
            let by_key = if claim.is_transient() {
                None
            } else {
                unmatched.iter().position(|stored| stored.id() == claim.id())
            };
            let position = by_key.or_else(|| {
                unmatched
                    .iter()
                    .position(|stored| stored.matches(&claim.claim()))
            });

            match position {
                Some(index) => {
                    let stored = unmatched.remove(index);
                    if stored.claim() != claim.claim() {
                        let backend = conn.get_database_backend();
                        let stmt = Query::update()
                            .table(ident(&c.name))
                            .values([
                                (ident(&c.claim_type), Expr::value(claim.claim_type.clone())),
                                (ident(&c.claim_value), Expr::value(claim.claim_value.clone())),
                            ])
                            .and_where(Expr::col(ident(&c.id)).eq(key_value(stored.id())))
                            .to_owned();
                        conn.execute(backend.build(&stmt)).await?;
                    }
                }
                None => {
                    let values = vec![
                        (c.claim_type.as_str(), claim.claim_type.clone().into()),
                        (c.claim_value.as_str(), claim.claim_value.clone().into()),
                        (c.user_id.as_str(), key_value(user_id).into()),
                    ];
                    insert_generated(conn, &c.name, &c.id, values).await?;
                }
            }
        }

        for orphan in unmatched {
            delete_where(conn, &c.name, Expr::col(ident(&c.id)).eq(key_value(orphan.id()))).await?;
        }
        Ok(())
    }

    /// Role links are identified by role key. Roles themselves are never written here.
    async fn sync_roles<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &EntityKey,
        roles: &[IdentityRole],
    ) -> AppResult<()> {
        let l = &self.tables.user_roles;
        if let Some(role) = roles.iter().find(|role| role.is_transient()) {
            return Err(AppError::invalid_operation(format!(
                "role {} must be saved before it is assigned to a user",
                role.name
            )));
        }

        let stmt = Query::select()
            .column(ident(&l.role_id))
            .from(ident(&l.name))
            .and_where(Expr::col(ident(&l.user_id)).eq(key_value(user_id)))
            .to_owned();
        let stored = query_all(conn, &stmt)
            .await?
            .iter()
            .map(|row| read_key(row, &l.role_id, self.tables.role_key))
            .collect::<Result<Vec<_>, _>>()?;
        let mut wanted: Vec<&EntityKey> = Vec::with_capacity(roles.len());
        for role in roles {
            if !wanted.contains(&role.id()) {
                wanted.push(role.id());
            }
        }

        for role_id in stored.iter().filter(|id| !wanted.contains(id)) {
            let condition = Expr::col(ident(&l.user_id))
                .eq(key_value(user_id))
                .and(Expr::col(ident(&l.role_id)).eq(key_value(role_id)));
            delete_where(conn, &l.name, condition).await?;
        }
        for role_id in wanted.into_iter().filter(|id| !stored.contains(id)) {
            let values = vec![
                (l.user_id.as_str(), key_value(user_id).into()),
                (l.role_id.as_str(), key_value(role_id).into()),
            ];
            insert(conn, &l.name, values).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Roles
    // =========================================================================

    fn role_select(&self) -> SelectStatement {
        let r = &self.tables.roles;
        Query::select()
            .columns([ident(&r.id), ident(&r.role_name)])
            .from(ident(&r.name))
            .to_owned()
    }

    fn role_from_row(&self, row: &QueryResult) -> AppResult<IdentityRole> {
        let r = &self.tables.roles;
        let key = read_key(row, &r.id, self.tables.role_key)?;
        Ok(IdentityRole::with_key(key, row.try_get::<String>("", &r.role_name)?))
    }

    /// Insert a role row, returning its key.
    pub async fn insert_role<C: ConnectionTrait>(&self, conn: &C, role: &IdentityRole) -> AppResult<EntityKey> {
        let r = &self.tables.roles;
        let mut values = vec![(r.role_name.as_str(), role.name.clone().into())];

        if self.tables.role_key == KeyKind::Int && role.is_transient() {
            let id = insert_generated(conn, &r.name, &r.id, values).await?;
            return Ok(EntityKey::Int(id));
        }
        values.insert(0, (r.id.as_str(), key_value(role.id()).into()));
        insert(conn, &r.name, values).await?;
        Ok(role.id().clone())
    }

    pub async fn update_role<C: ConnectionTrait>(&self, conn: &C, role: &IdentityRole) -> AppResult<()> {
        let r = &self.tables.roles;
        let backend = conn.get_database_backend();
        let stmt = Query::update()
            .table(ident(&r.name))
            .values([(ident(&r.role_name), Expr::value(role.name.clone()))])
            .and_where(Expr::col(ident(&r.id)).eq(key_value(role.id())))
            .to_owned();

        let result = conn.execute(backend.build(&stmt)).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Delete a role together with its user links.
    pub async fn delete_role<C: ConnectionTrait>(&self, conn: &C, role_id: &EntityKey) -> AppResult<()> {
        let r = &self.tables.roles;
        let l = &self.tables.user_roles;
        let key = key_value(role_id);

        delete_where(conn, &l.name, Expr::col(ident(&l.role_id)).eq(key.clone())).await?;
        delete_where(conn, &r.name, Expr::col(ident(&r.id)).eq(key)).await?;
        Ok(())
    }

    pub async fn find_role_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        role_id: &EntityKey,
    ) -> AppResult<Option<IdentityRole>> {
        let r = &self.tables.roles;
        let stmt = self
            .role_select()
            .and_where(Expr::col(ident(&r.id)).eq(key_value(role_id)))
            .to_owned();
        query_one(conn, &stmt)
            .await?
            .map(|row| self.role_from_row(&row))
            .transpose()
    }

    pub async fn find_role_by_name<C: ConnectionTrait>(
        &self,
        conn: &C,
        role_name: &str,
    ) -> AppResult<Option<IdentityRole>> {
        let r = &self.tables.roles;
        let stmt = self
            .role_select()
            .and_where(Expr::col(ident(&r.role_name)).eq(role_name))
            .limit(1)
            .to_owned();
        query_one(conn, &stmt)
            .await?
            .map(|row| self.role_from_row(&row))
            .transpose()
    }

    /// Every role ordered by name
    pub async fn list_roles<C: ConnectionTrait>(&self, conn: &C) -> AppResult<Vec<IdentityRole>> {
        let r = &self.tables.roles;
        let stmt = self
            .role_select()
            .order_by(ident(&r.role_name), Order::Asc)
            .to_owned();
        query_all(conn, &stmt)
            .await?
            .iter()
            .map(|row| self.role_from_row(row))
            .collect()
    }

    /// Keys of the users holding a role
    pub async fn user_ids_in_role<C: ConnectionTrait>(
        &self,
        conn: &C,
        role_id: &EntityKey,
    ) -> AppResult<Vec<EntityKey>> {
        let l = &self.tables.user_roles;
        let stmt = Query::select()
            .column(ident(&l.user_id))
            .from(ident(&l.name))
            .and_where(Expr::col(ident(&l.role_id)).eq(key_value(role_id)))
            .to_owned();
        query_all(conn, &stmt)
            .await?
            .iter()
            .map(|row| read_key(row, &l.user_id, self.tables.user_key).map_err(AppError::from))
            .collect()
    }
}
