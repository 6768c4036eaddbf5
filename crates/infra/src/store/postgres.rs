//! Postgres-backed identity store.
//!
//! Uniqueness of usernames, emails, role names and permission codes is
//! enforced by `UNIQUE` constraints, so concurrent writers from several
//! processes are safe. Multi-row writes (an account with its role grants, a
//! role with its permissions) run in one transaction.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use gatehouse_auth::{
    Account, NewAccount, NewPermission, NewRole, Permission, PermissionCode, Role,
};
use gatehouse_core::{AccountId, PermissionId, RoleId};

use super::{IdentityStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        active BOOLEAN NOT NULL,
        is_superuser BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_roles (
        account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (account_id, role_id)
    )
    "#,
];

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, phone, active, is_superuser";

const ROLE_COLUMNS: &str = r#"
    r.id AS role_id,
    r.name AS role_name,
    p.id AS permission_id,
    p.name AS permission_name,
    p.code AS permission_code,
    p.description AS permission_description
"#;

/// Postgres identity store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared behind an `Arc` by every request handler.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the identity tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn find_account_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        // `column` is one of two literals chosen by the callers below
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account", e))?;

        match row {
            Some(row) => self.with_roles(account_from_row(&row)?).await.map(Some),
            None => Ok(None),
        }
    }

    async fn with_roles(&self, mut account: Account) -> Result<Account, StoreError> {
        account.roles = self.load_roles(account.id).await?;
        Ok(account)
    }

    async fn load_roles(&self, account_id: AccountId) -> Result<Vec<Role>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM account_roles ar
            JOIN roles r ON r.id = ar.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ar.account_id = $1
            ORDER BY r.name, p.code
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_roles", e))?;

        roles_from_rows(&rows)
    }
}

#[async_trait::async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self), err)]
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.find_account_where("username", username).await
    }

    #[instrument(skip(self), err)]
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_account_where("email", email).await
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account_by_id", e))?;

        match row {
            Some(row) => self.with_roles(account_from_row(&row)?).await.map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in &rows {
            accounts.push(self.with_roles(account_from_row(row)?).await?);
        }
        Ok(accounts)
    }

    #[instrument(skip(self, account), fields(username = %account.username), err)]
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let id = AccountId::new();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_account", e))?;

        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, username, email, password_hash, first_name, last_name, phone, active, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.phone)
        .bind(account.active)
        .bind(account.is_superuser)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        for role_id in &account.roles {
            sqlx::query(
                "INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_account", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_account", e))?;

        self.with_roles(Account {
            id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            active: account.active,
            is_superuser: account.is_superuser,
            roles: Vec::new(),
        })
        .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn find_roles(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let sql = format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE r.id = ANY($1)
            ORDER BY r.name, p.code
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(&ids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_roles", e))?;

        roles_from_rows(&rows)
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            ORDER BY r.name, p.code
            "#
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        roles_from_rows(&rows)
    }

    #[instrument(skip(self, role), fields(name = %role.name), err)]
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let id = RoleId::new();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;

        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(&role.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;

        let mut permissions: Vec<Permission> = Vec::with_capacity(role.permissions.len());
        for code in &role.permissions {
            let row = sqlx::query("SELECT id, name, code, description FROM permissions WHERE code = $1")
                .bind(code.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_role", e))?
                .ok_or_else(|| StoreError::Backend(format!("unknown permission code '{code}'")))?;
            let permission = permission_from_row(&row)?;
            if permissions.iter().any(|p| p.id == permission.id) {
                continue;
            }

            sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
                .bind(id.as_uuid())
                .bind(permission.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_role", e))?;
            permissions.push(permission);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;

        Ok(Role {
            id,
            name: role.name,
            permissions,
        })
    }

    #[instrument(skip(self), fields(code = %code), err)]
    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> Result<Option<Permission>, StoreError> {
        let row = sqlx::query("SELECT id, name, code, description FROM permissions WHERE code = $1")
            .bind(code.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_permission_by_code", e))?;

        row.as_ref().map(permission_from_row).transpose()
    }

    #[instrument(skip(self, permission), fields(code = %permission.code), err)]
    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        let id = PermissionId::new();
        sqlx::query("INSERT INTO permissions (id, name, code, description) VALUES ($1, $2, $3, $4)")
            .bind(id.as_uuid())
            .bind(&permission.name)
            .bind(permission.code.as_str())
            .bind(&permission.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_permission", e))?;

        Ok(Permission {
            id,
            name: permission.name,
            code: permission.code,
            description: permission.description,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query("SELECT id, name, code, description FROM permissions ORDER BY code")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_permissions", e))?;

        rows.iter().map(permission_from_row).collect()
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<T, _>(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::from_uuid(get::<Uuid>(row, "id")?),
        username: get(row, "username")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        phone: get(row, "phone")?,
        active: get(row, "active")?,
        is_superuser: get(row, "is_superuser")?,
        roles: Vec::new(),
    })
}

/// Fold `ROLE_COLUMNS` rows into roles, keeping row order.
fn roles_from_rows(rows: &[PgRow]) -> Result<Vec<Role>, StoreError> {
    let mut order: Vec<RoleId> = Vec::new();
    let mut roles: HashMap<RoleId, Role> = HashMap::new();
    for row in rows {
        let role_id = RoleId::from_uuid(get::<Uuid>(row, "role_id")?);
        let role = roles.entry(role_id).or_insert_with(|| {
            order.push(role_id);
            Role {
                id: role_id,
                name: String::new(),
                permissions: Vec::new(),
            }
        });
        role.name = get::<String>(row, "role_name")?;

        if let Some(permission_id) = get::<Option<Uuid>>(row, "permission_id")? {
            role.permissions.push(Permission {
                id: PermissionId::from_uuid(permission_id),
                name: get::<String>(row, "permission_name")?,
                code: PermissionCode::new(get::<String>(row, "permission_code")?),
                description: get::<Option<String>>(row, "permission_description")?,
            });
        }
    }

    Ok(order.into_iter().filter_map(|id| roles.remove(&id)).collect())
}

fn permission_from_row(row: &PgRow) -> Result<Permission, StoreError> {
    Ok(Permission {
        id: PermissionId::from_uuid(get::<Uuid>(row, "id")?),
        name: get(row, "name")?,
        code: PermissionCode::new(get::<String>(row, "code")?),
        description: get(row, "description")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
