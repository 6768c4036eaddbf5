//! Persisted identity records: accounts, roles and the permission catalog.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use gatehouse_auth::{Account, NewAccount, NewPermission, NewRole, Permission, PermissionCode, Role};
use gatehouse_core::{AccountId, RoleId};

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;

/// Store operation error.
///
/// "Not found" is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (username, email, role name or code).
    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    /// Any other storage failure (connection, query, poisoned lock).
    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// The store the authentication core reads from and reconciles into.
///
/// Implementations must enforce uniqueness of `Permission.code`,
/// `Role.name`, `Account.username` and `Account.email`, reporting violations
/// as [`StoreError::Conflict`].
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Account with its roles and their permissions.
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// All accounts, ordered by username.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Insert the account and its role grants together.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Roles among `ids` that exist; unknown ids are skipped.
    async fn find_roles(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError>;

    /// All roles, ordered by name.
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    /// Every code must already be persisted.
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError>;

    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> Result<Option<Permission>, StoreError>;

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError>;

    /// All catalog rows, ordered by code.
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
}

#[async_trait::async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_account_by_username(username).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_account_by_email(email).await
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find_account_by_id(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        (**self).list_accounts().await
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        (**self).create_account(account).await
    }

    async fn find_roles(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        (**self).find_roles(ids).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles().await
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        (**self).create_role(role).await
    }

    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> Result<Option<Permission>, StoreError> {
        (**self).find_permission_by_code(code).await
    }

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        (**self).create_permission(permission).await
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        (**self).list_permissions().await
    }
}
