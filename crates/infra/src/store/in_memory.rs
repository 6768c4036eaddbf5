use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use gatehouse_auth::{
    Account, NewAccount, NewPermission, NewRole, Permission, PermissionCode, Role,
};
use gatehouse_core::{AccountId, PermissionId, RoleId};

use super::{IdentityStore, StoreError};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    roles: HashMap<RoleId, Role>,
    // insertion order is kept; listings sort by code
    permissions: Vec<Permission>,
}

/// In-memory identity store for tests/dev.
///
/// Uniqueness is checked under the write lock, so concurrent duplicate
/// inserts fail with `StoreError::Conflict` exactly like a database would.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<State>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_active(&self, account_id: AccountId, active: bool) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown account {account_id}")))?;
        account.active = active;
        Ok(())
    }

    pub fn account_count(&self) -> usize {
        self.inner.read().map(|s| s.accounts.len()).unwrap_or(0)
    }

    pub fn permission_count(&self) -> usize {
        self.inner.read().map(|s| s.permissions.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("identity store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("identity store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let state = self.read()?;
        Ok(state.accounts.values().find(|a| a.username == username).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let state = self.read()?;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let state = self.read()?;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.read()?;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(accounts)
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.write()?;
        if state.accounts.values().any(|a| a.username == account.username) {
            return Err(StoreError::Conflict(format!("username '{}'", account.username)));
        }
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Conflict(format!("email '{}'", account.email)));
        }

        let mut roles: Vec<Role> = Vec::with_capacity(account.roles.len());
        for role_id in &account.roles {
            let role = state
                .roles
                .get(role_id)
                .ok_or_else(|| StoreError::Backend(format!("unknown role {role_id}")))?;
            if !roles.iter().any(|r| r.id == role.id) {
                roles.push(role.clone());
            }
        }

        let created = Account {
            id: AccountId::new(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            active: account.active,
            is_superuser: account.is_superuser,
            roles,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_roles(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        let mut roles: Vec<Role> = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(role) = state.roles.get(id) {
                if !roles.iter().any(|r| r.id == role.id) {
                    roles.push(role.clone());
                }
            }
        }
        Ok(roles)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::Conflict(format!("role name '{}'", role.name)));
        }

        let mut permissions: Vec<Permission> = Vec::with_capacity(role.permissions.len());
        for code in &role.permissions {
            let permission = state
                .permissions
                .iter()
                .find(|p| &p.code == code)
                .ok_or_else(|| StoreError::Backend(format!("unknown permission code '{code}'")))?;
            if !permissions.iter().any(|p| p.id == permission.id) {
                permissions.push(permission.clone());
            }
        }

        let created = Role {
            id: RoleId::new(),
            name: role.name,
            permissions,
        };
        state.roles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> Result<Option<Permission>, StoreError> {
        let state = self.read()?;
        Ok(state.permissions.iter().find(|p| &p.code == code).cloned())
    }

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        let mut state = self.write()?;
        if state.permissions.iter().any(|p| p.code == permission.code) {
            return Err(StoreError::Conflict(format!("permission code '{}'", permission.code)));
        }

        let created = Permission {
            id: PermissionId::new(),
            name: permission.name,
            code: permission.code,
            description: permission.description,
        };
        state.permissions.push(created.clone());
        Ok(created)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let state = self.read()?;
        let mut permissions = state.permissions.clone();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$hash".to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            phone: None,
            active: true,
            is_superuser: false,
            roles: Vec::new(),
        }
    }

    fn new_permission(code: &'static str) -> NewPermission {
        NewPermission {
            name: code.to_string(),
            code: PermissionCode::new(code),
            description: None,
        }
    }

    #[tokio::test]
    async fn username_and_email_are_unique() {
        let store = InMemoryIdentityStore::new();
        store.create_account(new_account("alice", "a@x.io")).await.unwrap();

        let dup_name = store.create_account(new_account("alice", "b@x.io")).await.unwrap_err();
        assert!(dup_name.is_conflict());

        let dup_email = store.create_account(new_account("bob", "a@x.io")).await.unwrap_err();
        assert!(dup_email.is_conflict());

        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_none_not_errors() {
        let store = InMemoryIdentityStore::new();
        assert_eq!(store.find_account_by_username("ghost").await, Ok(None));
        assert_eq!(store.find_account_by_email("ghost@x.io").await, Ok(None));
        assert_eq!(store.find_account_by_id(AccountId::new()).await, Ok(None));
        assert_eq!(
            store.find_permission_by_code(&PermissionCode::new("nope")).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn permission_code_is_unique() {
        let store = InMemoryIdentityStore::new();
        store.create_permission(new_permission("view_user")).await.unwrap();
        let err = store.create_permission(new_permission("view_user")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.permission_count(), 1);
    }

    #[tokio::test]
    async fn granted_roles_come_back_with_the_account() {
        let store = InMemoryIdentityStore::new();
        store.create_permission(new_permission("view_user")).await.unwrap();
        store.create_permission(new_permission("view_role")).await.unwrap();
        let role = store
            .create_role(NewRole::new("auditor", &["view_user", "view_role"]))
            .await
            .unwrap();

        let mut row = new_account("carol", "c@x.io");
        row.roles = vec![role.id];
        store.create_account(row).await.unwrap();

        let loaded = store.find_account_by_username("carol").await.unwrap().unwrap();
        assert_eq!(loaded.roles.len(), 1);
        assert_eq!(loaded.effective_permissions().len(), 2);
    }

    #[tokio::test]
    async fn role_with_unknown_code_is_rejected() {
        let store = InMemoryIdentityStore::new();
        assert!(store.create_role(NewRole::new("broken", &["missing"])).await.is_err());
        assert!(store.list_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn role_names_are_unique() {
        let store = InMemoryIdentityStore::new();
        store.create_role(NewRole::new("auditor", &[])).await.unwrap();
        let err = store.create_role(NewRole::new("auditor", &[])).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn account_created_with_roles_carries_their_permissions() {
        let store = InMemoryIdentityStore::new();
        store.create_permission(new_permission("view_user")).await.unwrap();
        let viewer = store
            .create_role(NewRole::new("viewer", &["view_user"]))
            .await
            .unwrap();

        let mut row = new_account("dave", "d@x.io");
        row.roles = vec![viewer.id, viewer.id];
        let created = store.create_account(row).await.unwrap();
        assert_eq!(created.roles, vec![viewer.clone()]);

        let loaded = store.find_account_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.effective_permissions(), vec![PermissionCode::new("view_user")]);

        let mut ghost = new_account("erin", "e@x.io");
        ghost.roles = vec![RoleId::new()];
        assert!(store.create_account(ghost).await.is_err());
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn find_roles_skips_unknown_ids() {
        let store = InMemoryIdentityStore::new();
        let a = store.create_role(NewRole::new("a", &[])).await.unwrap();
        let found = store.find_roles(&[RoleId::new(), a.id]).await.unwrap();
        assert_eq!(found, vec![a]);
    }

    #[tokio::test]
    async fn listings_are_ordered_by_name() {
        let store = InMemoryIdentityStore::new();
        store.create_account(new_account("zed", "z@x.io")).await.unwrap();
        store.create_account(new_account("amy", "a@x.io")).await.unwrap();
        store.create_role(NewRole::new("writer", &[])).await.unwrap();
        store.create_role(NewRole::new("auditor", &[])).await.unwrap();

        let users: Vec<String> = store
            .list_accounts()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.username)
            .collect();
        assert_eq!(users, vec!["amy", "zed"]);

        let roles: Vec<String> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(roles, vec!["auditor", "writer"]);
    }

    #[tokio::test]
    async fn listing_is_sorted_by_code() {
        let store = InMemoryIdentityStore::new();
        store.create_permission(new_permission("view_user")).await.unwrap();
        store.create_permission(new_permission("create_user")).await.unwrap();
        let codes: Vec<String> = store
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.code.to_string())
            .collect();
        assert_eq!(codes, vec!["create_user", "view_user"]);
    }
}
