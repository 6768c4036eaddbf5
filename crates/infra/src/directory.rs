//! Account and role administration.
//!
//! Creating an account checks password strength, hashes the password and
//! enforces that a non-superuser only grants roles it holds itself.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use gatehouse_auth::{
    Account, AuthzError, CatalogError, Decision, HashingError, NewAccount, NewRole,
    PermissionCatalog, Role, WeakPasswordError, hash_password, holds_all, strip_invisible,
    validate_strength,
};
use gatehouse_core::{AccountId, DomainError, RoleId};

use crate::store::{IdentityStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Malformed input or a uniqueness conflict.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    WeakPassword(#[from] WeakPasswordError),

    #[error(transparent)]
    UnknownPermission(#[from] CatalogError),

    #[error("role {0} does not exist")]
    UnknownRole(RoleId),

    /// The caller asked to grant a role it does not hold.
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Self::Domain(DomainError::conflict(what)),
            other => Self::Store(other),
        }
    }
}

/// Who is making the change, as established by the bearer token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Actor {
    pub account_id: AccountId,
    pub is_superuser: bool,
}

/// Account creation request; the password is still in plaintext.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub roles: Vec<RoleId>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

pub struct DirectoryService<S> {
    store: S,
    catalog: Arc<PermissionCatalog>,
}

impl<S> DirectoryService<S>
where
    S: IdentityStore,
{
    pub fn new(store: S, catalog: Arc<PermissionCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an active, non-superuser account holding `user.roles`.
    pub async fn create_account(&self, actor: &Actor, user: NewUser) -> Result<Account, DirectoryError> {
        let username = clean(&user.username);
        let email = clean(&user.email);
        if username.is_empty() {
            return Err(DomainError::validation("username is required").into());
        }
        // login treats identifiers containing '@' as emails
        if username.contains('@') {
            return Err(DomainError::validation("username must not contain '@'").into());
        }
        if !email.contains('@') {
            return Err(DomainError::validation("email is invalid").into());
        }
        validate_strength(&user.password)?;

        let requested = dedup(&user.roles);
        let found = self.store.find_roles(&requested).await?;
        if let Some(missing) = requested.iter().find(|id| !found.iter().any(|r| &r.id == *id)) {
            return Err(DirectoryError::UnknownRole(*missing));
        }
        self.may_grant(actor, &requested).await?;

        let password_hash = hash_password(&user.password)?;
        let account = self
            .store
            .create_account(NewAccount {
                username,
                email,
                password_hash,
                first_name: clean(&user.first_name),
                last_name: clean(&user.last_name),
                phone: user.phone.as_deref().map(clean).filter(|p| !p.is_empty()),
                active: true,
                is_superuser: false,
                roles: requested,
            })
            .await?;

        info!(
            account_id = %account.id,
            created_by = %actor.account_id,
            roles = account.roles.len(),
            "account created"
        );
        Ok(account)
    }

    /// Create a role granting catalogued permission codes.
    pub async fn create_role(&self, name: &str, codes: &[String]) -> Result<Role, DirectoryError> {
        let name = clean(name);
        if name.is_empty() {
            return Err(DomainError::validation("role name is required").into());
        }

        let codes: Vec<&str> = codes.iter().map(|c| c.trim()).collect();
        let required = self.catalog.require(&codes)?;
        let mut seen = HashSet::new();
        let permissions = required
            .codes()
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect();

        let role = self.store.create_role(NewRole { name, permissions }).await?;
        info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    async fn may_grant(&self, actor: &Actor, requested: &[RoleId]) -> Result<(), DirectoryError> {
        if actor.is_superuser || requested.is_empty() {
            return Ok(());
        }

        let held = match self.store.find_account_by_id(actor.account_id).await? {
            Some(account) => account.roles,
            None => Vec::new(),
        };
        let decision = if holds_all(&held, requested) {
            Decision::Allow
        } else {
            debug!(actor = %actor.account_id, "grant refused: role not held");
            Decision::Deny
        };
        decision.into_result().map_err(DirectoryError::from)
    }
}

fn clean(input: &str) -> String {
    strip_invisible(input).trim().to_string()
}

fn dedup(ids: &[RoleId]) -> Vec<RoleId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use gatehouse_auth::{PermissionCode, verify_password};

    use crate::reconcile::{PropagationMode, reconcile_permission_catalog};
    use crate::store::InMemoryIdentityStore;

    async fn service() -> DirectoryService<Arc<InMemoryIdentityStore>> {
        let store = InMemoryIdentityStore::arc();
        let catalog = Arc::new(PermissionCatalog::with_core(&[]).unwrap());
        reconcile_permission_catalog(&catalog, &store, PropagationMode::AbortOnError)
            .await
            .unwrap();
        DirectoryService::new(store, catalog)
    }

    fn superuser() -> Actor {
        Actor {
            account_id: AccountId::new(),
            is_superuser: true,
        }
    }

    fn user(username: &str, password: &str, roles: Vec<RoleId>) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: password.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone: None,
            roles,
        }
    }

    #[tokio::test]
    async fn superuser_creates_account_with_hashed_password_and_roles() {
        let svc = service().await;
        let viewer = svc
            .create_role("viewer", &["view_user".to_string()])
            .await
            .unwrap();

        let account = svc
            .create_account(&superuser(), user("\u{200b}erin ", "Sunny!day", vec![viewer.id]))
            .await
            .unwrap();

        assert_eq!(account.username, "erin");
        assert!(account.active);
        assert!(!account.is_superuser);
        assert!(verify_password("Sunny!day", &account.password_hash));
        assert_eq!(account.effective_permissions(), vec![PermissionCode::new("view_user")]);
    }

    #[tokio::test]
    async fn weak_password_is_rejected_before_anything_is_written() {
        let svc = service().await;
        let err = svc
            .create_account(&superuser(), user("frank", "Password\u{200b}", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::WeakPassword(_)));
        assert_eq!(svc.store().account_count(), 0);
    }

    #[tokio::test]
    async fn malformed_identity_fields_are_validation_errors() {
        let svc = service().await;
        for bad in [user("   ", "Sunny!day", vec![]), user("a@b", "Sunny!day", vec![])] {
            let err = svc.create_account(&superuser(), bad).await.unwrap_err();
            assert!(matches!(err, DirectoryError::Domain(DomainError::Validation(_))));
        }

        let mut no_email = user("gina", "Sunny!day", vec![]);
        no_email.email = "gina".to_string();
        let err = svc.create_account(&superuser(), no_email).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_domain_conflict() {
        let svc = service().await;
        svc.create_account(&superuser(), user("hank", "Sunny!day", vec![]))
            .await
            .unwrap();
        let err = svc
            .create_account(&superuser(), user("hank", "Sunny!day", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn unknown_role_is_reported() {
        let svc = service().await;
        let ghost = RoleId::new();
        let err = svc
            .create_account(&superuser(), user("ivy", "Sunny!day", vec![ghost]))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::UnknownRole(ghost));
    }

    #[tokio::test]
    async fn actor_may_only_grant_roles_it_holds() {
        let svc = service().await;
        let viewer = svc.create_role("viewer", &["view_user".to_string()]).await.unwrap();
        let editor = svc.create_role("editor", &["update_user".to_string()]).await.unwrap();

        let manager = svc
            .create_account(&superuser(), user("manager", "Sunny!day", vec![viewer.id]))
            .await
            .unwrap();
        let actor = Actor {
            account_id: manager.id,
            is_superuser: false,
        };

        let held = svc
            .create_account(&actor, user("junior", "Sunny!day", vec![viewer.id]))
            .await;
        assert!(held.is_ok());

        let err = svc
            .create_account(&actor, user("senior", "Sunny!day", vec![viewer.id, editor.id]))
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::Forbidden(AuthzError::Forbidden));
        assert_eq!(svc.store().find_account_by_username("senior").await, Ok(None));
    }

    #[tokio::test]
    async fn role_codes_must_be_catalogued_and_names_unique() {
        let svc = service().await;
        let err = svc
            .create_role("rogue", &["launch_missiles".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownPermission(CatalogError::UnknownCode(_))));

        let role = svc
            .create_role("auditor", &["view_user".to_string(), "view_user".to_string()])
            .await
            .unwrap();
        assert_eq!(role.permissions.len(), 1);

        let err = svc.create_role("auditor", &[]).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Domain(DomainError::Conflict(_))));
    }
}
