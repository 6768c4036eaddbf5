//! Credential login and token pair issuance.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use gatehouse_auth::{
    Account, Clock, Hs256JwtIssuer, IssueError, SystemClock, strip_invisible, verify_password,
};

use crate::store::{IdentityStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Unknown identifier or wrong password; deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    Inactive,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Issue(#[from] IssueError),
}

/// Access and refresh tokens handed out on a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

pub struct LoginService<S> {
    store: S,
    issuer: Hs256JwtIssuer,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<S> LoginService<S>
where
    S: IdentityStore,
{
    pub fn new(store: S, issuer: Hs256JwtIssuer, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            store,
            issuer,
            access_ttl,
            refresh_ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Authenticate by username, or by email when the identifier contains `@`.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, LoginError> {
        let identifier = strip_invisible(identifier);
        let identifier = identifier.trim();

        let account = if identifier.contains('@') {
            self.store.find_account_by_email(identifier).await?
        } else {
            self.store.find_account_by_username(identifier).await?
        };

        let Some(account) = account else {
            debug!("login rejected: unknown identifier");
            return Err(LoginError::InvalidCredentials);
        };
        if !verify_password(password, &account.password_hash) {
            debug!(account_id = %account.id, "login rejected: wrong password");
            return Err(LoginError::InvalidCredentials);
        }
        if !account.active {
            debug!(account_id = %account.id, "login rejected: inactive account");
            return Err(LoginError::Inactive);
        }

        let pair = self.issue_pair(&account)?;
        info!(account_id = %account.id, superuser = account.is_superuser, "login succeeded");
        Ok(pair)
    }

    fn issue_pair(&self, account: &Account) -> Result<TokenPair, IssueError> {
        let now = self.clock.now();
        let permissions = account.effective_permissions();

        let access_token = self.issuer.issue(
            account.id,
            permissions.clone(),
            account.is_superuser,
            self.access_ttl,
            now,
        )?;
        let refresh_token = self.issuer.issue(
            account.id,
            permissions,
            account.is_superuser,
            self.refresh_ttl,
            now,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use gatehouse_auth::{
        FixedClock, Hs256JwtValidator, JwtValidator, NewAccount, NewPermission, NewRole,
        PermissionCode, hash_password,
    };

    use crate::store::InMemoryIdentityStore;

    const SECRET: &[u8] = b"login-test-secret";

    async fn seeded() -> (Arc<InMemoryIdentityStore>, Account) {
        let store = InMemoryIdentityStore::arc();
        for code in ["view_user", "view_role", "create_role"] {
            store
                .create_permission(NewPermission {
                    name: code.to_string(),
                    code: PermissionCode::new(code),
                    description: None,
                })
                .await
                .unwrap();
        }
        let viewer = store
            .create_role(NewRole::new("viewer", &["view_user", "view_role"]))
            .await
            .unwrap();
        let roles = store
            .create_role(NewRole::new("roles", &["view_role", "create_role"]))
            .await
            .unwrap();

        let account = store
            .create_account(NewAccount {
                username: "dana".to_string(),
                email: "dana@example.com".to_string(),
                password_hash: hash_password("Hunter2!").unwrap(),
                first_name: "Dana".to_string(),
                last_name: "Scully".to_string(),
                phone: None,
                active: true,
                is_superuser: false,
                roles: vec![viewer.id, roles.id],
            })
            .await
            .unwrap();
        (store, account)
    }

    fn service(store: Arc<InMemoryIdentityStore>) -> LoginService<Arc<InMemoryIdentityStore>> {
        let issuer = Hs256JwtIssuer::new(SECRET, "gatehouse", "UTC").unwrap();
        LoginService::new(store, issuer, Duration::minutes(15), Duration::days(7))
            .with_clock(Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())))
    }

    #[tokio::test]
    async fn login_by_username_issues_both_tokens() {
        let (store, account) = seeded().await;
        let pair = service(store).login("dana", "Hunter2!").await.unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap();
        let validator = Hs256JwtValidator::new(SECRET);
        let access = validator.validate(&pair.access_token, now).unwrap();
        let refresh = validator.validate(&pair.refresh_token, now).unwrap();

        assert_eq!(access.sub, account.id);
        assert!(!access.is_superuser);
        let codes: Vec<&str> = access.permissions.iter().map(PermissionCode::as_str).collect();
        assert_eq!(codes, vec!["view_user", "view_role", "create_role"]);
        assert_eq!(refresh.permissions, access.permissions);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 3600);
    }

    #[tokio::test]
    async fn login_by_email_and_invisible_characters_are_ignored() {
        let (store, _) = seeded().await;
        let svc = service(store);
        assert!(svc.login("dana@example.com", "Hunter2!").await.is_ok());
        assert!(svc.login("\u{200B}dana\u{FEFF}", "Hunter2!").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let (store, _) = seeded().await;
        let svc = service(store);
        assert_eq!(
            svc.login("nobody", "Hunter2!").await,
            Err(LoginError::InvalidCredentials)
        );
        assert_eq!(
            svc.login("dana", "hunter2!").await,
            Err(LoginError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn inactive_account_is_rejected() {
        let (store, account) = seeded().await;
        store.set_active(account.id, false).unwrap();
        assert_eq!(
            service(store).login("dana", "Hunter2!").await,
            Err(LoginError::Inactive)
        );
    }

    #[tokio::test]
    async fn non_positive_ttl_surfaces_as_issue_error() {
        let (store, _) = seeded().await;
        let issuer = Hs256JwtIssuer::new(SECRET, "gatehouse", "UTC").unwrap();
        let svc = LoginService::new(store, issuer, Duration::zero(), Duration::days(1));
        assert_eq!(
            svc.login("dana", "Hunter2!").await,
            Err(LoginError::Issue(IssueError::InvalidTtl))
        );
    }
}
