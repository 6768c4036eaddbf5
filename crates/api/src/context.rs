use gatehouse_auth::{Claims, PermissionCode};
use gatehouse_core::AccountId;

/// Authenticated caller for a request, derived from verified claims.
///
/// Inserted into request extensions by the route guard; handlers behind a
/// guard can rely on it being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    account_id: AccountId,
    issuer: String,
    permissions: Vec<PermissionCode>,
    is_superuser: bool,
}

impl PrincipalContext {
    pub fn new(
        account_id: AccountId,
        issuer: String,
        permissions: Vec<PermissionCode>,
        is_superuser: bool,
    ) -> Self {
        Self {
            account_id,
            issuer,
            permissions,
            is_superuser,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn permissions(&self) -> &[PermissionCode] {
        &self.permissions
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }
}

impl From<Claims> for PrincipalContext {
    fn from(claims: Claims) -> Self {
        Self::new(claims.sub, claims.iss, claims.permissions, claims.is_superuser)
    }
}
