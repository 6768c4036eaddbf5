//! Startup reconciliation of the permission catalog and the admin account.
//!
//! Both operations only ever *create* missing rows; existing rows are never
//! updated. Running them on every start, from any number of instances, ends
//! in the same state: one row per declared code, one admin account.

use core::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use gatehouse_auth::{
    AdminDescriptor, HashingError, NewPermission, PermissionCatalog, PermissionCode, hash_password,
};
use gatehouse_core::AccountId;

use crate::store::{IdentityStore, StoreError};

/// What to do when one catalog entry cannot be reconciled.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PropagationMode {
    /// Stop at the first failing entry and return its error.
    #[default]
    AbortOnError,
    /// Log the failure, record it in the report and carry on.
    LogAndContinue,
}

impl FromStr for PropagationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-on-error" => Ok(Self::AbortOnError),
            "continue" | "log-and-continue" => Ok(Self::LogAndContinue),
            other => Err(format!(
                "unknown propagation mode '{other}' (expected 'abort' or 'continue')"
            )),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("admin account: {0}")]
    Hashing(#[from] HashingError),

    #[error("store error while reconciling {subject}: {source}")]
    Store {
        subject: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    fn store(subject: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            subject: subject.into(),
            source,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Created(AccountId),
    AlreadyPresent,
}

/// One catalog entry that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFailure {
    pub code: PermissionCode,
    pub error: StoreError,
}

/// Per-entry result of a catalog pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReport {
    pub created: Vec<PermissionCode>,
    pub existing: Vec<PermissionCode>,
    pub failures: Vec<CatalogFailure>,
}

impl CatalogReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ensure the administrative account exists.
///
/// An existing account with the same username is left untouched, whatever
/// its password or flags. A uniqueness conflict on insert counts as already
/// present only when the username can be read back afterwards; a conflict
/// with some other account (same email) is an error.
pub async fn reconcile_admin<S>(
    admin: &AdminDescriptor,
    store: &S,
) -> Result<AdminOutcome, ReconcileError>
where
    S: IdentityStore + ?Sized,
{
    let existing = store
        .find_account_by_username(&admin.username)
        .await
        .map_err(|e| ReconcileError::store(format!("admin '{}'", admin.username), e))?;

    if existing.is_some() {
        info!(username = %admin.username, "admin already exists");
        return Ok(AdminOutcome::AlreadyPresent);
    }

    let password_hash = hash_password(&admin.password)?;
    match store.create_account(admin.to_new_account(password_hash)).await {
        Ok(account) => {
            info!(username = %admin.username, account_id = %account.id, "admin created");
            Ok(AdminOutcome::Created(account.id))
        }
        Err(e) if e.is_conflict() => {
            // The conflict may come from the email of an unrelated account.
            let winner = store
                .find_account_by_username(&admin.username)
                .await
                .map_err(|e| ReconcileError::store(format!("admin '{}'", admin.username), e))?;
            if winner.is_some() {
                info!(username = %admin.username, "admin created concurrently by another instance");
                Ok(AdminOutcome::AlreadyPresent)
            } else {
                warn!(username = %admin.username, error = %e, "admin insert conflicts with another account");
                Err(ReconcileError::store(format!("admin '{}'", admin.username), e))
            }
        }
        Err(e) => Err(ReconcileError::store(format!("admin '{}'", admin.username), e)),
    }
}

/// Insert every declared permission that is not persisted yet.
pub async fn reconcile_permission_catalog<S>(
    catalog: &PermissionCatalog,
    store: &S,
    mode: PropagationMode,
) -> Result<CatalogReport, ReconcileError>
where
    S: IdentityStore + ?Sized,
{
    let mut report = CatalogReport::default();

    for decl in catalog.entries() {
        let code = decl.code();
        match reconcile_entry(store, NewPermission::from(decl)).await {
            Ok(true) => {
                debug!(code = %code, "permission created");
                report.created.push(code);
            }
            Ok(false) => {
                debug!(code = %code, "permission already exists");
                report.existing.push(code);
            }
            Err(error) => match mode {
                PropagationMode::AbortOnError => {
                    return Err(ReconcileError::store(format!("permission '{code}'"), error));
                }
                PropagationMode::LogAndContinue => {
                    warn!(code = %code, error = %error, "failed to reconcile permission; continuing");
                    report.failures.push(CatalogFailure { code, error });
                }
            },
        }
    }

    info!(
        created = report.created.len(),
        existing = report.existing.len(),
        failed = report.failures.len(),
        "permission catalog reconciled"
    );
    Ok(report)
}

/// `Ok(true)` if the row was inserted, `Ok(false)` if it was already there.
async fn reconcile_entry<S>(store: &S, permission: NewPermission) -> Result<bool, StoreError>
where
    S: IdentityStore + ?Sized,
{
    if store.find_permission_by_code(&permission.code).await?.is_some() {
        return Ok(false);
    }
    match store.create_permission(permission).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_conflict() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Result of a full startup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// `None` when no admin descriptor was configured.
    pub admin: Option<AdminOutcome>,
    pub catalog: CatalogReport,
}

/// The startup sequence: admin account (if configured), then the catalog.
#[derive(Debug, Copy, Clone, Default)]
pub struct Reconciler {
    mode: PropagationMode,
}

impl Reconciler {
    pub fn new(mode: PropagationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PropagationMode {
        self.mode
    }

    pub async fn run<S>(
        &self,
        catalog: &PermissionCatalog,
        admin: Option<&AdminDescriptor>,
        store: &S,
    ) -> Result<ReconcileSummary, ReconcileError>
    where
        S: IdentityStore + ?Sized,
    {
        let admin = match admin {
            Some(descriptor) => Some(reconcile_admin(descriptor, store).await?),
            None => {
                debug!("no admin configured; skipping admin reconciliation");
                None
            }
        };
        let catalog = reconcile_permission_catalog(catalog, store, self.mode).await?;
        Ok(ReconcileSummary { admin, catalog })
    }
}
