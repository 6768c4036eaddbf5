//! Infrastructure layer: identity storage, startup reconciliation, login
//! and account administration.

pub mod directory;
pub mod login;
pub mod reconcile;
pub mod store;

pub use directory::{Actor, DirectoryError, DirectoryService, NewUser};
pub use login::{LoginError, LoginService, TokenPair};
pub use reconcile::{
    AdminOutcome, CatalogFailure, CatalogReport, PropagationMode, ReconcileError, ReconcileSummary,
    Reconciler, reconcile_admin, reconcile_permission_catalog,
};
pub use store::{IdentityStore, InMemoryIdentityStore, PostgresIdentityStore, StoreError};
