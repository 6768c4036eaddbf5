//! `gatehouse-auth`: pure authentication/authorization core.
//!
//! This crate is intentionally decoupled from HTTP and storage: it hashes
//! credentials, issues and parses signed tokens, and decides whether a set of
//! claims satisfies a route's permission requirement.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod clock;
pub mod credentials;
pub mod permissions;
pub mod roles;
pub mod token;

pub use account::{Account, AdminDescriptor, NewAccount};
pub use authorize::{
    AuthorizationExplanation, AuthzError, Decision, DecisionReason, RequiredPermissions,
    authorize, authorize_all, explain_authorization,
};
pub use claims::{Claims, InvalidTokenError, validate_claims};
pub use clock::{Clock, ClockError, FixedClock, SystemClock, ZonedClock};
pub use credentials::{
    HashingError, PasswordRule, WeakPasswordError, hash_password, strip_invisible,
    validate_strength, verify_password,
};
pub use permissions::{
    CORE_PERMISSIONS, CatalogError, NewPermission, Permission, PermissionCatalog, PermissionCode,
    PermissionDecl,
};
pub use roles::{NewRole, Role, holds_all};
pub use token::{
    Hs256JwtIssuer, Hs256JwtValidator, IssueError, JwtValidator, TokenRequest, issue, issue_at, parse,
    parse_at,
};
