use serde::Serialize;
use thiserror::Error;

use crate::{Claims, PermissionCode};

/// Outcome of an authorization check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AuthzError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AuthzError::Forbidden),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden")]
    Forbidden,
}

/// The permissions a route requires, any one of which suffices.
///
/// An empty set means the route only needs an authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPermissions(Vec<PermissionCode>);

impl RequiredPermissions {
    /// Authentication only.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Unchecked construction; routers should go through
    /// [`PermissionCatalog::require`](crate::PermissionCatalog::require).
    pub fn any_of(codes: impl IntoIterator<Item = PermissionCode>) -> Self {
        Self(codes.into_iter().collect())
    }

    pub fn codes(&self) -> &[PermissionCode] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decide whether `claims` satisfy `required`.
///
/// - No IO
/// - No panics
/// - Superusers are allowed before anything else is looked at
/// - OR semantics across `required`
pub fn authorize(claims: &Claims, required: &RequiredPermissions) -> Decision {
    explain_authorization(claims, required).decision
}

/// AND semantics: one `authorize` call per code, all must allow.
pub fn authorize_all(claims: &Claims, required: &[PermissionCode]) -> Decision {
    let all = required.iter().all(|code| {
        authorize(claims, &RequiredPermissions::any_of([code.clone()])).is_allowed()
    });
    if all { Decision::Allow } else { Decision::Deny }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Which branch of the decision procedure produced the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    Superuser,
    AuthenticatedOnly,
    Matched { permission: PermissionCode },
    MissingPermission { required: Vec<PermissionCode> },
}

/// A decision plus the reason for it, for audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub decision: Decision,
    pub reason: DecisionReason,
}

pub fn explain_authorization(
    claims: &Claims,
    required: &RequiredPermissions,
) -> AuthorizationExplanation {
    if claims.is_superuser {
        return AuthorizationExplanation {
            decision: Decision::Allow,
            reason: DecisionReason::Superuser,
        };
    }

    if required.is_empty() {
        return AuthorizationExplanation {
            decision: Decision::Allow,
            reason: DecisionReason::AuthenticatedOnly,
        };
    }

    match required.codes().iter().find(|code| claims.has_permission(code)) {
        Some(code) => AuthorizationExplanation {
            decision: Decision::Allow,
            reason: DecisionReason::Matched {
                permission: code.clone(),
            },
        },
        None => AuthorizationExplanation {
            decision: Decision::Deny,
            reason: DecisionReason::MissingPermission {
                required: required.codes().to_vec(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::AccountId;
    use proptest::prelude::*;

    fn claims(superuser: bool, perms: &[&'static str]) -> Claims {
        Claims {
            sub: AccountId::new(),
            iss: "gatehouse".to_string(),
            permissions: perms.iter().map(|p| PermissionCode::new(*p)).collect(),
            is_superuser: superuser,
            iat: 0,
            exp: 1,
        }
    }

    fn required(codes: &[&'static str]) -> RequiredPermissions {
        RequiredPermissions::any_of(codes.iter().map(|c| PermissionCode::new(*c)))
    }

    #[test]
    fn superuser_always_allowed() {
        let su = claims(true, &[]);
        assert_eq!(authorize(&su, &RequiredPermissions::none()), Decision::Allow);
        assert_eq!(authorize(&su, &required(&["create_role"])), Decision::Allow);
        assert_eq!(
            explain_authorization(&su, &required(&["x"])).reason,
            DecisionReason::Superuser
        );
    }

    #[test]
    fn empty_requirement_allows_any_authenticated_caller() {
        let nobody = claims(false, &[]);
        let explanation = explain_authorization(&nobody, &RequiredPermissions::none());
        assert_eq!(explanation.decision, Decision::Allow);
        assert_eq!(explanation.reason, DecisionReason::AuthenticatedOnly);
    }

    #[test]
    fn one_matching_permission_suffices() {
        let viewer = claims(false, &["view_role"]);
        assert_eq!(authorize(&viewer, &required(&["create_role"])), Decision::Deny);
        assert_eq!(
            authorize(&viewer, &required(&["view_role", "create_role"])),
            Decision::Allow
        );
    }

    #[test]
    fn no_permissions_denied_when_something_is_required() {
        let nobody = claims(false, &[]);
        let explanation = explain_authorization(&nobody, &required(&["view_user"]));
        assert_eq!(explanation.decision, Decision::Deny);
        assert!(matches!(
            explanation.reason,
            DecisionReason::MissingPermission { .. }
        ));
    }

    #[test]
    fn authorize_all_needs_every_code() {
        let viewer = claims(false, &["view_role"]);
        let both = [PermissionCode::new("view_role"), PermissionCode::new("create_role")];
        assert_eq!(authorize_all(&viewer, &both), Decision::Deny);
        assert_eq!(authorize_all(&viewer, &both[..1]), Decision::Allow);
        assert_eq!(authorize_all(&claims(true, &[]), &both), Decision::Allow);
    }

    #[test]
    fn deny_maps_to_forbidden() {
        assert_eq!(Decision::Deny.into_result(), Err(AuthzError::Forbidden));
        assert_eq!(Decision::Allow.into_result(), Ok(()));
    }

    proptest! {
        /// Property: for non-superusers, allow iff the held and required sets intersect
        /// (or nothing is required).
        #[test]
        fn or_semantics_matches_set_intersection(
            held in prop::collection::hash_set("[a-d]", 0..4),
            req in prop::collection::hash_set("[a-d]", 0..4),
        ) {
            let c = Claims {
                sub: AccountId::new(),
                iss: "gatehouse".to_string(),
                permissions: held.iter().cloned().map(PermissionCode::new).collect(),
                is_superuser: false,
                iat: 0,
                exp: 1,
            };
            let r = RequiredPermissions::any_of(req.iter().cloned().map(PermissionCode::new));
            let expected = req.is_empty() || !held.is_disjoint(&req);
            prop_assert_eq!(authorize(&c, &r).is_allowed(), expected);
        }
    }
}
