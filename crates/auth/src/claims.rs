use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::AccountId;

use crate::PermissionCode;

/// Signed token payload.
///
/// A snapshot taken at issuance: permissions revoked afterwards stay in the
/// token until `exp`. `iat`/`exp` are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject / account identifier.
    pub sub: AccountId,

    /// Issuer (the application name).
    pub iss: String,

    /// Flattened permission codes held at issuance.
    pub permissions: Vec<PermissionCode>,

    #[serde(rename = "isSuperUser")]
    pub is_superuser: bool,

    pub iat: i64,

    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn has_permission(&self, code: &PermissionCode) -> bool {
        self.permissions.contains(code)
    }
}

/// Why a token was rejected.
///
/// The variants exist for logs and tests; the request boundary collapses all
/// of them into one authentication failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenError {
    #[error("invalid token: malformed")]
    Malformed,

    #[error("invalid token: signature mismatch")]
    BadSignature,

    #[error("invalid token: expired")]
    Expired,
}

/// Deterministically validate the time window of decoded claims.
///
/// A token is valid strictly before `exp`; at `exp` it is expired.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), InvalidTokenError> {
    if claims.exp <= claims.iat {
        return Err(InvalidTokenError::Malformed);
    }
    if now.timestamp() >= claims.exp {
        return Err(InvalidTokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn claims(iat: i64, exp: i64) -> Claims {
        Claims {
            sub: AccountId::new(),
            iss: "gatehouse".to_string(),
            permissions: vec![PermissionCode::new("view_role")],
            is_superuser: false,
            iat,
            exp,
        }
    }

    #[test]
    fn valid_strictly_before_exp() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(validate_claims(&claims(900, 1_001), now).is_ok());
        assert_eq!(
            validate_claims(&claims(900, 1_000), now),
            Err(InvalidTokenError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(900, 999), now),
            Err(InvalidTokenError::Expired)
        );
    }

    #[test]
    fn inverted_window_is_malformed() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(
            validate_claims(&claims(2_000, 2_000), now),
            Err(InvalidTokenError::Malformed)
        );
    }

    #[test]
    fn wire_names_match_the_token_format() {
        let json = serde_json::to_value(claims(1, 2)).unwrap();
        assert!(json.get("isSuperUser").is_some());
        assert!(json.get("is_superuser").is_none());
        assert_eq!(json["permissions"][0], "view_role");
        assert_eq!(json["iat"], 1);
        assert_eq!(json["exp"], 2);
    }
}
