//! HS256 token issuance and validation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use gatehouse_core::AccountId;

use crate::{Claims, ClockError, InvalidTokenError, PermissionCode, ZonedClock, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("token lifetime must be positive and representable")]
    InvalidTtl,

    #[error("could not sign token: {0}")]
    Signing(String),
}

/// Everything needed to mint one token.
#[derive(Debug, Clone)]
pub struct TokenRequest<'a> {
    pub subject: AccountId,
    pub permissions: &'a [PermissionCode],
    pub is_superuser: bool,
    pub issuer: &'a str,
    pub timezone: &'a str,
    pub ttl: Duration,
}

/// Issue a token stamped with the current wall-clock time.
pub fn issue(request: &TokenRequest<'_>, secret: &[u8]) -> Result<String, IssueError> {
    issue_at(request, secret, Utc::now())
}

/// Issue a token as of `now`.
pub fn issue_at(
    request: &TokenRequest<'_>,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<String, IssueError> {
    let issuer = Hs256JwtIssuer::new(secret, request.issuer, request.timezone)?;
    issuer.issue(
        request.subject,
        request.permissions.to_vec(),
        request.is_superuser,
        request.ttl,
        now,
    )
}

/// Parse a bearer header value against the current wall-clock time.
pub fn parse(bearer: &str, secret: &[u8]) -> Result<Claims, InvalidTokenError> {
    parse_at(bearer, secret, Utc::now())
}

/// Parse a bearer header value as of `now`.
pub fn parse_at(bearer: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, InvalidTokenError> {
    Hs256JwtValidator::new(secret).validate(bearer, now)
}

/// Turns an `Authorization` header value into verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, bearer: &str, now: DateTime<Utc>) -> Result<Claims, InvalidTokenError>;
}

/// Signs claims with a shared HMAC-SHA256 secret.
#[derive(Clone)]
pub struct Hs256JwtIssuer {
    key: EncodingKey,
    issuer: String,
    clock: ZonedClock,
}

impl Hs256JwtIssuer {
    /// Fails if `timezone` does not resolve.
    pub fn new(secret: &[u8], issuer: impl Into<String>, timezone: &str) -> Result<Self, ClockError> {
        Ok(Self {
            key: EncodingKey::from_secret(secret),
            issuer: issuer.into(),
            clock: ZonedClock::resolve(timezone)?,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue(
        &self,
        subject: AccountId,
        permissions: Vec<PermissionCode>,
        is_superuser: bool,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, IssueError> {
        if ttl <= Duration::zero() {
            return Err(IssueError::InvalidTtl);
        }

        let issued_at = self.clock.at(now);
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(IssueError::InvalidTtl)?;

        let claims = Claims {
            sub: subject,
            iss: self.issuer.clone(),
            permissions,
            is_superuser,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| IssueError::Signing(e.to_string()))
    }
}

impl core::fmt::Debug for Hs256JwtIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtIssuer")
            .field("issuer", &self.issuer)
            .field("timezone", &self.clock.timezone())
            .finish()
    }
}

/// Verifies HS256 tokens statelessly.
///
/// Signature, structure and expiry are checked together; claims are only
/// returned when all three pass.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is enforced by `validate_claims` against the caller's `now`
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, bearer: &str, now: DateTime<Utc>) -> Result<Claims, InvalidTokenError> {
        let token = strip_bearer(bearer);
        if token.is_empty() {
            return Err(InvalidTokenError::Malformed);
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => InvalidTokenError::BadSignature,
                ErrorKind::ExpiredSignature => InvalidTokenError::Expired,
                _ => InvalidTokenError::Malformed,
            },
        )?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix("Bearer ").unwrap_or(value).trim()
}
