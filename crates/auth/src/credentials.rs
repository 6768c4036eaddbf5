//! Credential utilities: password hashing, verification and strength rules.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::Serialize;
use thiserror::Error;
use unicode_general_category::{GeneralCategory, get_general_category};

/// Hashing failed inside the algorithm (parameters, memory).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to hash password: {0}")]
pub struct HashingError(String);

/// A password strength rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    /// At least one uppercase letter.
    Uppercase,
    /// At least one symbol or punctuation character.
    Symbol,
}

impl PasswordRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordRule::Uppercase => "uppercase",
            PasswordRule::Symbol => "symbol",
        }
    }

    fn requirement(&self) -> &'static str {
        match self {
            PasswordRule::Uppercase => "uppercase letter",
            PasswordRule::Symbol => "symbol",
        }
    }
}

/// The first strength rule a password failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}-password must contain at least one {}", .rule.as_str(), .rule.requirement())]
pub struct WeakPasswordError {
    pub rule: PasswordRule,
}

/// Hash `plaintext` with Argon2id and a fresh random salt.
///
/// The result is a PHC string carrying algorithm, parameters and salt, so
/// `verify_password` needs nothing else.
pub fn hash_password(plaintext: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashingError(e.to_string()))
}

/// Check `plaintext` against a PHC hash produced by [`hash_password`].
///
/// A hash that cannot be parsed verifies as `false`.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Enforce the password strength rules.
///
/// The uppercase rule is reported before the symbol rule when both fail.
pub fn validate_strength(plaintext: &str) -> Result<(), WeakPasswordError> {
    let has_upper = plaintext.chars().any(char::is_uppercase);
    let has_symbol = plaintext.chars().any(is_symbol_or_punct);

    if !has_upper {
        return Err(WeakPasswordError { rule: PasswordRule::Uppercase });
    }
    if !has_symbol {
        return Err(WeakPasswordError { rule: PasswordRule::Symbol });
    }
    Ok(())
}

fn is_symbol_or_punct(c: char) -> bool {
    use GeneralCategory::*;
    matches!(
        get_general_category(c),
        ConnectorPunctuation
            | DashPunctuation
            | OpenPunctuation
            | ClosePunctuation
            | InitialPunctuation
            | FinalPunctuation
            | OtherPunctuation
            | MathSymbol
            | CurrencySymbol
            | ModifierSymbol
            | OtherSymbol
    )
}

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
fn is_printable(c: char) -> bool {
    use GeneralCategory::*;
    if c == ' ' {
        return true;
    }
    matches!(
        get_general_category(c),
        UppercaseLetter
            | LowercaseLetter
            | TitlecaseLetter
            | ModifierLetter
            | OtherLetter
            | NonspacingMark
            | SpacingMark
            | EnclosingMark
            | DecimalNumber
            | LetterNumber
            | OtherNumber
    ) || is_symbol_or_punct(c)
}

/// Keep only printable characters of user input.
///
/// Controls, format characters (zero-width space and joiners, BOM) and every
/// separator other than the ASCII space are dropped.
pub fn strip_invisible(input: &str) -> String {
    input.chars().filter(|c| is_printable(*c)).collect()
}
