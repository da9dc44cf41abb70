//! Format rules for login input.
//!
//! Everything here runs before the transport is touched; a value of one of
//! these types is always well-formed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::domains::auth::errors::ValidationError;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{10,15}$").unwrap();
    static ref CODE_REGEX: Regex = Regex::new(r"^[0-9]{5,6}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if PHONE_REGEX.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::MalformedPhoneNumber)
        }
    }

    pub fn looks_valid(raw: &str) -> bool {
        PHONE_REGEX.is_match(raw.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-time login code. Spaces and dashes are dropped before checking, so a
/// pasted `12 345` or `123-456` is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCode(String);

impl LoginCode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_code(raw);
        if CODE_REGEX.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(ValidationError::MalformedCode)
        }
    }

    pub fn looks_valid(raw: &str) -> bool {
        CODE_REGEX.is_match(&normalize_code(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Second-factor password. Kept verbatim; only emptiness is rejected.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            Err(ValidationError::EmptyPassword)
        } else {
            Ok(Self(raw.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}
