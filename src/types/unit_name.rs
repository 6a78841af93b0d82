// ABOUTME: DNS-compatible deployment unit name validation.
// ABOUTME: Ensures unit names follow RFC 1123 label requirements.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnitNameError {
    #[error("unit name cannot be empty")]
    Empty,

    #[error("unit name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("unit name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("unit name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("unit name must be lowercase")]
    NotLowercase,

    #[error("invalid character in unit name: '{0}'")]
    InvalidChar(char),
}

/// Name of one deployable unit, unique within a deployment run.
///
/// Unit names double as container names and network aliases on the local
/// engine and as resource names on the managed platform, so they must be
/// valid RFC 1123 labels everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitName(String);

impl UnitName {
    pub fn new(value: &str) -> Result<Self, UnitNameError> {
        if value.is_empty() {
            return Err(UnitNameError::Empty);
        }

        if value.len() > 63 {
            return Err(UnitNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(UnitNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(UnitNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(UnitNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(UnitNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for UnitName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for UnitName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        UnitName::new(&value).map_err(serde::de::Error::custom)
    }
}
