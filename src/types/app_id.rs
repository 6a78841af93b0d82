// ABOUTME: Sidecar application ID validation.
// ABOUTME: App IDs are 1-60 alphanumeric/hyphen characters, no edge hyphens.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppIdError {
    #[error("app ID cannot be empty")]
    Empty,

    #[error("app ID exceeds maximum length of 60 characters")]
    TooLong,

    #[error("app ID cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("app ID cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("invalid character '{ch}' at position {position} in app ID")]
    InvalidChar { ch: char, position: usize },
}

/// Identifier a service registers under with its sidecar.
///
/// The sidecar runtime uses this for service invocation and pub/sub routing,
/// so it has to be stable and addressable: 1-60 characters, alphanumeric and
/// hyphen only, not starting or ending with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(value: &str) -> Result<Self, AppIdError> {
        if value.is_empty() {
            return Err(AppIdError::Empty);
        }

        if value.len() > 60 {
            return Err(AppIdError::TooLong);
        }

        if value.starts_with('-') {
            return Err(AppIdError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(AppIdError::EndsWithHyphen);
        }

        for (position, ch) in value.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() && ch != '-' {
                return Err(AppIdError::InvalidChar { ch, position });
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for AppId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for AppId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        AppId::new(&value).map_err(serde::de::Error::custom)
    }
}
