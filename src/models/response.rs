//! Response Types
//!
//! The result envelope returned by every channel of the request router.
//!
//! On the wire the envelope keeps the familiar shape
//! `{ "success": true, "data": ... }` / `{ "success": false, "error": "..." }`,
//! but in Rust it is a discriminated type so a response can never be both
//! or neither.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

/// Generic command response for all channels
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse<T> {
    /// The handler produced a value
    Ok(T),
    /// The handler failed; the message is user-presentable
    Err(String),
}

impl<T> CommandResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self::Ok(data)
    }

    /// Create an error response with message
    pub fn err(message: impl Into<String>) -> Self {
        Self::Err(message.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Borrow the data of a successful response
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ok(data) => Some(data),
            Self::Err(_) => None,
        }
    }

    /// Borrow the message of a failed response
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Err(message) => Some(message),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Ok(data) => Ok(data),
            Self::Err(message) => Err(message),
        }
    }
}

impl<T> From<Result<T, AppError>> for CommandResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

impl<T: Serialize> Serialize for CommandResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommandResponse", 2)?;
        match self {
            Self::Ok(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Err(message) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", message)?;
            }
        }
        state.end()
    }
}

/// Wire shape accepted when reading an envelope back
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct RawEnvelope<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for CommandResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::<T>::deserialize(deserializer)?;
        match (raw.success, raw.data, raw.error) {
            (true, Some(data), _) => Ok(Self::Ok(data)),
            (false, _, Some(error)) => Ok(Self::Err(error)),
            (true, None, _) => T::deserialize(serde_json::Value::Null)
                .map(Self::Ok)
                .map_err(de::Error::custom),
            (false, _, None) => Err(de::Error::missing_field("error")),
        }
    }
}
