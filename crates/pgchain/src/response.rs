//! The uniform `{data, error, count}` envelope returned by every execution.

use crate::error::OrmError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable, caller-facing error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// `single()` matched zero rows.
    NoRows,
    /// A table or column name failed validation.
    InvalidIdentifier,
    /// A select list or filter expression could not be parsed.
    MalformedFilter,
    /// The store rejected a write on a unique constraint.
    UniqueViolation,
    ForeignKeyViolation,
    CheckViolation,
    /// The chain itself was invalid (bad payload, conflicting operations).
    InvalidRequest,
    /// Returned data could not be mapped to the requested type.
    DecodeFailure,
    /// Any other statement or connection failure.
    ExecutionFailure,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoRows => "no-rows",
            ErrorCode::InvalidIdentifier => "invalid-identifier",
            ErrorCode::MalformedFilter => "malformed-filter",
            ErrorCode::UniqueViolation => "unique-violation",
            ErrorCode::ForeignKeyViolation => "foreign-key-violation",
            ErrorCode::CheckViolation => "check-violation",
            ErrorCode::InvalidRequest => "invalid-request",
            ErrorCode::DecodeFailure => "decode-failure",
            ErrorCode::ExecutionFailure => "execution-failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `error` half of a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
    /// SQLSTATE reported by the server, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlstate: Option<String>,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            sqlstate: None,
        }
    }

    /// `true` for duplicate-key failures, which callers usually map to a 409.
    pub fn is_conflict(&self) -> bool {
        self.code == ErrorCode::UniqueViolation
    }

    /// `true` when `single()` found nothing.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NoRows
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ResponseError {}

impl From<OrmError> for ResponseError {
    fn from(err: OrmError) -> Self {
        let code = match &err {
            OrmError::NotFound(_) => ErrorCode::NoRows,
            OrmError::InvalidIdentifier(_) => ErrorCode::InvalidIdentifier,
            OrmError::Parse(_) => ErrorCode::MalformedFilter,
            OrmError::UniqueViolation(_) => ErrorCode::UniqueViolation,
            OrmError::ForeignKeyViolation(_) => ErrorCode::ForeignKeyViolation,
            OrmError::CheckViolation(_) => ErrorCode::CheckViolation,
            OrmError::Validation(_) | OrmError::Serialization(_) | OrmError::Misuse(_) => {
                ErrorCode::InvalidRequest
            }
            OrmError::Decode { .. } => ErrorCode::DecodeFailure,
            _ => ErrorCode::ExecutionFailure,
        };
        Self {
            code,
            message: err.to_string(),
            sqlstate: err.sqlstate().map(str::to_string),
        }
    }
}

/// Result envelope of one executed chain.
///
/// `error` is `None` on success. `data` is an object, an array, or `None`
/// depending on the row mode and the payload shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Option<Value>,
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            data,
            error: None,
            count: None,
        }
    }

    pub fn err(error: impl Into<ResponseError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            count: None,
        }
    }

    pub fn with_count(mut self, count: Option<i64>) -> Self {
        self.count = count;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Split into `Result`, keeping the raw JSON data.
    pub fn into_result(self) -> Result<Option<Value>, ResponseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Deserialize `data` into a concrete type at the call site that knows
    /// the row shape.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<Option<T>, ResponseError> {
        match self.into_result()? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| OrmError::decode("data", e.to_string()).into()),
        }
    }
}
