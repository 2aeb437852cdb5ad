use derive_more::Display;
use graindb_core::error::{self, InternalError};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable class + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Missing-row errors, so callers can branch on "missing" vs "broken".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    /// Optimistic-lock conflicts, retryable by re-reading first.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.class, ErrorClass::StaleData)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self {
            class: err.class.into(),
            origin: err.origin.into(),
            message: err.message,
        }
    }
}

///
/// ErrorClass
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    #[display("config")]
    Config,
    #[display("conflict")]
    Conflict,
    #[display("exhausted")]
    Exhausted,
    #[display("model")]
    Model,
    #[display("not_found")]
    NotFound,
    #[display("stale_data")]
    StaleData,
    #[display("storage")]
    Storage,
    #[display("unsupported")]
    Unsupported,
}

impl From<error::ErrorClass> for ErrorClass {
    fn from(class: error::ErrorClass) -> Self {
        match class {
            error::ErrorClass::Config => Self::Config,
            error::ErrorClass::Conflict => Self::Conflict,
            error::ErrorClass::Exhausted => Self::Exhausted,
            error::ErrorClass::Model => Self::Model,
            error::ErrorClass::NotFound => Self::NotFound,
            error::ErrorClass::StaleData => Self::StaleData,
            error::ErrorClass::Storage => Self::Storage,
            error::ErrorClass::Unsupported => Self::Unsupported,
        }
    }
}

///
/// ErrorOrigin
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    #[display("cache")]
    Cache,
    #[display("condition")]
    Condition,
    #[display("dao")]
    Dao,
    #[display("delegator")]
    Delegator,
    #[display("model")]
    Model,
    #[display("sequence")]
    Sequence,
    #[display("sql")]
    Sql,
}

impl From<error::ErrorOrigin> for ErrorOrigin {
    fn from(origin: error::ErrorOrigin) -> Self {
        match origin {
            error::ErrorOrigin::Cache => Self::Cache,
            error::ErrorOrigin::Condition => Self::Condition,
            error::ErrorOrigin::Dao => Self::Dao,
            error::ErrorOrigin::Delegator => Self::Delegator,
            error::ErrorOrigin::Model => Self::Model,
            error::ErrorOrigin::Sequence => Self::Sequence,
            error::ErrorOrigin::Sql => Self::Sql,
        }
    }
}
