use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    /// Construct an InternalError from a class, origin, and message.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a model error for an unknown entity.
    pub fn unknown_entity(name: &str) -> Self {
        Self::new(
            ErrorClass::Model,
            ErrorOrigin::Model,
            format!("unknown entity: '{name}'"),
        )
    }

    /// Construct a model error for a field that does not exist on an entity.
    pub fn unknown_field(entity: &str, field: &str) -> Self {
        Self::new(
            ErrorClass::Model,
            ErrorOrigin::Model,
            format!("entity '{entity}' has no field '{field}'"),
        )
    }

    /// Construct a not-found error for a missing row.
    pub fn row_not_found(entity: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Dao,
            format!("no row found for entity '{entity}': {detail}"),
        )
    }

    /// Construct a stale-data error from an optimistic-lock mismatch.
    pub fn stale_data(entity: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::StaleData,
            ErrorOrigin::Dao,
            format!("stale data for entity '{entity}': {detail}"),
        )
    }

    /// Construct a storage error, keeping the attempted SQL for diagnostics.
    pub fn storage(origin: ErrorOrigin, sql: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Storage,
            origin,
            format!("storage failure: {detail} (sql: {sql})"),
        )
    }

    /// Construct an unsupported-operation error.
    pub fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct a configuration error.
    pub fn config(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, origin, message)
    }

    /// Construct a retry-exhaustion error.
    pub fn exhausted(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Exhausted, origin, message)
    }

    /// Construct a conflict error (lost race detected, caller may retry).
    pub fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.class, ErrorClass::StaleData)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Unknown dialect, missing datasource mapping, bad wiring.
    Config,
    /// Lost race detected; the whole operation may be retried by the caller.
    Conflict,
    /// Bounded retries used up without success.
    Exhausted,
    /// A field or entity name does not exist in the loaded schema.
    Model,
    /// A primary-key select or update-by-PK affected zero rows.
    NotFound,
    /// Optimistic-lock stamp mismatch detected before an update.
    StaleData,
    /// Driver/connection failure, wrapped with the attempted SQL.
    Storage,
    /// Operation not meaningful for this entity kind.
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Conflict => "conflict",
            Self::Exhausted => "exhausted",
            Self::Model => "model",
            Self::NotFound => "not_found",
            Self::StaleData => "stale_data",
            Self::Storage => "storage",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Cache,
    Condition,
    Dao,
    Delegator,
    Model,
    Sequence,
    Sql,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cache => "cache",
            Self::Condition => "condition",
            Self::Dao => "dao",
            Self::Delegator => "delegator",
            Self::Model => "model",
            Self::Sequence => "sequence",
            Self::Sql => "sql",
        };
        write!(f, "{label}")
    }
}
