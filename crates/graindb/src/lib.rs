//! GrainDB — a schema-driven generic persistence layer over relational
//! databases.
//!
//! ## Crate layout
//! - `core`: runtime entity models, records, conditions, SQL synthesis,
//!   the generic DAO, caching, sequences, and the delegator facade.
//! - `error`: the stable public error type with its class + origin
//!   taxonomy.
//!
//! The `prelude` module mirrors the surface application code uses to wire
//! up and talk to a [`core::delegator::Delegator`].

pub use graindb_core as core;

pub mod error;

pub use error::{Error, ErrorClass, ErrorOrigin};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        Error,
        core::{
            condition::{CompareOp, Condition, JoinOp},
            dao::{CursorScroll, FindOptions, OrderSpec, RecordCursor, RetryPolicy},
            delegator::{DatasourceConfig, Delegator, DelegatorBuilder},
            model::{
                EntityModel, FieldModel, FieldType, KeyMapEntry, ModelRegistry, RelationKind,
                RelationModel, ViewAlias, ViewLink, ViewMember, ViewModel,
            },
            port::{ConnectionProvider, SqlConnection, SqlRows, TransactionFacade},
            record::{PrimaryKey, Record},
            sequence::SequenceConfig,
            sql::Dialect,
            value::{Timestamp, Value},
        },
    };
}
