//! Core runtime for GrainDB: runtime entity models, generic records, the
//! condition algebra, dialect-aware SQL synthesis, the generic DAO, the
//! three-tier cache, banked sequences, and the delegator facade.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod condition;
pub mod dao;
pub mod delegator;
pub mod error;
pub mod model;
pub mod obs;
pub mod port;
pub mod record;
pub mod sequence;
pub mod sql;
pub mod value;

// In-memory backend and model fixtures for tests; not product surface.
#[doc(hidden)]
pub mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, caches, ports, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        condition::Condition,
        dao::{FindOptions, OrderSpec},
        delegator::{Delegator, DelegatorBuilder},
        model::EntityModel,
        record::{PrimaryKey, Record},
        sql::Dialect,
        value::Value,
    };
}
