use crate::{error::InternalError, value::Value};

///
/// SqlRows
/// Forward iteration over one live result set.
///

pub trait SqlRows: Send {
    /// Fetch the next row, or `None` when the result set is exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, InternalError>;
}

///
/// SqlConnection
///
/// One SQL session. A DAO call owns exactly one connection for its
/// duration; connections are never shared across concurrent calls.
/// Statements bind positional `?` parameters from `params` in order.
///

pub trait SqlConnection: Send {
    /// Execute a mutation or DDL statement, returning the affected-row
    /// count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, InternalError>;

    /// Execute a query, returning its result rows.
    fn query(&mut self, sql: &str, params: &[Value])
    -> Result<Box<dyn SqlRows>, InternalError>;

    /// Leave autocommit and open an explicit transaction.
    fn begin(&mut self) -> Result<(), InternalError>;

    /// Commit the open transaction and return to autocommit.
    fn commit(&mut self) -> Result<(), InternalError>;

    /// Roll back the open transaction and return to autocommit.
    fn rollback(&mut self) -> Result<(), InternalError>;
}

///
/// ConnectionProvider
/// Pooled-connection source keyed by datasource name (external
/// collaborator).
///

pub trait ConnectionProvider: Send + Sync {
    fn connection(&self, datasource: &str) -> Result<Box<dyn SqlConnection>, InternalError>;
}

///
/// TransactionFacade
///
/// External begin/commit/rollback facility used to wrap multi-statement
/// sequences spanning more than one datasource. `begin` returns whether a
/// new transaction was actually started (false when already inside one);
/// the paired `commit`/`rollback` receive that flag back.
///

pub trait TransactionFacade: Send + Sync {
    fn begin(&self, timeout_secs: u32) -> Result<bool, InternalError>;

    fn commit(&self, began: bool) -> Result<(), InternalError>;

    fn rollback(&self, began: bool) -> Result<(), InternalError>;
}

///
/// NoopTransaction
/// Default facade for single-datasource deployments with driver-level
/// autocommit.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransaction;

impl TransactionFacade for NoopTransaction {
    fn begin(&self, _timeout_secs: u32) -> Result<bool, InternalError> {
        Ok(false)
    }

    fn commit(&self, _began: bool) -> Result<(), InternalError> {
        Ok(())
    }

    fn rollback(&self, _began: bool) -> Result<(), InternalError> {
        Ok(())
    }
}
