//! In-memory SQL backend for tests.
//!
//! `MemDb` implements the port traits over a naive table store plus an
//! interpreter for exactly the statement shapes this crate's builders emit
//! (see `interp`). It exists so DAO, delegator, cache, sequence, and
//! transform tests can exercise the full statement pipeline without a
//! database server. It is test tooling, not product surface.

mod fixtures;
mod interp;

pub use fixtures::*;

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    port::{ConnectionProvider, SqlConnection, SqlRows},
    value::Value,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

///
/// Table
///

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

///
/// UndoOp
/// Inverse operations recorded while a connection is inside an explicit
/// transaction. Rollback replays them in reverse.
///

#[derive(Clone, Debug)]
enum UndoOp {
    RemoveInserted {
        table: String,
        row: Vec<Value>,
    },
    /// Inverse of a relative `SET col = col + ?` update. Subtraction
    /// commutes with concurrent adds, which is what makes rollback safe
    /// under interleaving for the sequence-refill protocol.
    ReverseAdd {
        table: String,
        col_idx: usize,
        key_idx: usize,
        key: Value,
        delta: i64,
    },
    RestoreRow {
        table: String,
        before: Vec<Value>,
        after: Vec<Value>,
    },
    ReinsertDeleted {
        table: String,
        row: Vec<Value>,
    },
}

///
/// MemDb
/// Shared in-memory table store. Each statement executes atomically under
/// one lock, so concurrent connections interleave at statement granularity
/// exactly like autocommitting sessions.
///

#[derive(Default)]
pub struct MemDb {
    tables: Mutex<HashMap<String, Table>>,
    statement_log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemDb {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_table(&self, name: &str, columns: &[&str]) {
        let mut tables = self.lock_tables();
        tables.insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn seed_row(&self, name: &str, row: Vec<Value>) {
        let mut tables = self.lock_tables();
        if let Some(table) = tables.get_mut(name) {
            table.rows.push(row);
        }
    }

    #[must_use]
    pub fn snapshot_rows(&self, name: &str) -> Vec<Vec<Value>> {
        self.lock_tables()
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.lock_tables().contains_key(name)
    }

    #[must_use]
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statement_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        self.statement_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sql.to_string(), params.to_vec()));
    }

    pub(crate) fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashMap<String, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn storage_error(message: impl Into<String>) -> InternalError {
    InternalError::new(ErrorClass::Storage, ErrorOrigin::Dao, message)
}

///
/// MemProvider
///

pub struct MemProvider {
    db: Arc<MemDb>,
}

impl MemProvider {
    #[must_use]
    pub fn new(db: Arc<MemDb>) -> Arc<Self> {
        Arc::new(Self { db })
    }
}

impl ConnectionProvider for MemProvider {
    fn connection(&self, _datasource: &str) -> Result<Box<dyn SqlConnection>, InternalError> {
        Ok(Box::new(MemConnection {
            db: Arc::clone(&self.db),
            undo: Vec::new(),
            in_txn: false,
        }))
    }
}

///
/// MemConnection
///

pub struct MemConnection {
    db: Arc<MemDb>,
    undo: Vec<UndoOp>,
    in_txn: bool,
}

impl MemConnection {
    fn record_undo(&mut self, op: UndoOp) {
        if self.in_txn {
            self.undo.push(op);
        }
    }
}

impl SqlConnection for MemConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, InternalError> {
        self.db.log_statement(sql, params);
        interp::execute(self, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn SqlRows>, InternalError> {
        self.db.log_statement(sql, params);
        let rows = interp::query(self, sql, params)?;
        Ok(Box::new(MemRows { rows, next: 0 }))
    }

    fn begin(&mut self) -> Result<(), InternalError> {
        if self.in_txn {
            return Err(storage_error("nested transaction"));
        }
        self.in_txn = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), InternalError> {
        self.in_txn = false;
        self.undo.clear();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), InternalError> {
        self.in_txn = false;
        let undo: Vec<UndoOp> = self.undo.drain(..).collect();
        let mut tables = self.db.lock_tables();

        for op in undo.into_iter().rev() {
            match op {
                UndoOp::RemoveInserted { table, row } => {
                    if let Some(t) = tables.get_mut(&table)
                        && let Some(idx) = t.rows.iter().position(|r| *r == row)
                    {
                        t.rows.remove(idx);
                    }
                }
                UndoOp::ReverseAdd {
                    table,
                    col_idx,
                    key_idx,
                    key,
                    delta,
                } => {
                    if let Some(t) = tables.get_mut(&table) {
                        for r in &mut t.rows {
                            if r.get(key_idx) == Some(&key)
                                && let Some(Value::Int(n)) = r.get_mut(col_idx)
                            {
                                *n -= delta;
                            }
                        }
                    }
                }
                UndoOp::RestoreRow {
                    table,
                    before,
                    after,
                } => {
                    if let Some(t) = tables.get_mut(&table)
                        && let Some(idx) = t.rows.iter().position(|r| *r == after)
                    {
                        t.rows[idx] = before;
                    }
                }
                UndoOp::ReinsertDeleted { table, row } => {
                    if let Some(t) = tables.get_mut(&table) {
                        t.rows.push(row);
                    }
                }
            }
        }

        Ok(())
    }
}

///
/// MemRows
///

pub struct MemRows {
    rows: Vec<Vec<Value>>,
    next: usize,
}

impl SqlRows for MemRows {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, InternalError> {
        if self.next >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.next].clone();
        self.next += 1;
        Ok(Some(row))
    }
}
