use crate::{
    dao::GenericDao,
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::EntityModel,
    obs::{self, MetricsEvent},
    port::{SqlConnection, SqlRows},
    record::Record,
    sql::TempTablePlan,
};
use std::sync::Arc;

///
/// RecordCursor
///
/// Streaming read over a live result set. The cursor holds its connection
/// open until `close`, which also drops any temporary tables the statement
/// created; callers must close promptly (contract, not enforcement).
///
/// Rows already read are buffered, which is what makes backward movement
/// and absolute positioning possible over a forward-only port. The cursor
/// position is the index of the next row `next` would return.
///

pub struct RecordCursor {
    model: Arc<EntityModel>,
    conn: Option<Box<dyn SqlConnection>>,
    rows: Option<Box<dyn SqlRows>>,
    buffer: Vec<Record>,
    pos: usize,
    exhausted: bool,
    temp_tables: TempTablePlan,
    closed: bool,
}

impl RecordCursor {
    pub(crate) fn new(
        model: Arc<EntityModel>,
        conn: Box<dyn SqlConnection>,
        rows: Box<dyn SqlRows>,
        temp_tables: TempTablePlan,
    ) -> Self {
        Self {
            model,
            conn: Some(conn),
            rows: Some(rows),
            buffer: Vec::new(),
            pos: 0,
            exhausted: false,
            temp_tables,
            closed: false,
        }
    }

    /// Distinct error for operations on a closed cursor.
    pub(crate) fn closed_error() -> InternalError {
        InternalError::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Dao,
            "cursor already closed",
        )
    }

    fn ensure_open(&self) -> Result<(), InternalError> {
        if self.closed {
            Err(Self::closed_error())
        } else {
            Ok(())
        }
    }

    /// Pull one more row from the live result set into the buffer.
    /// Returns false once the result set is exhausted.
    fn fetch_one(&mut self) -> Result<bool, InternalError> {
        if self.exhausted {
            return Ok(false);
        }
        let Some(rows) = self.rows.as_mut() else {
            self.exhausted = true;
            return Ok(false);
        };

        match rows.next_row()? {
            Some(row) => {
                obs::record(MetricsEvent::RowsFetched { rows: 1 });
                self.buffer
                    .push(Record::from_stored_row(Arc::clone(&self.model), row)?);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// Advance and return the next record.
    pub fn next(&mut self) -> Result<Option<Record>, InternalError> {
        self.ensure_open()?;

        if self.pos >= self.buffer.len() && !self.fetch_one()? {
            return Ok(None);
        }
        let record = self.buffer[self.pos].clone();
        self.pos += 1;

        Ok(Some(record))
    }

    /// Move back and return the record before the last one returned, or
    /// `None` when already at the front.
    pub fn previous(&mut self) -> Result<Option<Record>, InternalError> {
        self.ensure_open()?;

        if self.pos <= 1 {
            self.pos = 0;
            return Ok(None);
        }
        self.pos -= 1;

        Ok(Some(self.buffer[self.pos - 1].clone()))
    }

    /// Position the cursor so that `next` returns row `index` (0-based).
    /// Returns whether such a row exists.
    pub fn absolute(&mut self, index: usize) -> Result<bool, InternalError> {
        self.ensure_open()?;

        while self.buffer.len() <= index && self.fetch_one()? {}
        self.pos = index.min(self.buffer.len());

        Ok(index < self.buffer.len())
    }

    /// Read every remaining record into a list.
    pub fn drain_remaining(&mut self) -> Result<Vec<Record>, InternalError> {
        self.ensure_open()?;

        let mut out = Vec::new();
        while let Some(record) = self.next()? {
            out.push(record);
        }

        Ok(out)
    }

    /// Read up to `n` records, optionally starting at an absolute position.
    pub fn next_n(
        &mut self,
        n: usize,
        from: Option<usize>,
    ) -> Result<Vec<Record>, InternalError> {
        self.ensure_open()?;

        if let Some(index) = from
            && !self.absolute(index)?
        {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.next()? {
                Some(record) => out.push(record),
                None => break,
            }
        }

        Ok(out)
    }

    /// Release the result set and connection, dropping any temporary
    /// tables first. Idempotent; a failed temp-table drop is surfaced after
    /// the connection is still released.
    pub fn close(&mut self) -> Result<(), InternalError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Result set first: some drivers hold the connection busy until the
        // rows are dropped.
        self.rows = None;

        let drop_result = match self.conn.as_mut() {
            Some(conn) if !self.temp_tables.is_empty() => {
                GenericDao::drop_temp_tables(conn.as_mut(), &self.temp_tables)
            }
            _ => Ok(()),
        };
        self.conn = None;

        drop_result
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for RecordCursor {
    fn drop(&mut self) {
        // Best-effort cleanup for callers that forget to close.
        let _ = self.close();
    }
}
