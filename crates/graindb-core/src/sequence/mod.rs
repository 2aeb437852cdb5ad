
use crate::{
    dao::RetryPolicy,
    error::{ErrorOrigin, InternalError},
    obs::{self, MetricsEvent, StatementKind},
    port::{ConnectionProvider, SqlConnection},
    sql::{Dialect, SelectBuilder},
    value::Value,
};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};

///
/// SequenceConfig
///

#[derive(Clone, Debug)]
pub struct SequenceConfig {
    pub table_name: String,
    pub name_column: String,
    pub id_column: String,
    /// Size of one reserved bank of IDs.
    pub bank_size: i64,
    /// Counter value a brand-new sequence row starts at.
    pub start_value: i64,
    /// Use a locking read during refill to reduce cross-process collisions.
    pub cluster_mode: bool,
    pub policy: RetryPolicy,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            table_name: "SEQUENCE_VALUE_ITEM".to_string(),
            name_column: "SEQ_NAME".to_string(),
            id_column: "SEQ_ID".to_string(),
            bank_size: 10,
            start_value: 10_000,
            cluster_mode: false,
            policy: RetryPolicy::default(),
        }
    }
}

///
/// SequenceBank
/// One reserved ID range. Invariant: `current <= max`; the bank is empty
/// when they are equal and a refill must occur before issuing further IDs.
///

#[derive(Debug)]
struct SequenceBank {
    current: i64,
    max: i64,
}

impl SequenceBank {
    const fn empty() -> Self {
        Self { current: 0, max: 0 }
    }

    const fn is_exhausted(&self) -> bool {
        self.current >= self.max
    }
}

///
/// SequenceRegistry
///
/// Banked ID allocation: per-sequence-name in-memory banks refilled from a
/// durable counter row. The per-name mutex is the in-process fast path;
/// cross-process safety comes from the double-read refill protocol (and
/// optionally a locking read in cluster mode).
///

pub struct SequenceRegistry {
    datasource: String,
    dialect: Dialect,
    provider: Arc<dyn ConnectionProvider>,
    config: SequenceConfig,
    banks: DashMap<String, Arc<Mutex<SequenceBank>>>,
}

impl SequenceRegistry {
    #[must_use]
    pub fn new(
        datasource: &str,
        dialect: Dialect,
        provider: Arc<dyn ConnectionProvider>,
        config: SequenceConfig,
    ) -> Self {
        Self {
            datasource: datasource.to_string(),
            dialect,
            provider,
            config,
            banks: DashMap::new(),
        }
    }

    /// Allocate the next ID for a sequence. Fails loudly on refill
    /// exhaustion — there is no sentinel ID a caller could mistake for a
    /// valid allocation.
    pub fn next_seq_id(&self, name: &str) -> Result<i64, InternalError> {
        let bank = self
            .banks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SequenceBank::empty())))
            .clone();

        let mut bank = bank.lock().unwrap_or_else(PoisonError::into_inner);
        if bank.is_exhausted() {
            self.refill(name, &mut bank)?;
        }

        let id = bank.current;
        bank.current += 1;

        Ok(id)
    }

    /// Refill protocol: read the counter (`val1`), advance it by one bank,
    /// re-read (`val2`). `val2 == val1 + bank_size` proves the window was
    /// uncontested; anything else means another process interleaved, so
    /// roll back, back off with jitter, and try again up to the bound.
    fn refill(&self, name: &str, bank: &mut SequenceBank) -> Result<(), InternalError> {
        let policy = self.config.policy;

        for attempt in 1..=policy.max_tries {
            let mut conn = self.provider.connection(&self.datasource)?;
            conn.begin()?;

            match self.attempt_refill(conn.as_mut(), name) {
                Ok(Some((low, high))) => {
                    conn.commit()?;
                    bank.current = low;
                    bank.max = high;
                    obs::record(MetricsEvent::SequenceRefill);
                    return Ok(());
                }
                Ok(None) => {
                    conn.rollback()?;
                    if attempt < policy.max_tries {
                        policy.backoff();
                    }
                }
                Err(err) => {
                    let _ = conn.rollback();
                    return Err(err);
                }
            }
        }

        Err(InternalError::exhausted(
            ErrorOrigin::Sequence,
            format!(
                "sequence '{name}' refill contested {} times; giving up",
                policy.max_tries
            ),
        ))
    }

    /// One read-update-read cycle. `Ok(None)` is a detected collision.
    fn attempt_refill(
        &self,
        conn: &mut dyn SqlConnection,
        name: &str,
    ) -> Result<Option<(i64, i64)>, InternalError> {
        let cfg = &self.config;
        let name_value = Value::from(name);

        let val1 = match self.read_counter(conn, name, cfg.cluster_mode)? {
            Some(val) => val,
            None => {
                // First use of this sequence: seed the durable row. A
                // failed insert means another process seeded it in the same
                // window; treat that as a collision and retry.
                let insert_sql = format!(
                    "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                    cfg.table_name, cfg.name_column, cfg.id_column
                );
                obs::record(MetricsEvent::StatementExecuted {
                    kind: StatementKind::Insert,
                });
                if conn
                    .execute(&insert_sql, &[name_value.clone(), Value::Int(cfg.start_value)])
                    .is_err()
                {
                    return Ok(None);
                }
                cfg.start_value
            }
        };

        let update_sql = format!(
            "UPDATE {} SET {} = {} + ? WHERE {} = ?",
            cfg.table_name, cfg.id_column, cfg.id_column, cfg.name_column
        );
        obs::record(MetricsEvent::StatementExecuted {
            kind: StatementKind::Update,
        });
        let affected = conn.execute(&update_sql, &[Value::Int(cfg.bank_size), name_value])?;
        if affected == 0 {
            return Ok(None);
        }

        let val2 = self
            .read_counter(conn, name, false)?
            .ok_or_else(|| {
                InternalError::new(
                    crate::error::ErrorClass::Storage,
                    ErrorOrigin::Sequence,
                    format!("sequence row for '{name}' vanished during refill"),
                )
            })?;

        if val2 == val1 + cfg.bank_size {
            Ok(Some((val1, val2)))
        } else {
            Ok(None)
        }
    }

    fn read_counter(
        &self,
        conn: &mut dyn SqlConnection,
        name: &str,
        locking: bool,
    ) -> Result<Option<i64>, InternalError> {
        let cfg = &self.config;
        let sql = SelectBuilder::new(&cfg.table_name)
            .column(&cfg.id_column)
            .where_sql(Some(format!("{} = ?", cfg.name_column)))
            .for_update(locking)
            .build(self.dialect, None)?;

        obs::record(MetricsEvent::StatementExecuted {
            kind: StatementKind::Select,
        });
        let mut rows = conn.query(&sql, &[Value::from(name)])?;
        match rows.next_row()? {
            None => Ok(None),
            Some(row) => match row.first() {
                Some(Value::Int(n)) => Ok(Some(*n)),
                other => Err(InternalError::new(
                    crate::error::ErrorClass::Storage,
                    ErrorOrigin::Sequence,
                    format!("sequence counter for '{name}' is not an integer: {other:?}"),
                )),
            },
        }
    }
}
