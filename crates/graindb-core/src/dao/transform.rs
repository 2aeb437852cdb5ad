use crate::{
    condition::Condition,
    dao::{FindOptions, GenericDao},
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, entity::STAMP_FIELD},
    obs::{self, MetricsEvent},
    record::Record,
};
use std::sync::Arc;

impl GenericDao {
    /// Read-modify-apply-retry over every record matching a condition.
    ///
    /// For each record the mutation closure is applied to a working copy
    /// and an UPDATE is attempted conditioned on the stamp value observed
    /// at read time. Zero affected rows means another writer won the race:
    /// the record is re-selected fresh, a jittered backoff is slept, and
    /// the mutate-and-update cycle repeats. Losing a race is not an error
    /// path — only I/O failure or exhausting the retry bound is.
    ///
    /// Returns the stored records as written.
    pub fn transform(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
        mutate: &mut dyn FnMut(&mut Record) -> Result<(), InternalError>,
    ) -> Result<Vec<Record>, InternalError> {
        if !model.optimistic_lock {
            return Err(InternalError::unsupported(
                ErrorOrigin::Dao,
                format!(
                    "transform requires optimistic locking on entity '{}'",
                    model.entity_name
                ),
            ));
        }

        let matched =
            self.select_by_condition(model, condition, &[], &FindOptions::default())?;

        let mut stored = Vec::with_capacity(matched.len());
        for record in matched {
            stored.push(self.transform_one(model, record, mutate)?);
        }

        Ok(stored)
    }

    fn transform_one(
        &self,
        model: &Arc<EntityModel>,
        mut record: Record,
        mutate: &mut dyn FnMut(&mut Record) -> Result<(), InternalError>,
    ) -> Result<Record, InternalError> {
        let policy = self.policy();
        let fields: Vec<String> = model
            .nonpk_fields()
            .filter(|f| f.name != STAMP_FIELD)
            .map(|f| f.name.clone())
            .collect();

        let mut tries = 0u32;
        loop {
            tries += 1;

            let observed_stamp = record.get_or_null(STAMP_FIELD);
            let mut working = record.clone();
            mutate(&mut working)?;

            // Conditioned on the stamp as observed at read time; the lock
            // pre-check is skipped since the WHERE clause is the check.
            let stamp_guard = Condition::eq(STAMP_FIELD, observed_stamp);
            let mut conn = self.conn()?;
            let affected = self.update_on(
                conn.as_mut(),
                model,
                &mut working,
                &fields,
                Some(&stamp_guard),
                false,
            )?;
            drop(conn);

            if affected > 0 {
                working.snapshot_stored();
                return Ok(working);
            }

            // Lost the race: another writer advanced the stamp.
            obs::record(MetricsEvent::LockConflict);
            obs::record(MetricsEvent::TransformRetry);

            if tries >= policy.max_tries {
                return Err(InternalError::exhausted(
                    ErrorOrigin::Dao,
                    format!(
                        "transform on '{}' gave up after {tries} contested attempts ({})",
                        model.entity_name,
                        record.primary_key()?,
                    ),
                ));
            }
            policy.backoff();

            let pk = record.primary_key()?;
            record = self
                .select_by_pk(model, &pk)?
                .ok_or_else(|| InternalError::row_not_found(&model.entity_name, &pk))?;
        }
    }
}
