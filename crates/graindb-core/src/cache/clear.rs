use crate::record::{PrimaryKey, Record};

///
/// CacheClearStrategy
///
/// Injected hook notified on every cache invalidation, so a distributed
/// deployment can propagate clears to its peers. The local cache has
/// already been invalidated by the time a hook runs; implementations only
/// forward the event.
///

pub trait CacheClearStrategy: Send + Sync {
    /// A record was created, updated, or removed by full record.
    fn record_changed(&self, record: &Record);

    /// A row was removed by bare primary key.
    fn pk_removed(&self, pk: &PrimaryKey);

    /// One entity's cache line was cleared.
    fn entity_cleared(&self, entity_name: &str);

    /// Every cache line was cleared.
    fn all_cleared(&self);
}

///
/// NoopCacheClear
/// Default strategy for single-process deployments.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCacheClear;

impl CacheClearStrategy for NoopCacheClear {
    fn record_changed(&self, _record: &Record) {}

    fn pk_removed(&self, _pk: &PrimaryKey) {}

    fn entity_cleared(&self, _entity_name: &str) {}

    fn all_cleared(&self) {}
}
