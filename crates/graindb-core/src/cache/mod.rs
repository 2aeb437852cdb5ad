mod clear;
mod fingerprint;

#[cfg(test)]
mod tests;

pub use clear::{CacheClearStrategy, NoopCacheClear};
pub use fingerprint::{Fingerprint, fingerprint_pairs};

use crate::{
    model::EntityModel,
    obs::{self, CacheTier, MetricsEvent},
    record::{PrimaryKey, Record},
    value::Value,
};
use dashmap::DashMap;
use std::collections::BTreeSet;

///
/// EntityCache
///
/// Three read-through cache tiers keyed by content:
/// - PK tier: primary-key projection → record snapshot
/// - "and" tier: (entity, field-subset projection) → record list
/// - "all" tier: entity name → full record list
///
/// The maps are safe for concurrent read/write, but there is no atomicity
/// between "check cache" and "populate cache": duplicate concurrent
/// population of the same key is tolerated and the last writer wins. The
/// cache never raises for its own inconsistency — a miss just means "not
/// cached yet".
///
/// Records are defensively copied on the way in and out; neither side can
/// mutate a cached snapshot in place.
///

#[derive(Default)]
pub struct EntityCache {
    pk: DashMap<(String, Fingerprint), Record>,
    and: DashMap<(String, Fingerprint), Vec<Record>>,
    all: DashMap<String, Vec<Record>>,
    /// Every field subset ever used as an "and" key, per entity. Needed to
    /// regenerate fingerprints from a changed record during invalidation.
    subsets: DashMap<String, BTreeSet<Vec<String>>>,
}

impl EntityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    //
    // PK tier
    //

    #[must_use]
    pub fn get_by_pk(&self, pk: &PrimaryKey) -> Option<Record> {
        let key = (pk.entity_name().to_string(), fingerprint_pairs(pk.pairs()));
        let hit = self.pk.get(&key).map(|entry| entry.value().clone());
        obs::record(match hit {
            Some(_) => MetricsEvent::CacheHit { tier: CacheTier::Pk },
            None => MetricsEvent::CacheMiss { tier: CacheTier::Pk },
        });
        hit
    }

    /// Cache one record under its primary key. Records of never-cache
    /// entities and records without a complete PK are skipped silently.
    pub fn put_by_pk(&self, record: &Record) {
        if record.model().never_cache {
            return;
        }
        let Ok(pk) = record.primary_key() else {
            return;
        };
        let key = (pk.entity_name().to_string(), fingerprint_pairs(pk.pairs()));
        self.pk.insert(key, record.clone());
    }

    pub fn remove_by_pk(&self, pk: &PrimaryKey) {
        let key = (pk.entity_name().to_string(), fingerprint_pairs(pk.pairs()));
        self.pk.remove(&key);
    }

    //
    // "and" tier
    //

    #[must_use]
    pub fn get_by_and(&self, entity_name: &str, pairs: &[(String, Value)]) -> Option<Vec<Record>> {
        let key = (entity_name.to_string(), fingerprint_pairs(pairs));
        let hit = self.and.get(&key).map(|entry| entry.value().clone());
        obs::record(match hit {
            Some(_) => MetricsEvent::CacheHit { tier: CacheTier::And },
            None => MetricsEvent::CacheMiss { tier: CacheTier::And },
        });
        hit
    }

    /// Cache a filtered result list under its field-subset fingerprint and
    /// track the subset for later invalidation.
    pub fn put_by_and(
        &self,
        model: &EntityModel,
        pairs: &[(String, Value)],
        records: &[Record],
    ) {
        if model.never_cache {
            return;
        }

        let mut subset: Vec<String> = pairs.iter().map(|(name, _)| name.clone()).collect();
        subset.sort_unstable();
        self.subsets
            .entry(model.entity_name.clone())
            .or_default()
            .insert(subset);

        let key = (model.entity_name.clone(), fingerprint_pairs(pairs));
        self.and.insert(key, records.to_vec());
    }

    //
    // "all" tier
    //

    #[must_use]
    pub fn get_all(&self, entity_name: &str) -> Option<Vec<Record>> {
        let hit = self.all.get(entity_name).map(|entry| entry.value().clone());
        obs::record(match hit {
            Some(_) => MetricsEvent::CacheHit { tier: CacheTier::All },
            None => MetricsEvent::CacheMiss { tier: CacheTier::All },
        });
        hit
    }

    pub fn put_all(&self, model: &EntityModel, records: &[Record]) {
        if model.never_cache {
            return;
        }
        self.all
            .insert(model.entity_name.clone(), records.to_vec());
    }

    pub fn remove_all(&self, entity_name: &str) {
        self.all.remove(entity_name);
    }

    //
    // Invalidation
    //

    /// Invalidate every entry a mutation of `record` could have made stale:
    /// its PK entry, its entity's "all" entry, and — for every tracked
    /// field subset — both the pre-mutation and post-mutation fingerprints,
    /// since the record may have moved into or out of a cached filter's
    /// result set.
    pub fn invalidate_record(&self, record: &Record) {
        if record.model().never_cache {
            return;
        }
        let entity_name = record.entity_name();

        if let Ok(pk) = record.primary_key() {
            self.remove_by_pk(&pk);
        }
        self.all.remove(entity_name);

        let Some(subsets) = self
            .subsets
            .get(entity_name)
            .map(|entry| entry.value().clone())
        else {
            return;
        };
        for subset in &subsets {
            let fields: Vec<&str> = subset.iter().map(String::as_str).collect();
            if let Ok(pairs) = record.projection(&fields) {
                self.and
                    .remove(&(entity_name.to_string(), fingerprint_pairs(&pairs)));
            }
            if let Ok(Some(pairs)) = record.original_projection(&fields) {
                self.and
                    .remove(&(entity_name.to_string(), fingerprint_pairs(&pairs)));
            }
        }
    }

    /// Invalidate for a removal known only by primary key. Without field
    /// values the "and" fingerprints cannot be regenerated, so the whole
    /// "and" line for the entity is dropped.
    pub fn invalidate_pk(&self, pk: &PrimaryKey) {
        self.remove_by_pk(pk);
        self.all.remove(pk.entity_name());
        let entity_name = pk.entity_name().to_string();
        self.and.retain(|key, _| key.0 != entity_name);
    }

    //
    // Administration
    //

    /// Drop every cached entry for one entity. Tracked subsets survive; a
    /// subset registration is not an entry.
    pub fn clear_entity(&self, entity_name: &str) {
        self.pk.retain(|key, _| key.0 != entity_name);
        self.and.retain(|key, _| key.0 != entity_name);
        self.all.remove(entity_name);
    }

    /// Drop everything in all three tiers.
    pub fn clear_all(&self) {
        self.pk.clear();
        self.and.clear();
        self.all.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pk.len() + self.and.len() + self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
