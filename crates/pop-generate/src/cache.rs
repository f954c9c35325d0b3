use std::collections::{BTreeMap, HashMap};

use pop_core::{EntityApi, EntityId, FieldValue, Filter, backend_entity, filter_key};
use rand::{Rng, RngCore};
use tracing::debug;

use crate::errors::LookupError;

/// Upper bound on ids pulled by one bulk fetch.
pub const DEFAULT_FETCH_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
struct CacheEntry {
    ids: Vec<EntityId>,
    loaded: bool,
}

/// Ids of existing entities, per (entity type, filter).
///
/// An entry is filled by one bulk fetch the first time it is asked for and is
/// append-only afterwards. Ids registered before that fetch are kept and
/// merged in once it happens.
#[derive(Debug)]
pub struct EntityCache {
    entries: HashMap<String, CacheEntry>,
    fetch_limit: usize,
    default_filters: BTreeMap<String, Filter>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_LIMIT)
    }
}

impl EntityCache {
    pub fn new(fetch_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            fetch_limit,
            default_filters: BTreeMap::new(),
        }
    }

    /// Terms merged into every bulk fetch of `entity`. They do not change the cache key.
    pub fn with_default_filter(mut self, entity: impl Into<String>, filter: Filter) -> Self {
        self.default_filters.insert(entity.into(), filter);
        self
    }

    pub fn ids(
        &mut self,
        api: &dyn EntityApi,
        entity: &str,
        filter: Option<&Filter>,
    ) -> Result<&[EntityId], LookupError> {
        let key = filter_key(entity, filter);
        let entry = self.entries.entry(key).or_default();
        if !entry.loaded {
            let mut fetch_filter = self.default_filters.get(entity).cloned().unwrap_or_default();
            if let Some(filter) = filter {
                fetch_filter.extend(filter.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            let fetched = api.fetch_existing(entity, &fetch_filter, self.fetch_limit)?;
            let pending = std::mem::replace(&mut entry.ids, fetched);
            for id in pending {
                if !entry.ids.contains(&id) {
                    entry.ids.push(id);
                }
            }
            entry.loaded = true;
            debug!(entity = %entity, ids = entry.ids.len(), "entity cache filled");
        }
        Ok(&entry.ids)
    }

    pub fn random_id(
        &mut self,
        api: &dyn EntityApi,
        entity: &str,
        filter: Option<&Filter>,
        rng: &mut dyn RngCore,
    ) -> Result<EntityId, LookupError> {
        let ids = self.ids(api, entity, filter)?;
        if ids.is_empty() {
            return Err(LookupError::NoEntities {
                entity: entity.to_string(),
            });
        }
        Ok(ids[rng.random_range(0..ids.len())])
    }

    /// Make a freshly created id selectable for later references.
    pub fn register(&mut self, entity: &str, id: EntityId) {
        self.entries
            .entry(entity.to_string())
            .or_default()
            .ids
            .push(id);
    }

    /// Ids currently held for a key, without fetching.
    pub fn cached(&self, entity: &str, filter: Option<&Filter>) -> Option<&[EntityId]> {
        self.entries
            .get(&filter_key(entity, filter))
            .map(|entry| entry.ids.as_slice())
    }
}

/// Valid option keys per (entity type, field), fetched once and never changed.
#[derive(Debug, Default)]
pub struct OptionCache {
    entries: HashMap<(String, String), Vec<FieldValue>>,
}

impl OptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(
        &mut self,
        api: &dyn EntityApi,
        entity: &str,
        field: &str,
    ) -> Result<&[FieldValue], LookupError> {
        let key = (backend_entity(entity).to_string(), field.to_string());
        if !self.entries.contains_key(&key) {
            let options = api.valid_options(&key.0, field)?;
            debug!(entity = %key.0, field = %field, options = options.len(), "option cache filled");
            self.entries.insert(key.clone(), options);
        }
        Ok(self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn random_option(
        &mut self,
        api: &dyn EntityApi,
        entity: &str,
        field: &str,
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, LookupError> {
        let options = self.options(api, entity, field)?;
        if options.is_empty() {
            return Err(LookupError::NoOptions {
                entity: entity.to_string(),
                field: field.to_string(),
            });
        }
        Ok(options[rng.random_range(0..options.len())].clone())
    }
}
