//! Persistent, bounded translation cache.
//!
//! Maps (target language, model, source text) to translated text. The only
//! cross-session state in the pipeline: loaded once at startup, rewritten in
//! full after every insert. Eviction is FIFO by insertion order — a cache
//! hit never refreshes an entry's position, and overwriting an existing key
//! keeps its original slot. This approximates LRU cheaply and is preserved
//! behavior, not an oversight.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::config::constants;
use crate::error::StoreError;
use crate::store::ConfigStore;

/// Persisted layout: `{ language: { model: { source: translated } } }`.
type Partitions = HashMap<String, HashMap<String, HashMap<String, String>>>;

#[derive(Debug)]
pub struct TranslationCache {
    partitions: Partitions,
    /// Insertion log across all partitions, oldest first.
    order: VecDeque<(String, String, String)>,
    capacity: usize,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(constants::MAX_CACHE_ITEMS)
    }
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            partitions: Partitions::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Reads the persisted blob. An absent key, a store failure, or a
    /// malformed blob all yield an empty cache.
    pub async fn load<S: ConfigStore>(store: &S, capacity: usize) -> Self {
        let mut cache = Self::new(capacity);
        let values = match store.get(&[constants::keys::CACHE]).await {
            Ok(values) => values,
            Err(err) => {
                warn!("cache read failed, starting empty: {err}");
                return cache;
            }
        };
        let Some(blob) = values.get(constants::keys::CACHE) else {
            return cache;
        };
        match serde_json::from_value::<Partitions>(blob.clone()) {
            Ok(partitions) => {
                for (lang, models) in &partitions {
                    for (model, entries) in models {
                        for source in entries.keys() {
                            cache
                                .order
                                .push_back((lang.clone(), model.clone(), source.clone()));
                        }
                    }
                }
                cache.partitions = partitions;
                cache.enforce_capacity();
                debug!("loaded {} cached translations", cache.len());
            }
            Err(err) => warn!("discarding malformed cache blob: {err}"),
        }
        cache
    }

    pub fn get(&self, lang: &str, model: &str, text: &str) -> Option<&str> {
        self.partitions
            .get(lang)?
            .get(model)?
            .get(text)
            .map(String::as_str)
    }

    pub fn contains(&self, lang: &str, model: &str, text: &str) -> bool {
        self.get(lang, model, text).is_some()
    }

    /// Total entry count across all (language, model) partitions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts or overwrites one entry without persisting.
    pub fn insert(&mut self, lang: &str, model: &str, text: &str, translated: &str) {
        let entries = self
            .partitions
            .entry(lang.to_string())
            .or_default()
            .entry(model.to_string())
            .or_default();
        if entries
            .insert(text.to_string(), translated.to_string())
            .is_none()
        {
            self.order
                .push_back((lang.to_string(), model.to_string(), text.to_string()));
        }
    }

    /// Removes oldest-inserted entries until the count is back at the cap.
    /// Returns how many were evicted.
    pub fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.order.len() > self.capacity {
            let Some((lang, model, text)) = self.order.pop_front() else {
                break;
            };
            if let Some(models) = self.partitions.get_mut(&lang) {
                if let Some(entries) = models.get_mut(&model) {
                    entries.remove(&text);
                    if entries.is_empty() {
                        models.remove(&model);
                    }
                }
                if models.is_empty() {
                    self.partitions.remove(&lang);
                }
            }
            evicted += 1;
        }
        evicted
    }

    /// Rewrites the whole persisted blob. Bounded size keeps this cheap.
    pub async fn persist<S: ConfigStore>(&self, store: &S) -> Result<(), StoreError> {
        let blob = serde_json::to_value(&self.partitions)?;
        let mut entries = HashMap::new();
        entries.insert(constants::keys::CACHE.to_string(), blob);
        store.set(entries).await
    }

    /// Insert, enforce the capacity invariant, persist.
    pub async fn put<S: ConfigStore>(
        &mut self,
        store: &S,
        lang: &str,
        model: &str,
        text: &str,
        translated: &str,
    ) -> Result<(), StoreError> {
        self.insert(lang, model, text, translated);
        let evicted = self.enforce_capacity();
        if evicted > 0 {
            debug!("evicted {evicted} cache entries at capacity {}", self.capacity);
        }
        self.persist(store).await
    }
}
