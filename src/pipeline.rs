//! Pipeline state and the harvest/submit/apply cycle.
//!
//! One `Pipeline` per parsed document. All mutable state for the page lives
//! here: the enablement flags, the done/in-flight membership sets, the batch
//! queue and the translation cache. Execution is cooperative and
//! single-threaded; the event driver in [`crate::watcher`] decides when to
//! harvest and when to pump the queue.

use std::collections::HashSet;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tracing::{debug, info, warn};

use crate::backend::{build_instructions, BackendRequest, TranslationBackend};
use crate::cache::TranslationCache;
use crate::config::{constants, PipelineConfig};
use crate::dom::{self, NodeKey};
use crate::error::{PipelineError, PipelineResult};
use crate::filter::EligibilityFilter;
use crate::harvest;
use crate::queue::{Batch, BatchQueue};
use crate::store::ConfigStore;
use crate::watcher::PageEvent;

/// Outcome of one pump pass over the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// The queue was already empty.
    Idle,
    /// Every queued batch resolved; `usize` batches were drained.
    Drained(usize),
    /// The head batch failed retryably and stays queued. Pump again after
    /// the delay.
    RetryAfter(Duration),
    /// Translation is off for this page. The queue keeps its batches and
    /// waits for a toggle event.
    Disabled,
}

/// What the event driver should do next after the pipeline handled an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    None,
    HarvestNow,
    /// Harvest after a settle delay, letting a burst of DOM churn finish.
    HarvestAfter(Duration),
}

pub struct Pipeline<S: ConfigStore, B: TranslationBackend> {
    document: Handle,
    body: Option<Handle>,
    origin: String,
    config: PipelineConfig,
    enabled: bool,
    translated: HashSet<NodeKey>,
    translating: HashSet<NodeKey>,
    queue: BatchQueue,
    cache: TranslationCache,
    filter: EligibilityFilter,
    store: S,
    backend: B,
}

impl<S: ConfigStore, B: TranslationBackend> Pipeline<S, B> {
    pub fn new(document: Handle, origin: impl Into<String>, store: S, backend: B) -> Self {
        let body = dom::find_body(&document);
        Self {
            document,
            body,
            origin: origin.into(),
            config: PipelineConfig::default(),
            enabled: false,
            translated: HashSet::new(),
            translating: HashSet::new(),
            queue: BatchQueue::new(),
            cache: TranslationCache::default(),
            filter: EligibilityFilter::new(),
            store,
            backend,
        }
    }

    /// Loads configuration and the persisted cache, then derives the
    /// effective enablement for this page's origin.
    pub async fn init(&mut self) {
        self.config = PipelineConfig::load(&self.store).await;
        self.enabled = self.config.enabled_for(&self.origin);
        self.cache = TranslationCache::load(&self.store, self.config.max_cache_items).await;
        info!(
            origin = %self.origin,
            enabled = self.enabled,
            cached = self.cache.len(),
            "pipeline initialized"
        );
    }

    pub fn document(&self) -> &Handle {
        &self.document
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    pub fn is_translated(&self, key: NodeKey) -> bool {
        self.translated.contains(&key)
    }

    pub fn is_in_flight(&self, key: NodeKey) -> bool {
        self.translating.contains(&key)
    }

    /// Walks the document for eligible units and appends them to the queue
    /// as chunked batches tagged with the current language and model.
    /// Returns the number of batches appended.
    pub fn harvest(&mut self) -> usize {
        if !self.enabled {
            return 0;
        }
        let Some(body) = &self.body else {
            return 0;
        };
        let units = harvest::harvest(body, &self.filter, &self.translated, &self.translating);
        if units.is_empty() {
            return 0;
        }
        debug!(units = units.len(), "harvested text units");
        self.queue.enqueue(
            units,
            &self.config.target_language,
            &self.config.model_id,
            self.config.chunk_size,
        )
    }

    /// Drains the queue head-first, one batch at a time. Stops at the first
    /// failure so the failed batch stays at the head for the retry.
    pub async fn pump(&mut self) -> PumpStatus {
        if self.queue.is_empty() {
            return PumpStatus::Idle;
        }
        let mut drained = 0;
        while let Some(batch) = self.queue.front().cloned() {
            self.queue.set_busy(true);
            let outcome = self.translate_batch(&batch).await;
            self.queue.set_busy(false);
            match outcome {
                Ok(()) => {
                    self.queue.pop_front();
                    drained += 1;
                }
                Err(PipelineError::Disabled) => {
                    debug!("translation disabled, parking the queue");
                    return PumpStatus::Disabled;
                }
                Err(err) => {
                    warn!(batch_size = batch.units.len(), "batch failed: {err}");
                    return PumpStatus::RetryAfter(constants::RETRY_DELAY);
                }
            }
        }
        PumpStatus::Drained(drained)
    }

    /// Submits one batch: consult the cache, send the uncached remainder,
    /// validate cardinality, persist new entries, rewrite the DOM.
    async fn translate_batch(&mut self, batch: &Batch) -> PipelineResult<()> {
        if !self.enabled {
            return Err(PipelineError::Disabled);
        }
        if batch.units.is_empty() {
            return Ok(());
        }

        for unit in &batch.units {
            self.translating.insert(unit.key());
        }

        // Deduplicated, order-preserving list of texts the cache cannot
        // answer. Repeated strings in one batch cost one remote slot.
        let mut uncached: Vec<String> = Vec::new();
        for unit in &batch.units {
            if !self.cache.contains(&batch.lang, &batch.model, &unit.text)
                && !uncached.contains(&unit.text)
            {
                uncached.push(unit.text.clone());
            }
        }

        if uncached.is_empty() {
            debug!(units = batch.units.len(), "batch fully served from cache");
            self.apply_cached(batch);
            return Ok(());
        }

        let input = serde_json::to_string(&uncached)
            .map_err(|err| PipelineError::Shape(err.to_string()))?;
        let request = BackendRequest {
            model: batch.model.clone(),
            instructions: build_instructions(&batch.lang),
            input,
        };

        let envelope = match self.backend.translate(request).await {
            Ok(envelope) => envelope,
            Err(err) => {
                self.unmark_in_flight(batch);
                return Err(err);
            }
        };

        let Some(payload) = envelope.payload_text() else {
            self.unmark_in_flight(batch);
            return Err(PipelineError::Shape("empty response envelope".to_string()));
        };
        let translations: Vec<String> = match serde_json::from_str(payload) {
            Ok(translations) => translations,
            Err(err) => {
                self.unmark_in_flight(batch);
                return Err(PipelineError::Shape(err.to_string()));
            }
        };

        // Positional alignment is the whole contract. On a length mismatch
        // the aligned prefix is still trustworthy, so cache it before
        // failing; the retry then only resends what is still missing.
        let aligned = uncached.len().min(translations.len());
        for (source, translated) in uncached.iter().zip(&translations).take(aligned) {
            if let Err(err) = self
                .cache
                .put(&self.store, &batch.lang, &batch.model, source, translated)
                .await
            {
                warn!("cache write failed: {err}");
            }
        }

        if translations.len() != uncached.len() {
            self.unmark_in_flight(batch);
            return Err(PipelineError::CountMismatch {
                expected: uncached.len(),
                actual: translations.len(),
            });
        }

        self.apply_cached(batch);
        Ok(())
    }

    /// Rewrites every unit the cache can now answer and moves it from
    /// in-flight to done. Units without a cache entry fall back to pending.
    fn apply_cached(&mut self, batch: &Batch) {
        let mut applied = 0;
        for unit in &batch.units {
            let key = unit.key();
            match self
                .cache
                .get(&batch.lang, &batch.model, &unit.text)
                .map(str::to_owned)
            {
                Some(translated) => {
                    dom::set_text(&unit.node, &translated);
                    if let Some(parent) = dom::parent_element(&unit.node) {
                        dom::set_attr(&parent, constants::TRANSLATED_ATTR, "true");
                    }
                    self.translating.remove(&key);
                    self.translated.insert(key);
                    applied += 1;
                }
                None => {
                    self.translating.remove(&key);
                }
            }
        }
        debug!(applied, total = batch.units.len(), "applied translations");
    }

    fn unmark_in_flight(&mut self, batch: &Batch) {
        for unit in &batch.units {
            self.translating.remove(&unit.key());
        }
    }

    /// The user toggled translation for this page's origin. Persisted via
    /// the configuration save so other pages on the origin agree.
    pub async fn on_origin_toggle(&mut self, enabled: bool) -> Reaction {
        self.config.set_origin_enabled(&self.origin, enabled);
        if let Err(err) = self.config.save(&self.store).await {
            warn!("persisting origin toggle failed: {err}");
        }
        self.enabled = self.config.enabled_for(&self.origin);
        info!(origin = %self.origin, enabled = self.enabled, "origin toggle");
        if self.enabled {
            Reaction::HarvestAfter(constants::TOGGLE_SETTLE)
        } else {
            Reaction::None
        }
    }

    /// The global switch (or another setting) changed somewhere else.
    /// Reload and re-derive; the periodic tick picks up any new work.
    pub async fn on_global_toggle(&mut self) -> Reaction {
        self.config = PipelineConfig::load(&self.store).await;
        self.enabled = self.config.enabled_for(&self.origin);
        info!(enabled = self.enabled, "settings reloaded");
        Reaction::None
    }

    /// The page navigated in place. Queued work and the membership sets
    /// belong to the old document; the cache survives navigations.
    pub async fn on_navigation(&mut self, document: Handle) -> Reaction {
        self.body = dom::find_body(&document);
        self.document = document;
        self.queue.clear();
        self.translated.clear();
        self.translating.clear();
        self.config = PipelineConfig::load(&self.store).await;
        self.enabled = self.config.enabled_for(&self.origin);
        info!(origin = %self.origin, enabled = self.enabled, "navigation reset");
        if self.enabled {
            Reaction::HarvestNow
        } else {
            Reaction::None
        }
    }

    /// Routes one page event to its handler and reports the follow-up the
    /// driver should schedule.
    pub async fn handle_event(&mut self, event: PageEvent) -> Reaction {
        match event {
            PageEvent::OriginToggle { enabled } => self.on_origin_toggle(enabled).await,
            PageEvent::GlobalToggle => self.on_global_toggle().await,
            PageEvent::Navigated { document } => self.on_navigation(document).await,
            PageEvent::Mutations(mutations) => {
                if self.enabled && crate::watcher::has_added_text(&mutations) {
                    Reaction::HarvestAfter(constants::MUTATION_SETTLE)
                } else {
                    Reaction::None
                }
            }
            PageEvent::Tick => {
                if self.enabled && self.queue.is_empty() && !self.queue.is_busy() {
                    Reaction::HarvestNow
                } else {
                    Reaction::None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResponseEnvelope;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Backend that translates by prefixing, recording every request's
    /// decoded input array.
    #[derive(Clone, Default)]
    struct EchoBackend {
        calls: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl TranslationBackend for EchoBackend {
        async fn translate(&self, request: BackendRequest) -> PipelineResult<ResponseEnvelope> {
            let sources: Vec<String> = serde_json::from_str(&request.input)
                .map_err(|err| PipelineError::Shape(err.to_string()))?;
            self.calls.borrow_mut().push(sources.clone());
            let translated: Vec<String> =
                sources.iter().map(|text| format!("[ko] {text}")).collect();
            let refs: Vec<&str> = translated.iter().map(String::as_str).collect();
            Ok(ResponseEnvelope::from_translations(&refs))
        }
    }

    fn enabled_store(origin: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(constants::keys::GLOBAL_ENABLED, json!(true));
        store.seed(constants::keys::ENABLED_ORIGINS, json!({ origin: true }));
        store
    }

    async fn pipeline_for(html: &str) -> (Pipeline<MemoryStore, EchoBackend>, markup5ever_rcdom::RcDom) {
        let dom = dom::parse_html(html);
        let mut pipeline = Pipeline::new(
            dom.document.clone(),
            "example.com",
            enabled_store("example.com"),
            EchoBackend::default(),
        );
        pipeline.init().await;
        (pipeline, dom)
    }

    #[tokio::test]
    async fn harvest_then_pump_rewrites_the_page() {
        let (mut pipeline, dom) = pipeline_for(
            "<html><body><main><p>hello page body</p><p>another long sentence</p></main></body></html>",
        )
        .await;
        assert!(pipeline.enabled());

        assert_eq!(pipeline.harvest(), 1);
        assert_eq!(pipeline.pump().await, PumpStatus::Drained(1));

        let html = dom::serialize_html(&dom).expect("serialize");
        assert!(html.contains("[ko] hello page body"));
        assert!(html.contains("[ko] another long sentence"));
        assert!(html.contains("data-translated=\"true\""));
    }

    #[tokio::test]
    async fn second_harvest_finds_nothing() {
        let (mut pipeline, _dom) =
            pipeline_for("<html><body><main><p>hello page body</p></main></body></html>").await;
        pipeline.harvest();
        pipeline.pump().await;
        assert_eq!(pipeline.harvest(), 0, "done units are not re-harvested");
    }

    #[tokio::test]
    async fn disabled_pipeline_parks_the_queue() {
        let dom = dom::parse_html(
            "<html><body><main><p>hello page body</p></main></body></html>",
        );
        let store = MemoryStore::new();
        store.seed(constants::keys::GLOBAL_ENABLED, json!(false));
        let backend = EchoBackend::default();
        let mut pipeline = Pipeline::new(dom.document, "example.com", store, backend.clone());
        pipeline.init().await;

        assert!(!pipeline.enabled());
        assert_eq!(pipeline.harvest(), 0, "disabled pages never harvest");
        assert!(backend.calls.borrow().is_empty());
    }
}
