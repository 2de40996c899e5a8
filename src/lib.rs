//! # Pagelingo
//!
//! In-page translation pipeline: parses an HTML document, harvests the text
//! worth translating, batches it through a remote translation backend and
//! rewrites the page in place, with a persistent cross-session cache.
//!
//! ## Module organization
//!
//! - `dom` - parsing, serialization and text-node access
//! - `filter` - eligibility heuristics separating content from chrome
//! - `harvest` - document-order collection of translatable units
//! - `queue` - FIFO batch queue with a single in-flight slot
//! - `cache` - bounded persistent translation cache
//! - `backend` - remote translation port and its HTTP implementation
//! - `store` - key-value configuration store port
//! - `pipeline` - per-page state and the harvest/submit/apply cycle
//! - `watcher` - event sources and the cooperative driver

pub mod backend;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod filter;
pub mod harvest;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod watcher;

// Re-export the types most callers need
pub use backend::{BackendRequest, HttpBackend, ResponseEnvelope, TranslationBackend};
pub use cache::TranslationCache;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, StoreError};
pub use harvest::TextUnit;
pub use pipeline::{Pipeline, PumpStatus, Reaction};
pub use queue::{Batch, BatchQueue};
pub use store::{ConfigStore, FileStore, MemoryStore};
pub use watcher::{Mutation, PageEvent};
