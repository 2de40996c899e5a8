//! Event sources and the cooperative event driver.
//!
//! The pipeline itself never sleeps or polls; this module owns time. Events
//! arrive on a channel (toggles, navigations, DOM mutation summaries) and a
//! periodic tick sweeps up anything the mutation reports missed.

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::debug;

use markup5ever_rcdom::Handle;

use crate::backend::TranslationBackend;
use crate::config::constants;
use crate::pipeline::{Pipeline, PumpStatus, Reaction};
use crate::store::ConfigStore;

/// Summary of one observed DOM mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Child nodes were added or removed. `added_text` reports whether any
    /// added subtree contains a non-empty text node.
    ChildList { added_text: bool },
    /// An existing text node's content changed.
    CharacterData,
}

/// One notification delivered to the pipeline.
pub enum PageEvent {
    /// The user toggled translation for this page's origin.
    OriginToggle { enabled: bool },
    /// The global switch or another setting changed elsewhere.
    GlobalToggle,
    /// In-place navigation replaced the document.
    Navigated { document: Handle },
    /// A burst of DOM mutations was observed.
    Mutations(Vec<Mutation>),
    /// Periodic sweep.
    Tick,
}

/// Whether any mutation in the burst introduced new text. Attribute-only
/// and removal-only churn never triggers a harvest.
pub fn has_added_text(mutations: &[Mutation]) -> bool {
    mutations.iter().any(|mutation| {
        matches!(
            mutation,
            Mutation::ChildList { added_text: true } | Mutation::CharacterData
        )
    })
}

/// Deferred work armed by a reaction or by a failed submission.
#[derive(Debug, Clone, Copy)]
enum Job {
    /// Settled harvest, then pump.
    Harvest,
    /// Pump only: resubmit the batch parked at the queue head.
    Resubmit,
}

/// Drives one pipeline until the event channel closes.
///
/// At most one deferred job (a settled harvest or a retry) is armed at a
/// time, held as a deadline raced against the channel and the periodic tick.
/// The driver therefore always returns to the select between submissions: a
/// toggle or navigation arriving during a retry backoff is handled before
/// the resubmission, and a disable parks the queue without another backend
/// call.
pub async fn run<S: ConfigStore, B: TranslationBackend>(
    pipeline: &mut Pipeline<S, B>,
    mut events: mpsc::Receiver<PageEvent>,
) {
    // First sweep one full period in, like a plain periodic timer.
    let mut tick = interval_at(
        Instant::now() + constants::PERIODIC_INTERVAL,
        constants::PERIODIC_INTERVAL,
    );
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pending: Option<(Instant, Job)> = None;

    loop {
        let wake = pending.map(|(at, _)| at);
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => Some(event),
                None => break,
            },
            _ = tick.tick() => Some(PageEvent::Tick),
            _ = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => None,
        };

        match event {
            Some(event) => match pipeline.handle_event(event).await {
                Reaction::None => {}
                Reaction::HarvestNow => {
                    pipeline.harvest();
                    pending = pump_once(pipeline).await;
                }
                Reaction::HarvestAfter(delay) => {
                    pending = Some((Instant::now() + delay, Job::Harvest));
                }
            },
            // The armed deadline fired.
            None => {
                if let Some((_, job)) = pending.take() {
                    if matches!(job, Job::Harvest) {
                        pipeline.harvest();
                    }
                    pending = pump_once(pipeline).await;
                }
            }
        }
    }
}

/// One pump pass over the queue. A retryable failure arms the resubmission
/// deadline; `Disabled` parks the queue until a toggle produces new work.
async fn pump_once<S: ConfigStore, B: TranslationBackend>(
    pipeline: &mut Pipeline<S, B>,
) -> Option<(Instant, Job)> {
    match pipeline.pump().await {
        PumpStatus::RetryAfter(delay) => {
            debug!(?delay, "backing off before resubmitting");
            Some((Instant::now() + delay, Job::Resubmit))
        }
        PumpStatus::Idle | PumpStatus::Drained(_) | PumpStatus::Disabled => None,
    }
}
