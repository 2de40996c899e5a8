//! FIFO batch queue with a single in-flight slot.
//!
//! Harvested units are partitioned into fixed-size chunks, one batch per
//! chunk, tagged with the (language, model) pair active at enqueue time. The
//! `busy` flag serializes submissions: a batch is only removed once its
//! submission succeeds, so a failed batch stays at the head for retry.

use std::collections::VecDeque;

use crate::harvest::TextUnit;

/// An ordered group of units submitted together.
#[derive(Clone)]
pub struct Batch {
    pub units: Vec<TextUnit>,
    pub lang: String,
    pub model: String,
}

#[derive(Default)]
pub struct BatchQueue {
    batches: VecDeque<Batch>,
    busy: bool,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions `units` into chunks of at most `chunk_size` and appends
    /// one batch per chunk. Returns the number of batches appended.
    pub fn enqueue(
        &mut self,
        mut units: Vec<TextUnit>,
        lang: &str,
        model: &str,
        chunk_size: usize,
    ) -> usize {
        let chunk_size = chunk_size.max(1);
        let mut appended = 0;
        while !units.is_empty() {
            let tail = if units.len() > chunk_size {
                units.split_off(chunk_size)
            } else {
                Vec::new()
            };
            self.batches.push_back(Batch {
                units,
                lang: lang.to_string(),
                model: model.to_string(),
            });
            units = tail;
            appended += 1;
        }
        appended
    }

    pub fn front(&self) -> Option<&Batch> {
        self.batches.front()
    }

    /// Removes the head batch. Called only after its submission succeeded.
    pub fn pop_front(&mut self) -> Option<Batch> {
        self.batches.pop_front()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drops all queued work and clears the in-flight slot. Used on
    /// navigation.
    pub fn clear(&mut self) {
        self.batches.clear();
        self.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    fn units(count: usize) -> Vec<TextUnit> {
        // One DOM per call; each paragraph contributes one distinct node.
        let paragraphs: String = (0..count)
            .map(|i| format!("<p>unit number {i}</p>"))
            .collect();
        let dom = dom::parse_html(&format!("<html><body>{paragraphs}</body></html>"));
        let body = dom::find_body(&dom.document).expect("body");
        let mut units = Vec::new();
        dom::walk_text_nodes(&body, &mut |node| {
            units.push(TextUnit {
                node: node.clone(),
                text: dom::text_content(node).unwrap().trim().to_string(),
            });
        });
        units
    }

    #[test]
    fn thirty_units_with_chunk_25_make_two_batches() {
        let mut queue = BatchQueue::new();
        let appended = queue.enqueue(units(30), "Korean", "gpt-4.1", 25);
        assert_eq!(appended, 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front().unwrap().units.len(), 25);

        queue.pop_front();
        assert_eq!(queue.front().unwrap().units.len(), 5);
    }

    #[test]
    fn exact_multiple_fills_batches_completely() {
        let mut queue = BatchQueue::new();
        assert_eq!(queue.enqueue(units(50), "Korean", "gpt-4.1", 25), 2);
        assert_eq!(queue.pop_front().unwrap().units.len(), 25);
        assert_eq!(queue.pop_front().unwrap().units.len(), 25);
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_preserves_unit_order_across_chunks() {
        let mut queue = BatchQueue::new();
        queue.enqueue(units(7), "Korean", "gpt-4.1", 3);
        let mut texts = Vec::new();
        while let Some(batch) = queue.pop_front() {
            texts.extend(batch.units.into_iter().map(|unit| unit.text));
        }
        let expected: Vec<String> = (0..7).map(|i| format!("unit number {i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn clear_resets_the_busy_flag() {
        let mut queue = BatchQueue::new();
        queue.enqueue(units(1), "Korean", "gpt-4.1", 25);
        queue.set_busy(true);
        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.is_busy());
    }

    #[test]
    fn empty_enqueue_appends_nothing() {
        let mut queue = BatchQueue::new();
        assert_eq!(queue.enqueue(Vec::new(), "Korean", "gpt-4.1", 25), 0);
        assert!(queue.is_empty());
    }
}
