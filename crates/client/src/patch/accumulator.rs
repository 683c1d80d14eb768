//! Per-resource edit session: the operation queue and its state machine.

use quince_core::PatchOperation;
use tracing::debug;

/// Lifecycle of one resource-edit session.
///
/// `Idle -> Accumulating` on the first queued edit;
/// `Accumulating -> Flushing` when the queue is drained into a batch;
/// `Flushing -> Idle` once the response arrives, success or failure.
/// Edits queued while a batch is in flight start a fresh Accumulating
/// phase instead of being merged into the in-flight batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Nothing queued, nothing in flight.
    Idle,
    /// Edits queued, not yet flushed.
    Accumulating,
    /// A batch is in flight; the queue is empty.
    Flushing,
}

/// Coalescing queue of patch operations for one resource.
///
/// Later operations on the same normalized path overwrite earlier ones,
/// so a flush sends only the latest value per field, never a stale
/// intermediate. Distinct paths keep their first-insertion order.
#[derive(Debug)]
pub struct PatchAccumulator {
    phase: AccumulatorState,
    queue: Vec<PatchOperation>,
}

impl Default for PatchAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchAccumulator {
    /// An idle accumulator with an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: AccumulatorState::Idle,
            queue: Vec::new(),
        }
    }

    /// Current phase of the session.
    #[must_use]
    pub const fn state(&self) -> AccumulatorState {
        self.phase
    }

    /// Number of distinct queued paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue one edit, coalescing by path.
    ///
    /// A subsequent edit to an already-queued path replaces the queued
    /// operation in place, keeping that path's original queue position.
    pub fn add(&mut self, operation: PatchOperation) {
        self.phase = AccumulatorState::Accumulating;

        if let Some(existing) = self
            .queue
            .iter_mut()
            .find(|queued| queued.path == operation.path)
        {
            debug!(path = %operation.path, "Coalescing queued operation");
            *existing = operation;
        } else {
            self.queue.push(operation);
        }
    }

    /// Drain the queue into one ordered batch and enter Flushing.
    ///
    /// The queue is cleared synchronously, so edits arriving while the
    /// batch is on the wire accumulate separately. An empty queue
    /// flushes to an empty batch and goes straight back to Idle.
    pub fn flush(&mut self) -> Vec<PatchOperation> {
        let batch = std::mem::take(&mut self.queue);
        self.phase = if batch.is_empty() {
            AccumulatorState::Idle
        } else {
            AccumulatorState::Flushing
        };
        debug!(operations = batch.len(), "Flushing patch batch");
        batch
    }

    /// Record the response to a flushed batch, success or failure.
    ///
    /// The flushed batch is never retried from here: on failure the
    /// server's state is unknown and the caller must re-diff against
    /// fresh data. Edits queued during the flight keep the session
    /// Accumulating.
    pub fn complete(&mut self) {
        if self.phase == AccumulatorState::Flushing {
            self.phase = if self.queue.is_empty() {
                AccumulatorState::Idle
            } else {
                AccumulatorState::Accumulating
            };
        }
    }

    /// Throw away all queued edits and return to Idle.
    pub fn discard(&mut self) {
        self.queue.clear();
        if self.phase != AccumulatorState::Flushing {
            self.phase = AccumulatorState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_starts_idle() {
        let accumulator = PatchAccumulator::new();
        assert_eq!(accumulator.state(), AccumulatorState::Idle);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_first_add_enters_accumulating() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/name", json!("a")));
        assert_eq!(accumulator.state(), AccumulatorState::Accumulating);
        assert_eq!(accumulator.len(), 1);
    }

    #[test]
    fn test_same_path_coalesces_to_latest() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/name", json!("first")));
        accumulator.add(PatchOperation::replace("/title", json!("t")));
        accumulator.add(PatchOperation::replace("/name", json!("second")));

        let batch = accumulator.flush();
        assert_eq!(
            batch,
            vec![
                PatchOperation::replace("/name", json!("second")),
                PatchOperation::replace("/title", json!("t")),
            ]
        );
    }

    #[test]
    fn test_flush_preserves_first_insertion_order() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/b", json!(1)));
        accumulator.add(PatchOperation::replace("/a", json!(2)));
        accumulator.add(PatchOperation::remove("/c"));

        let paths: Vec<String> = accumulator
            .flush()
            .into_iter()
            .map(|operation| operation.path)
            .collect();
        assert_eq!(paths, vec!["/b", "/a", "/c"]);
    }

    #[test]
    fn test_flush_clears_queue_and_enters_flushing() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/a", json!(1)));

        let batch = accumulator.flush();
        assert_eq!(batch.len(), 1);
        assert!(accumulator.is_empty());
        assert_eq!(accumulator.state(), AccumulatorState::Flushing);

        accumulator.complete();
        assert_eq!(accumulator.state(), AccumulatorState::Idle);
    }

    #[test]
    fn test_edits_during_flight_start_fresh_phase() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/a", json!(1)));
        let first = accumulator.flush();

        // Arrives while the batch is on the wire
        accumulator.add(PatchOperation::replace("/a", json!(2)));
        assert_eq!(accumulator.state(), AccumulatorState::Accumulating);

        accumulator.complete();
        // The in-flight response does not absorb or drop the new edit
        assert_eq!(accumulator.state(), AccumulatorState::Accumulating);
        let second = accumulator.flush();
        assert_ne!(first, second);
        assert_eq!(second, vec![PatchOperation::replace("/a", json!(2))]);
    }

    #[test]
    fn test_empty_flush_is_idle() {
        let mut accumulator = PatchAccumulator::new();
        assert!(accumulator.flush().is_empty());
        assert_eq!(accumulator.state(), AccumulatorState::Idle);
    }

    #[test]
    fn test_discard_drops_edits() {
        let mut accumulator = PatchAccumulator::new();
        accumulator.add(PatchOperation::replace("/a", json!(1)));
        accumulator.discard();
        assert!(accumulator.is_empty());
        assert_eq!(accumulator.state(), AccumulatorState::Idle);
    }
}
