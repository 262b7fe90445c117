//! Batch pagination controller
//!
//! Tracks how many of the tallest trees are visible and moves that count
//! in whole steps. Requests that would leave `[0, total]` are dropped
//! rather than clamped, so the count always stays on a step boundary.

use std::sync::Arc;
use tracing::debug;

use super::data::{StepSize, TreeRecord};
use super::store::GeoRecordStore;
use crate::error::PaginationError;

/// Per-session pagination state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// Always within `0..=total_record_count`
    pub visible_count: usize,
    pub step_size: StepSize,
}

impl PaginationState {
    /// Initial state for a store of `total` records
    pub fn initial(total: usize) -> Self {
        let step_size = StepSize::default();
        Self {
            visible_count: step_size.get().min(total),
            step_size,
        }
    }
}

/// The single source of truth for which trees are on the map
#[derive(Debug, Clone)]
pub struct BatchPaginator {
    store: Arc<GeoRecordStore>,
    state: PaginationState,
}

impl BatchPaginator {
    pub fn new(store: Arc<GeoRecordStore>) -> Self {
        let state = PaginationState::initial(store.len());
        Self { store, state }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn visible_count(&self) -> usize {
        self.state.visible_count
    }

    pub fn step_size(&self) -> StepSize {
        self.state.step_size
    }

    pub fn total_record_count(&self) -> usize {
        self.store.len()
    }

    /// Change the step size from a raw number.
    ///
    /// Anything other than 50, 100, 500 or 1000 is rejected and the state
    /// is left untouched.
    pub fn set_step_size(&mut self, n: usize) -> Result<(), PaginationError> {
        let step = StepSize::try_from(n)?;
        self.set_step(step);
        Ok(())
    }

    pub fn set_step(&mut self, step: StepSize) {
        self.state.step_size = step;
    }

    /// Reveal one more step of trees. Returns `false` when the next step
    /// would run past the end of the data.
    pub fn show_more(&mut self) -> bool {
        let candidate = self.state.visible_count + self.state.step_size.get();
        if candidate > self.total_record_count() {
            debug!(
                "show_more ignored: {candidate} > {}",
                self.total_record_count()
            );
            return false;
        }
        self.state.visible_count = candidate;
        true
    }

    /// Hide one step of trees. Returns `false` when that would go below zero.
    pub fn show_less(&mut self) -> bool {
        match self.state.visible_count.checked_sub(self.state.step_size.get()) {
            Some(candidate) => {
                self.state.visible_count = candidate;
                true
            }
            None => {
                debug!(
                    "show_less ignored: {} < {}",
                    self.state.visible_count,
                    self.state.step_size
                );
                false
            }
        }
    }

    /// Back to a step of 50 with the first 50 trees shown
    /// (or every tree, when there are fewer than 50).
    pub fn reset(&mut self) {
        self.state = PaginationState::initial(self.total_record_count());
    }

    /// The `visible_count` tallest trees, tallest first
    pub fn visible_records(&self) -> &[TreeRecord] {
        &self.store.records()[..self.state.visible_count]
    }

    pub fn caption_text(&self) -> String {
        format!(
            "Showing 1 - {} of {} locations, tallest to shortest",
            self.visible_count(),
            self.total_record_count()
        )
    }
}
