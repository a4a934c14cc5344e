use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one alignment attempt.
///
/// `NotStarted → DetectingLandmarks → ComputingTransform → Warping → Succeeded`,
/// with `FailedGraceful` or `FailedHard` reachable from any working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentState {
    NotStarted,
    DetectingLandmarks,
    ComputingTransform,
    Warping,
    Succeeded,
    FailedGraceful,
    FailedHard,
}

impl AlignmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AlignmentState::Succeeded | AlignmentState::FailedGraceful | AlignmentState::FailedHard
        )
    }

    pub fn can_transition_to(&self, next: AlignmentState) -> bool {
        use AlignmentState::*;
        match (self, next) {
            (NotStarted, DetectingLandmarks)
            | (DetectingLandmarks, ComputingTransform)
            | (ComputingTransform, Warping)
            | (Warping, Succeeded) => true,
            (NotStarted, FailedHard) => true,
            (DetectingLandmarks | ComputingTransform | Warping, FailedGraceful | FailedHard) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlignmentState::NotStarted => "not_started",
            AlignmentState::DetectingLandmarks => "detecting_landmarks",
            AlignmentState::ComputingTransform => "computing_transform",
            AlignmentState::Warping => "warping",
            AlignmentState::Succeeded => "succeeded",
            AlignmentState::FailedGraceful => "failed_graceful",
            AlignmentState::FailedHard => "failed_hard",
        }
    }
}

impl fmt::Display for AlignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current state plus the history of an attempt. Rejects out-of-order moves.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: AlignmentState,
    history: Vec<AlignmentState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: AlignmentState::NotStarted,
            history: vec![AlignmentState::NotStarted],
        }
    }

    pub fn current(&self) -> AlignmentState {
        self.current
    }

    pub fn history(&self) -> &[AlignmentState] {
        &self.history
    }

    /// Move to `next`, returning the state that was left.
    pub fn advance(&mut self, next: AlignmentState) -> Result<AlignmentState> {
        if !self.current.can_transition_to(next) {
            return Err(AlignError::State(format!(
                "illegal transition {} -> {}",
                self.current, next
            )));
        }
        let previous = self.current;
        self.current = next;
        self.history.push(next);
        Ok(previous)
    }
}
