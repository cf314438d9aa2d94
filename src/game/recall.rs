//! Word of Recall countdown.

use serde::{Deserialize, Serialize};

/// A pending recall, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallState {
    /// Turns left before the teleport
    pub remaining: Option<u32>,
    /// Set on the activation turn, which does not count down
    pub fresh: bool,
}

/// Outcome of advancing the countdown by one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallTick {
    /// No recall pending, or it was activated this turn
    Idle,
    /// Still counting; holds the turns left
    Countdown(u32),
    /// Time is up: teleport now
    Fire,
}

impl RecallState {
    /// Starts the countdown.
    pub fn activate(&mut self, turns: u32) {
        self.remaining = Some(turns.max(1));
        self.fresh = true;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advances the countdown. Clears the state when it fires.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{RecallState, RecallTick};
    ///
    /// let mut recall = RecallState::default();
    /// recall.activate(2);
    /// assert_eq!(recall.tick(), RecallTick::Idle);
    /// assert_eq!(recall.tick(), RecallTick::Countdown(1));
    /// assert_eq!(recall.tick(), RecallTick::Fire);
    /// assert!(!recall.is_active());
    /// ```
    pub fn tick(&mut self) -> RecallTick {
        let Some(remaining) = self.remaining else {
            return RecallTick::Idle;
        };
        if self.fresh {
            self.fresh = false;
            return RecallTick::Idle;
        }
        let left = remaining.saturating_sub(1);
        if left == 0 {
            self.cancel();
            RecallTick::Fire
        } else {
            self.remaining = Some(left);
            RecallTick::Countdown(left)
        }
    }
}
