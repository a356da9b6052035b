use std::time::{Duration, Instant};

/// Externally visible motion state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Inactive,
    Active,
}

/// What a single verdict did to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    /// Inactive -> Active
    Started,
    /// Positive verdict while already Active
    Sustained,
    /// Active -> Inactive once the grace period ran out
    Ended { duration: Duration },
    /// Nothing to act on: idle, or a gap still inside the grace period
    Unchanged,
}

impl MotionEvent {
    /// Events that should be handed to the effect dispatcher
    pub fn triggers_effects(&self) -> bool {
        matches!(self, MotionEvent::Started | MotionEvent::Sustained)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Inactive,
    Active { since: Instant, last_seen: Instant },
}

/// Debounced Inactive/Active tracker driven by one verdict per frame.
///
/// A negative verdict only ends an event once more than `grace` has passed
/// since the last positive one, so one-frame detection gaps do not split an
/// event in two.
#[derive(Debug, Clone)]
pub struct MotionStateMachine {
    phase: Phase,
    grace: Duration,
}

impl MotionStateMachine {
    pub fn new(grace: Duration) -> Self {
        Self {
            phase: Phase::Inactive,
            grace,
        }
    }

    pub fn state(&self) -> MotionState {
        match self.phase {
            Phase::Inactive => MotionState::Inactive,
            Phase::Active { .. } => MotionState::Active,
        }
    }

    #[cfg(test)]
    fn last_positive(&self) -> Option<Instant> {
        match self.phase {
            Phase::Inactive => None,
            Phase::Active { last_seen, .. } => Some(last_seen),
        }
    }

    pub fn update(&mut self, motion: bool, now: Instant) -> MotionEvent {
        match (self.phase, motion) {
            (Phase::Inactive, true) => {
                self.phase = Phase::Active {
                    since: now,
                    last_seen: now,
                };
                MotionEvent::Started
            }
            (Phase::Active { since, .. }, true) => {
                self.phase = Phase::Active {
                    since,
                    last_seen: now,
                };
                MotionEvent::Sustained
            }
            (Phase::Active { since, last_seen }, false) => {
                if now.saturating_duration_since(last_seen) > self.grace {
                    self.phase = Phase::Inactive;
                    MotionEvent::Ended {
                        duration: now.saturating_duration_since(since),
                    }
                } else {
                    MotionEvent::Unchanged
                }
            }
            (Phase::Inactive, false) => MotionEvent::Unchanged,
        }
    }
}
