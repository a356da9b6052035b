use std::time::{Duration, Instant};

/// Minimum spacing between two firings of the same thing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Cooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    #[cfg(test)]
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Never fired, or strictly more than `interval` since the last firing
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }

    /// Fire if ready, returning whether it fired
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_firing_is_immediate() {
        let mut cooldown = Cooldown::new(Duration::from_secs(5));
        assert!(cooldown.try_fire(Instant::now()));
    }

    #[test]
    fn interval_boundary_is_exclusive() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(3));
        assert!(cooldown.try_fire(start));
        assert!(!cooldown.try_fire(start + Duration::from_secs(3)));
        assert!(cooldown.try_fire(start + Duration::from_millis(3001)));
        assert_eq!(cooldown.last_fired(), Some(start + Duration::from_millis(3001)));
    }
}
