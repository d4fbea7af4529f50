use std::time::{Duration, Instant};

/// Tracks user inactivity against the configured idle timeout.
#[derive(Debug, Clone)]
pub struct IdleGuard {
    timeout: Option<Duration>,
    last_activity: Instant,
}

impl IdleGuard {
    /// `minutes == 0` disables the guard.
    pub fn new(minutes: u32, now: Instant) -> Self {
        Self {
            timeout: timeout_from_minutes(minutes),
            last_activity: now,
        }
    }

    pub fn set_timeout(&mut self, minutes: u32, now: Instant) {
        self.timeout = timeout_from_minutes(minutes);
        self.last_activity = now;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// True once per idle period: firing resets the clock.
    pub fn check(&mut self, now: Instant) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        if now.saturating_duration_since(self.last_activity) >= timeout {
            self.last_activity = now;
            return true;
        }
        false
    }

    /// Time left before the guard fires, for scheduling a repaint.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.timeout
            .map(|t| t.saturating_sub(now.saturating_duration_since(self.last_activity)))
    }
}

fn timeout_from_minutes(minutes: u32) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(u64::from(minutes) * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_timeout_without_activity() {
        let start = Instant::now();
        let mut guard = IdleGuard::new(15, start);
        assert!(!guard.check(start + Duration::from_secs(14 * 60)));
        assert!(guard.check(start + Duration::from_secs(15 * 60)));
        // Reset after firing.
        assert!(!guard.check(start + Duration::from_secs(16 * 60)));
    }

    #[test]
    fn activity_postpones_timeout() {
        let start = Instant::now();
        let mut guard = IdleGuard::new(1, start);
        guard.touch(start + Duration::from_secs(50));
        assert!(!guard.check(start + Duration::from_secs(100)));
        assert_eq!(
            guard.remaining(start + Duration::from_secs(100)),
            Some(Duration::from_secs(10))
        );
        assert!(guard.check(start + Duration::from_secs(110)));
    }

    #[test]
    fn zero_minutes_disables() {
        let start = Instant::now();
        let mut guard = IdleGuard::new(0, start);
        assert!(!guard.check(start + Duration::from_secs(86_400)));
        assert_eq!(guard.remaining(start), None);
    }
}
