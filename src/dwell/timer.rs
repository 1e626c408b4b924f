//! Retriggerable repeating timer for the dwell session
//!
//! The timer owns no task of its own. It only tracks the next deadline;
//! the recognizer's event loop sleeps until that deadline and calls back
//! into the session when it passes.

use std::time::Duration;

use tokio::time::Instant;

/// A single repeating timer whose interval can be swapped while armed
#[derive(Debug, Clone)]
pub struct DwellTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl DwellTimer {
    /// Create a stopped timer with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Arm the timer one interval from now
    pub fn start(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    /// Disarm the timer
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Replace the interval; a running timer restarts its countdown
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        if self.deadline.is_some() {
            self.start();
        }
    }

    /// Record that the deadline passed. A running timer re-arms itself.
    pub fn fired(&mut self) {
        if self.deadline.is_some() {
            self.start();
        }
    }

    /// Whether the timer is armed
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Current interval
    #[cfg(test)]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Next deadline, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let mut timer = DwellTimer::new(Duration::from_millis(600));
        assert!(!timer.is_running());

        timer.start();
        assert!(timer.is_running());
        assert_eq!(
            timer.deadline(),
            Some(Instant::now() + Duration::from_millis(600))
        );

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_rearms_running_timer() {
        let mut timer = DwellTimer::new(Duration::from_millis(600));
        timer.start();

        tokio::time::advance(Duration::from_millis(100)).await;
        timer.set_interval(Duration::from_millis(300));

        assert_eq!(timer.interval(), Duration::from_millis(300));
        assert_eq!(
            timer.deadline(),
            Some(Instant::now() + Duration::from_millis(300))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_leaves_stopped_timer_stopped() {
        let mut timer = DwellTimer::new(Duration::from_millis(600));
        timer.set_interval(Duration::from_millis(200));
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_repeats_only_when_running() {
        let mut timer = DwellTimer::new(Duration::from_millis(50));
        timer.fired();
        assert!(!timer.is_running());

        timer.start();
        tokio::time::advance(Duration::from_millis(50)).await;
        timer.fired();
        assert_eq!(
            timer.deadline(),
            Some(Instant::now() + Duration::from_millis(50))
        );
    }
}
