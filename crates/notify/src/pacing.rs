//! Inter-send pacing: a fixed delay applied through a swappable clock so
//! tests and dry runs never wait on the wall clock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of delays.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait::async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Delay inserted after every send attempt to respect provider rate limits.
#[derive(Clone)]
pub struct Pacing {
    delay: Duration,
    clock: Arc<dyn Clock>,
}

impl Pacing {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { delay, clock }
    }

    /// Pacing on the real clock.
    pub fn tokio(delay: Duration) -> Self {
        Self::new(delay, Arc::new(TokioClock))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Wait out the configured delay.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            self.clock.sleep(self.delay).await;
        }
    }
}

impl std::fmt::Debug for Pacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacing").field("delay", &self.delay).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_clock_does_not_wait() {
        let clock = Arc::new(RecordingClock::new());
        let pacing = Pacing::new(Duration::from_secs(3600), clock.clone());

        let start = std::time::Instant::now();
        pacing.pause().await;
        pacing.pause().await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3600); 2]);
        assert_eq!(clock.total(), Duration::from_secs(7200));
    }

    #[tokio::test]
    async fn zero_delay_skips_the_clock() {
        let clock = Arc::new(RecordingClock::new());
        Pacing::new(Duration::ZERO, clock.clone()).pause().await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn tokio_clock_sleeps() {
        let start = std::time::Instant::now();
        Pacing::tokio(Duration::from_millis(20)).pause().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
