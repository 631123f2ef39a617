//! Randomized pacing between legs and cycles.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::types::FarmError;

/// Inclusive delay window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingWindow {
    min_ms: u64,
    max_ms: u64,
}

impl PacingWindow {
    pub fn from_secs(min: u64, max: u64) -> Result<Self, FarmError> {
        if min > max {
            return Err(FarmError::Config(format!(
                "pacing window [{min}, {max}] has min greater than max"
            )));
        }
        Ok(Self {
            min_ms: min.saturating_mul(1000),
            max_ms: max.saturating_mul(1000),
        })
    }

    pub const fn zero() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Uniform draw from the window.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Suspends the current task for a delay taken from a window.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait, returning the delay actually applied.
    async fn pause(&self, window: PacingWindow) -> Duration;
}

/// Sleeps for a uniformly random delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPacer;

#[async_trait]
impl Pacer for RandomPacer {
    async fn pause(&self, window: PacingWindow) -> Duration {
        // thread_rng is !Send; draw before the await point.
        let delay = window.draw(&mut rand::thread_rng());
        debug!(
            delay_ms = delay.as_millis() as u64,
            window_min_ms = window.min().as_millis() as u64,
            window_max_ms = window.max().as_millis() as u64,
            "Pacing"
        );
        tokio::time::sleep(delay).await;
        delay
    }
}
