use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// A trait for sources that can trigger a graceful shutdown of the agent.
#[async_trait]
pub trait Shutdown: Send + Sync {
    /// This future resolves when a shutdown signal is received.
    async fn wait_for_signal(&mut self);
}

pub struct CtrlCShutdown;

impl CtrlCShutdown {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CtrlCShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Shutdown for CtrlCShutdown {
    async fn wait_for_signal(&mut self) {
        // Only the fact that the signal fired matters, not a receive error.
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, initiating graceful shutdown");
    }
}

/// Shuts the agent down after a fixed duration. Useful for supervised runs
/// and tests.
pub struct TimeBasedShutdown {
    duration: Duration,
}

impl TimeBasedShutdown {
    /// Creates a new handler that will trigger a shutdown after the given duration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Shutdown for TimeBasedShutdown {
    async fn wait_for_signal(&mut self) {
        info!(
            duration_secs = self.duration.as_secs(),
            "Agent shutdown scheduled"
        );
        tokio::time::sleep(self.duration).await;
        info!("Time-based shutdown triggered");
    }
}
