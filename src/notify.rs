//! Lifecycle notifications for long-running commands.
//!
//! A notifier only observes: its failures are logged and never change what
//! the sweep or the retriever persist.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn started(&self, title: &str, total: usize) -> Result<()>;

    async fn progress(&self, index: usize, total: usize, percentage: u8, elapsed: Duration) -> Result<()>;

    async fn finished(&self, elapsed: Duration) -> Result<()>;

    async fn error(&self, message: &str) -> Result<()>;
}

/// Percentage to report for the 1-based `index` of `total`, if it is a checkpoint.
/// Checkpoints are the first item (0%) and the items at 25%, 50% and 75%.
pub fn checkpoint_percentage(index: usize, total: usize) -> Option<u8> {
    if total == 0 || index == 0 {
        return None;
    }
    if index == 1 {
        return Some(0);
    }
    for pct in [25u8, 50, 75] {
        if index == total * pct as usize / 100 {
            return Some(((index * 100) / total) as u8);
        }
    }
    None
}

/// Reports through `tracing`.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn started(&self, title: &str, total: usize) -> Result<()> {
        info!("🚀 {} started ({} items)", title, total);
        Ok(())
    }

    async fn progress(&self, index: usize, total: usize, percentage: u8, elapsed: Duration) -> Result<()> {
        info!("⏳ {}/{} ({}%) after {:.0}s", index, total, percentage, elapsed.as_secs_f64());
        Ok(())
    }

    async fn finished(&self, elapsed: Duration) -> Result<()> {
        info!("✅ Finished in {:.0}s", elapsed.as_secs_f64());
        Ok(())
    }

    async fn error(&self, message: &str) -> Result<()> {
        error!("❌ {}", message);
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn started(&self, _title: &str, _total: usize) -> Result<()> {
        Ok(())
    }

    async fn progress(&self, _index: usize, _total: usize, _percentage: u8, _elapsed: Duration) -> Result<()> {
        Ok(())
    }

    async fn finished(&self, _elapsed: Duration) -> Result<()> {
        Ok(())
    }

    async fn error(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Swallow notifier failures after logging them.
pub(crate) fn log_failure(result: Result<()>) {
    if let Err(e) = result {
        warn!("Notifier failed: {}", e);
    }
}
