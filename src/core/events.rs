// ─── Download Events ───
// Notification stream consumed by whatever renders progress.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Why a task reported a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailKind {
    /// The task will be attempted again.
    Retry,
    /// Retries are exhausted; the task is given up on.
    Fail,
    /// The worker itself failed outside the normal fetch path.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Work is being divided across `cores` worker slots.
    Setup { cores: usize },
    Start,
    /// The watchdog fired; the remainder restarts as `attempt`.
    Restart { attempt: u32 },
    Progress {
        key: String,
        done: usize,
        total: usize,
        left: usize,
    },
    Done,
    Fail {
        key: String,
        kind: FailKind,
        error: String,
    },
}

/// Broadcast bus for [`DownloadEvent`]s.
///
/// Publishing never blocks and never fails; with no subscribers events are
/// only logged. Dropping a receiver unsubscribes it.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<DownloadEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DownloadEvent) {
        log_event(&event);
        let _ = self.tx.send(event);
    }
}

fn log_event(event: &DownloadEvent) {
    match event {
        DownloadEvent::Setup { cores } => info!("Dividing work across {} workers", cores),
        DownloadEvent::Start => info!("Starting download"),
        DownloadEvent::Restart { attempt } => {
            error!("No progress reported in time, assuming a worker crashed (attempt {})", attempt)
        }
        DownloadEvent::Progress {
            key,
            done,
            total,
            left,
        } => debug!("Done with {} of {} ({} left): {}", done, total, left, key),
        DownloadEvent::Done => info!("Download finished"),
        DownloadEvent::Fail { key, kind, error } => match kind {
            FailKind::Retry => warn!("Retrying {}: {}", key, error),
            FailKind::Fail => error!("Failed to download {}: {}", key, error),
            FailKind::System => {
                error!("Failed to download {} due to a worker error: {}", key, error)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.publish(DownloadEvent::Start);
    }

    #[tokio::test]
    async fn subscribers_each_receive_events() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(DownloadEvent::Setup { cores: 4 });
        assert_eq!(a.recv().await.unwrap(), DownloadEvent::Setup { cores: 4 });
        assert_eq!(b.recv().await.unwrap(), DownloadEvent::Setup { cores: 4 });
    }
}
