//! Progress reporting
//!
//! The scheduler reports what it is doing through a [`ProgressObserver`].
//! Observers are a side channel: they cannot influence scheduling.

use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted during a scheduler run, in scheduling order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The run has started
    Started {
        /// Steps in the plan
        total_steps: usize,
    },
    /// A step's first attempt was admitted
    StepStarted {
        /// Step identifier
        step_id: String,
        /// Tool being called
        tool: String,
    },
    /// A step is about to be retried
    StepRetrying {
        /// Step identifier
        step_id: String,
        /// Retry number, starting at 1
        attempt: u32,
        /// Backoff before the retry
        delay_ms: u64,
        /// Failure that triggered the retry
        error: String,
    },
    /// A step completed
    StepCompleted {
        /// Step identifier
        step_id: String,
        /// Duration of the last attempt
        duration_ms: u64,
        /// Retries used
        retry_count: u32,
    },
    /// A step failed or was skipped
    StepFailed {
        /// Step identifier
        step_id: String,
        /// Failure message
        error: String,
        /// Retries used
        retry_count: u32,
    },
    /// The run finished without being cancelled
    Completed {
        /// Whether every step succeeded
        success: bool,
        /// Wall-clock duration
        duration_ms: u64,
    },
    /// The run was cancelled
    Aborted {
        /// Steps completed before the abort
        completed_steps: usize,
        /// Steps failed before the abort
        failed_steps: usize,
    },
}

impl ProgressEvent {
    /// Step the event is about, if any
    #[must_use]
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepStarted { step_id, .. }
            | Self::StepRetrying { step_id, .. }
            | Self::StepCompleted { step_id, .. }
            | Self::StepFailed { step_id, .. } => Some(step_id),
            Self::Started { .. } | Self::Completed { .. } | Self::Aborted { .. } => None,
        }
    }
}

/// Receives progress events
pub trait ProgressObserver: Send + Sync {
    /// Called synchronously for every event
    fn on_event(&self, event: &ProgressEvent);
}

/// Broadcast-based fan-out of progress events.
///
/// Slow subscribers miss events (lagged) rather than blocking the run.
#[derive(Debug, Clone)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers got it
    pub fn publish(&self, event: ProgressEvent) -> usize {
        // no receivers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Current number of subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressObserver for ProgressBus {
    fn on_event(&self, event: &ProgressEvent) {
        self.publish(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_fan_out() {
        let bus = ProgressBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.on_event(&ProgressEvent::Started { total_steps: 2 });
        let count = bus.publish(ProgressEvent::StepStarted {
            step_id: "s1".into(),
            tool: "trim_clip".into(),
        });
        assert_eq!(count, 2);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap(), ProgressEvent::Started { total_steps: 2 });
            assert_eq!(rx.recv().await.unwrap().step_id(), Some("s1"));
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ProgressBus::default();
        assert_eq!(
            bus.publish(ProgressEvent::Completed {
                success: true,
                duration_ms: 1
            }),
            0
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::StepFailed {
            step_id: "s2".into(),
            error: "Clip not found".into(),
            retry_count: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_failed");
        assert_eq!(json["step_id"], "s2");
        assert_eq!(json["retry_count"], 0);
    }
}
