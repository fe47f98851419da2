//! Server status change notifications
//!
//! Every lifecycle transition is broadcast to all subscribers. Publishing
//! never blocks: a subscriber that falls behind skips the oldest events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Events buffered per subscriber before it starts lagging
pub const DEFAULT_BUFFER: usize = 16;

/// A lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Server is now running
    pub running: bool,
    /// Bound port, 0 when stopped
    pub port: u16,
}

/// Broadcast channel for [`StatusChange`] events
pub struct StatusNotifier {
    sender: broadcast::Sender<StatusChange>,
}

impl StatusNotifier {
    /// Create a notifier buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.sender.subscribe()
    }

    /// Run `callback` for every future event on a background task.
    ///
    /// The task ends when the notifier is dropped. Must be called from
    /// within a tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(StatusChange) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => callback(change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Status observer lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Publish an event; returns how many subscribers received it
    pub fn publish(&self, change: StatusChange) -> usize {
        match self.sender.send(change) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No status subscribers for {:?}", change);
                0
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let notifier = StatusNotifier::default();
        assert_eq!(notifier.publish(StatusChange { running: true, port: 8080 }), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let notifier = StatusNotifier::default();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        let change = StatusChange { running: true, port: 8080 };
        assert_eq!(notifier.publish(change), 2);
        assert_eq!(a.recv().await.unwrap(), change);
        assert_eq!(b.recv().await.unwrap(), change);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block() {
        let notifier = StatusNotifier::new(2);
        let mut slow = notifier.subscribe();

        for port in 0..10 {
            notifier.publish(StatusChange { running: true, port });
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(slow.recv().await.unwrap().port, 8);
    }

    #[tokio::test]
    async fn test_on_change_callback() {
        let notifier = StatusNotifier::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let task = notifier.on_change(move |change| sink.lock().unwrap().push(change.running));

        notifier.publish(StatusChange { running: true, port: 8080 });
        notifier.publish(StatusChange { running: false, port: 0 });

        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("callback did not observe both events");

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);

        drop(notifier);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("callback task did not end")
            .unwrap();
    }
}
