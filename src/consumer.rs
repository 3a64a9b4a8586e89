//! Inbound dispatch loop.
//!
//! A single task owns the inbound side of the transport: it pops one
//! delivery at a time, deserializes the body, and hands parsed work to the
//! pool through a bounded channel. Malformed bodies never reach the pool;
//! they are rejected right here, without requeue.
//!
//! The channel is sized to the worker count, so when every worker is busy
//! the `send` awaits instead of piling up unacked messages: backpressure by
//! blocking the dispatch loop, not by dropping work.
//!
//! Errors from the transport itself (pop or reject failing) are not
//! message-scoped and propagate out of [`Consumer::run`], terminating the
//! loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::models::ScrapeTarget;
use crate::queue::{Delivery, QueueError, Transport};
use crate::worker::WorkItem;

/// Capability seam for the inbound side of the transport.
///
/// One production implementation ([`Transport`]); tests substitute their
/// own doubles.
#[async_trait]
pub trait Receive: Send + Sync {
    /// Name of the queue being consumed, for log lines.
    fn queue_name(&self) -> &str;

    /// Pops the next inbound delivery, blocking up to `timeout`.
    async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Rejects a delivery that never made it into the pool.
    async fn reject(&self, delivery: Delivery) -> Result<(), QueueError>;
}

#[async_trait]
impl Receive for Transport {
    fn queue_name(&self) -> &str {
        self.scrape_queue()
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        Transport::pop(self, timeout).await
    }

    async fn reject(&self, delivery: Delivery) -> Result<(), QueueError> {
        Transport::reject(self, delivery).await
    }
}

/// The dispatch loop between the inbound queue and the worker pool.
pub struct Consumer {
    inbound: Arc<dyn Receive>,
    poll_interval: Duration,
    tx: mpsc::Sender<WorkItem>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Consumer {
    pub fn new(
        inbound: Arc<dyn Receive>,
        poll_interval: Duration,
        tx: mpsc::Sender<WorkItem>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            inbound,
            poll_interval,
            tx,
            shutdown_rx,
        }
    }

    /// Consumes until a shutdown signal arrives or the transport fails.
    pub async fn run(mut self) -> Result<(), QueueError> {
        info!(queue = %self.inbound.queue_name(), "consuming scrape targets");

        loop {
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Closed) => break,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty) => {}
            }

            let Some(delivery) = self.inbound.pop(self.poll_interval).await? else {
                debug!("no scrape targets available");
                continue;
            };

            self.dispatch(delivery).await?;

            if self.tx.is_closed() {
                // Pool side is gone; anything still in flight stays parked
                // on the processing list for operator recovery.
                warn!("worker pool closed, stopping consumer");
                break;
            }
        }

        info!("consumer stopped");
        Ok(())
    }

    /// Parses one delivery and either hands it to the pool or rejects it.
    async fn dispatch(&self, delivery: Delivery) -> Result<(), QueueError> {
        match serde_json::from_str::<ScrapeTarget>(&delivery.payload) {
            Ok(target) => {
                debug!(
                    delivery_id = %delivery.id,
                    url = %target.url,
                    "dispatching scrape target"
                );
                let _ = self.tx.send((target, delivery)).await;
            }
            Err(e) => {
                warn!(
                    delivery_id = %delivery.id,
                    error = %e,
                    "malformed scrape target rejected"
                );
                self.inbound.reject(delivery).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const VALID_MESSAGE: &str = r#"{
        "url": "https://example.com/story",
        "subjects": [
            {"id": "s-0", "symbol": "AAPL", "name": "Apple inc.", "score": 0, "articleId": "a-1"}
        ],
        "referer": {"id": "r-1", "externalId": "ext-1", "followerCount": 10, "articleId": "a-1"},
        "title": null,
        "body": null,
        "articleId": "a-1"
    }"#;

    /// Inbound double serving queued payloads and counting rejects.
    #[derive(Default)]
    struct RecordingInbound {
        payloads: Mutex<VecDeque<String>>,
        rejected: AtomicUsize,
    }

    impl RecordingInbound {
        fn with_payloads(payloads: &[&str]) -> Self {
            Self {
                payloads: Mutex::new(payloads.iter().map(|p| p.to_string()).collect()),
                rejected: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Receive for RecordingInbound {
        fn queue_name(&self) -> &str {
            "scrape_targets"
        }

        async fn pop(&self, _timeout: Duration) -> Result<Option<Delivery>, QueueError> {
            let next = self.payloads.lock().unwrap().pop_front();
            if next.is_none() {
                // Empty queue; yield so the run loop is not a hot spin
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Ok(next.map(Delivery::new))
        }

        async fn reject(&self, _delivery: Delivery) -> Result<(), QueueError> {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_consumer(
        inbound: Arc<RecordingInbound>,
        tx: mpsc::Sender<WorkItem>,
    ) -> (Consumer, broadcast::Sender<()>) {
        let (shutdown_tx, _) = broadcast::channel(1);
        let consumer = Consumer::new(
            inbound as Arc<dyn Receive>,
            Duration::from_millis(10),
            tx,
            shutdown_tx.subscribe(),
        );
        (consumer, shutdown_tx)
    }

    async fn wait_for_rejects(inbound: &RecordingInbound, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while inbound.rejected.load(Ordering::SeqCst) < expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "consumer did not reject {expected} deliveries in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_valid_message_parses() {
        let target: ScrapeTarget = serde_json::from_str(VALID_MESSAGE).unwrap();
        assert_eq!(target.article_id, "a-1");
        assert_eq!(target.subjects.len(), 1);
        assert!(!target.is_scraped());
    }

    #[test]
    fn test_truncated_message_fails_parse() {
        let broken = &VALID_MESSAGE[..VALID_MESSAGE.len() / 2];
        assert!(serde_json::from_str::<ScrapeTarget>(broken).is_err());
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected_and_never_dispatched() {
        let inbound = Arc::new(RecordingInbound::with_payloads(&["this is not json"]));
        let (tx, mut rx) = mpsc::channel::<WorkItem>(1);
        let (consumer, shutdown_tx) = test_consumer(Arc::clone(&inbound), tx);

        let handle = tokio::spawn(consumer.run());
        wait_for_rejects(&inbound, 1).await;

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(inbound.rejected.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err(), "malformed body reached the pool");
    }

    #[tokio::test]
    async fn test_valid_body_is_dispatched_without_reject() {
        let inbound = Arc::new(RecordingInbound::with_payloads(&[VALID_MESSAGE]));
        let (tx, mut rx) = mpsc::channel::<WorkItem>(1);
        let (consumer, shutdown_tx) = test_consumer(Arc::clone(&inbound), tx);

        let handle = tokio::spawn(consumer.run());
        let (target, _delivery) = rx.recv().await.unwrap();

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(target.article_id, "a-1");
        assert_eq!(inbound.rejected.load(Ordering::SeqCst), 0);
    }
}
