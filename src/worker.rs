//! Worker pool and per-message orchestration.
//!
//! Each worker runs the strict per-message sequence scrape → score →
//! publish → ack. Any step failing is caught at this boundary: the error is
//! wrapped into an [`ErrorEnvelope`] for the log and the delivery is
//! rejected without requeue. Exactly one of ack or reject happens per
//! delivery, enforced by the handle being consumed by value.
//!
//! No ordering is guaranteed between messages processed by different
//! workers; only the internal order of one message is strict.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{ErrorEnvelope, PipelineError, ScrapeError};
use crate::models::{Article, ScrapeTarget, ScrapedArticle};
use crate::publish::Publish;
use crate::queue::Delivery;
use crate::scoring::ScoringEngine;
use crate::scrape::Scrape;

/// One parsed inbound message together with its delivery handle.
pub type WorkItem = (ScrapeTarget, Delivery);

/// Fixed-size pool of workers draining the dispatch channel.
pub struct WorkerPool {
    num_workers: usize,
    scrape_timeout: Duration,
    scraper: Arc<dyn Scrape>,
    engine: Arc<ScoringEngine>,
    publisher: Arc<dyn Publish>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        num_workers: usize,
        scrape_timeout: Duration,
        scraper: Arc<dyn Scrape>,
        engine: Arc<ScoringEngine>,
        publisher: Arc<dyn Publish>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            num_workers,
            scrape_timeout,
            scraper,
            engine,
            publisher,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawns the workers over the receiving end of the dispatch channel.
    pub fn start(&mut self, rx: mpsc::Receiver<WorkItem>) {
        let rx = Arc::new(Mutex::new(rx));

        for i in 0..self.num_workers {
            let worker = Worker {
                id: format!("worker-{i}"),
                rx: Arc::clone(&rx),
                scrape_timeout: self.scrape_timeout,
                scraper: Arc::clone(&self.scraper),
                engine: Arc::clone(&self.engine),
                publisher: Arc::clone(&self.publisher),
                shutdown_rx: self.shutdown_tx.subscribe(),
            };
            self.handles.push(tokio::spawn(worker.run()));
        }

        info!(num_workers = self.num_workers, "worker pool started");
    }

    /// Signals all workers and waits for them to finish their current
    /// message.
    pub async fn shutdown(mut self) {
        // Workers may already be gone if the channel closed
        let _ = self.shutdown_tx.send(());
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked during shutdown");
            }
        }
        info!("worker pool stopped");
    }
}

/// A single worker draining the shared dispatch channel.
struct Worker {
    id: String,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    scrape_timeout: Duration,
    scraper: Arc<dyn Scrape>,
    engine: Arc<ScoringEngine>,
    publisher: Arc<dyn Publish>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker_id = %self.id, "worker started");

        loop {
            let item = {
                let mut rx = self.rx.lock().await;
                tokio::select! {
                    _ = self.shutdown_rx.recv() => break,
                    item = rx.recv() => item,
                }
            };

            match item {
                Some((target, delivery)) => self.process(target, delivery).await,
                // Dispatch side closed the channel
                None => break,
            }
        }

        debug!(worker_id = %self.id, "worker stopped");
    }

    /// Runs the pipeline for one message and settles its delivery.
    async fn process(&self, target: ScrapeTarget, delivery: Delivery) {
        let delivery_id = delivery.id;

        match self.run_pipeline(&target).await {
            Ok(()) => {
                if let Err(e) = self.publisher.ack(delivery).await {
                    error!(
                        worker_id = %self.id,
                        delivery_id = %delivery_id,
                        error = %e,
                        "failed to ack delivery"
                    );
                }
            }
            Err(e) => {
                let envelope = ErrorEnvelope::wrap(&e);
                error!(
                    worker_id = %self.id,
                    delivery_id = %delivery_id,
                    "{envelope}"
                );
                if let Err(reject_err) = self.publisher.reject(delivery).await {
                    error!(
                        worker_id = %self.id,
                        delivery_id = %delivery_id,
                        error = %reject_err,
                        "failed to reject delivery"
                    );
                }
            }
        }
    }

    /// scrape → score → assemble → publish, in that order. The ack happens
    /// in [`process`](Self::process) only after all of this succeeded.
    async fn run_pipeline(&self, target: &ScrapeTarget) -> Result<(), PipelineError> {
        let article = self.resolve_article(target).await?;
        info!(
            worker_id = %self.id,
            url = %article.url,
            title = %article.title,
            "article resolved"
        );

        let subjects = self.engine.score(&article, target.subjects.clone())?;
        for subject in &subjects {
            debug!(
                worker_id = %self.id,
                subject_id = %subject.id,
                symbol = %subject.symbol,
                score = subject.score,
                "subject scored"
            );
        }

        let scraped = ScrapedArticle {
            article,
            subjects,
            referer: target.referer.clone(),
        };
        self.publisher.send(&scraped).await?;
        Ok(())
    }

    /// Local conversion for pre-scraped targets; a deadline-bounded
    /// collaborator fetch for everything else.
    async fn resolve_article(&self, target: &ScrapeTarget) -> Result<Article, ScrapeError> {
        if target.is_scraped() {
            return target.to_article(Utc::now());
        }

        match tokio::time::timeout(self.scrape_timeout, self.scraper.scrape(target)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout {
                seconds: self.scrape_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Referer, Subject};
    use crate::queue::QueueError;
    use crate::scoring::BackgroundCorpus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scraper double: fails when the target URL is "fail://".
    struct StubScraper;

    #[async_trait]
    impl Scrape for StubScraper {
        async fn scrape(&self, target: &ScrapeTarget) -> Result<Article, ScrapeError> {
            if target.url.starts_with("fail://") {
                return Err(ScrapeError::EmptyContent {
                    url: target.url.clone(),
                });
            }
            Ok(Article {
                id: target.article_id.clone(),
                url: target.url.clone(),
                title: "Apple's Social Network".to_string(),
                body: "Apple announced a new social feature today.".to_string(),
                keywords: vec![],
                date: Utc::now(),
            })
        }
    }

    /// Publisher double counting every boundary call.
    #[derive(Default)]
    struct RecordingPublisher {
        sent: AtomicUsize,
        acked: AtomicUsize,
        rejected: AtomicUsize,
    }

    #[async_trait]
    impl Publish for RecordingPublisher {
        async fn send(&self, _scraped: &ScrapedArticle) -> Result<(), QueueError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn ack(&self, _delivery: Delivery) -> Result<(), QueueError> {
            self.acked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reject(&self, _delivery: Delivery) -> Result<(), QueueError> {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_target(url: &str) -> ScrapeTarget {
        ScrapeTarget {
            url: url.to_string(),
            subjects: vec![Subject {
                id: "s-0".to_string(),
                symbol: "AAPL".to_string(),
                name: "Apple inc.".to_string(),
                score: 0.0,
                article_id: "a-1".to_string(),
            }],
            referer: Referer {
                id: "r-1".to_string(),
                external_id: "ext-1".to_string(),
                follower_count: 10,
                article_id: "a-1".to_string(),
            },
            title: None,
            body: None,
            article_id: "a-1".to_string(),
        }
    }

    /// Publisher double whose outbound send always fails.
    #[derive(Default)]
    struct FailingSendPublisher {
        acked: AtomicUsize,
        rejected: AtomicUsize,
    }

    #[async_trait]
    impl Publish for FailingSendPublisher {
        async fn send(&self, _scraped: &ScrapedArticle) -> Result<(), QueueError> {
            Err(QueueError::ConnectionFailed("send refused".to_string()))
        }

        async fn ack(&self, _delivery: Delivery) -> Result<(), QueueError> {
            self.acked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reject(&self, _delivery: Delivery) -> Result<(), QueueError> {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_worker(publisher: Arc<dyn Publish>) -> Worker {
        let engine =
            ScoringEngine::new(Arc::new(BackgroundCorpus::embedded())).unwrap();
        let (_tx, rx) = mpsc::channel::<WorkItem>(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        Worker {
            id: "worker-test".to_string(),
            rx: Arc::new(Mutex::new(rx)),
            scrape_timeout: Duration::from_secs(5),
            scraper: Arc::new(StubScraper),
            engine: Arc::new(engine),
            publisher,
            shutdown_rx: shutdown_tx.subscribe(),
        }
    }

    #[tokio::test]
    async fn test_success_publishes_then_acks_exactly_once() {
        let publisher = Arc::new(RecordingPublisher::default());
        let worker = test_worker(Arc::clone(&publisher) as Arc<dyn Publish>);

        let delivery = Delivery::new("{}".to_string());
        worker.process(test_target("https://example.com"), delivery).await;

        assert_eq!(publisher.sent.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.acked.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.rejected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scrape_failure_rejects_without_publish() {
        let publisher = Arc::new(RecordingPublisher::default());
        let worker = test_worker(Arc::clone(&publisher) as Arc<dyn Publish>);

        let delivery = Delivery::new("{}".to_string());
        worker.process(test_target("fail://broken"), delivery).await;

        assert_eq!(publisher.sent.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.acked.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.rejected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_rejects_instead_of_acking() {
        let publisher = Arc::new(FailingSendPublisher::default());
        let worker = test_worker(Arc::clone(&publisher) as Arc<dyn Publish>);

        let delivery = Delivery::new("{}".to_string());
        worker.process(test_target("https://example.com"), delivery).await;

        assert_eq!(publisher.acked.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.rejected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pool_drains_channel_and_exits_on_close() {
        let publisher = Arc::new(RecordingPublisher::default());
        let engine =
            ScoringEngine::new(Arc::new(BackgroundCorpus::embedded())).unwrap();
        let mut pool = WorkerPool::new(
            2,
            Duration::from_secs(5),
            Arc::new(StubScraper),
            Arc::new(engine),
            Arc::clone(&publisher) as Arc<dyn Publish>,
        );

        let (tx, rx) = mpsc::channel::<WorkItem>(2);
        pool.start(rx);

        for _ in 0..3 {
            tx.send((
                test_target("https://example.com"),
                Delivery::new("{}".to_string()),
            ))
            .await
            .unwrap();
        }
        drop(tx);

        // Workers drain the channel and stop once it closes
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while publisher.acked.load(Ordering::SeqCst) < 3 {
            assert!(tokio::time::Instant::now() < deadline, "pool did not drain");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        pool.shutdown().await;

        assert_eq!(publisher.acked.load(Ordering::SeqCst), 3);
        assert_eq!(publisher.rejected.load(Ordering::SeqCst), 0);
    }
}
