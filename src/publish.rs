//! Outbound publishing and inbound finalization.
//!
//! The publisher owns the two boundary crossings at the end of a pipeline
//! run: putting the enriched result on the outbound queue, and settling the
//! inbound delivery with exactly one ack or reject.

use async_trait::async_trait;

use crate::models::ScrapedArticle;
use crate::queue::{Delivery, QueueError, Transport};

/// Capability seam for the outbound side of the pipeline.
///
/// Send is attempted before ack, so a transport failure on send always ends
/// in a reject rather than a silent ack with no outbound message.
#[async_trait]
pub trait Publish: Send + Sync {
    /// Serializes the result and places it on the outbound queue.
    async fn send(&self, scraped: &ScrapedArticle) -> Result<(), QueueError>;

    /// Marks the originating inbound message as successfully processed.
    async fn ack(&self, delivery: Delivery) -> Result<(), QueueError>;

    /// Marks the originating inbound message as failed, without requeue.
    async fn reject(&self, delivery: Delivery) -> Result<(), QueueError>;
}

/// Production publisher over the Redis transport.
#[derive(Clone)]
pub struct QueuePublisher {
    transport: Transport,
}

impl QueuePublisher {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Publish for QueuePublisher {
    async fn send(&self, scraped: &ScrapedArticle) -> Result<(), QueueError> {
        let payload = serde_json::to_string(scraped)?;
        self.transport.publish(&payload).await
    }

    async fn ack(&self, delivery: Delivery) -> Result<(), QueueError> {
        self.transport.ack(delivery).await
    }

    async fn reject(&self, delivery: Delivery) -> Result<(), QueueError> {
        self.transport.reject(delivery).await
    }
}
