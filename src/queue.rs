//! Redis list transport for the inbound and outbound queues.
//!
//! Inbound delivery uses `BRPOPLPUSH` to atomically park the payload on a
//! processing list while it is in flight, which is what makes the delivery
//! handle work: acknowledging removes the parked payload, rejecting moves it
//! onto a rejected list. Exactly one payload is in flight per pop, the Redis
//! analogue of a prefetch of one.
//!
//! Rejected payloads are never pushed back onto the main queue; redelivery is
//! an operator decision, not this worker's.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Failed to connect to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to serialize an outbound message.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Opaque handle for one in-flight inbound message.
///
/// `ack` and `reject` take the handle by value, so the type system enforces
/// the at-most-one-outcome rule: a consumed handle cannot be finalized twice.
#[derive(Debug)]
pub struct Delivery {
    /// Correlation id for log lines about this delivery.
    pub id: Uuid,
    /// Raw message body as it sits on the processing list.
    pub payload: String,
}

impl Delivery {
    pub fn new(payload: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }
}

/// Redis-backed queue transport shared by the consumer, the publisher, and
/// the health checker.
///
/// `ConnectionManager` clones share one multiplexed connection and are safe
/// for concurrent use, so a clone of this transport can be handed to each
/// component.
#[derive(Clone)]
pub struct Transport {
    redis: ConnectionManager,
    scrape_queue: String,
    processing_queue: String,
    rejected_queue: String,
    scraped_queue: String,
}

impl Transport {
    /// Connects to Redis and sets up the queue names.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::ConnectionFailed` if the connection fails; this
    /// is a fatal setup error, not a per-message one.
    pub async fn connect(
        redis_url: &str,
        scrape_queue: &str,
        scraped_queue: &str,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_connection(redis, scrape_queue, scraped_queue))
    }

    /// Builds a transport from an existing connection manager.
    pub fn from_connection(
        redis: ConnectionManager,
        scrape_queue: &str,
        scraped_queue: &str,
    ) -> Self {
        Self {
            redis,
            scrape_queue: scrape_queue.to_string(),
            processing_queue: format!("{scrape_queue}:processing"),
            rejected_queue: format!("{scrape_queue}:rejected"),
            scraped_queue: scraped_queue.to_string(),
        }
    }

    /// Pops the next inbound message, blocking up to `timeout`.
    ///
    /// The payload is atomically moved onto the processing list, where it
    /// stays until the returned [`Delivery`] is acked or rejected.
    ///
    /// Returns `Ok(None)` when the timeout expires with no message.
    pub async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.redis.clone();
        let timeout_secs = timeout.as_secs().max(1) as usize;

        let result: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(&self.scrape_queue)
            .arg(&self.processing_queue)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        Ok(result.map(Delivery::new))
    }

    /// Acknowledges a delivery: the parked payload is dropped for good.
    pub async fn ack(&self, delivery: Delivery) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        conn.lrem::<_, _, ()>(&self.processing_queue, 1, &delivery.payload)
            .await?;
        Ok(())
    }

    /// Rejects a delivery without requeue.
    ///
    /// The payload moves from the processing list to the rejected list so an
    /// operator can inspect it; this worker never redelivers from there.
    pub async fn reject(&self, delivery: Delivery) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lrem(&self.processing_queue, 1, &delivery.payload)
            .lpush(&self.rejected_queue, &delivery.payload);
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    /// Publishes a serialized message onto the outbound queue.
    pub async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(&self.scraped_queue, payload).await?;
        Ok(())
    }

    /// Returns whether the transport answers a `PING`.
    pub async fn is_connected(&self) -> bool {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }

    /// Name of the inbound queue.
    pub fn scrape_queue(&self) -> &str {
        &self.scrape_queue
    }

    /// Name of the outbound queue.
    pub fn scraped_queue(&self) -> &str {
        &self.scraped_queue
    }
}
