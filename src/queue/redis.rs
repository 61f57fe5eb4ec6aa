//! # Redis-backed task queue.
//!
//! One [`RedisQueue`] per tenant, keyed by the tenant's prefix. The wire
//! layout is list-based and compatible with the tenant-side framework:
//! workers enqueue with `LPUSH` and drain from the tail, so a full
//! `LRANGE` read is newest-first and gets reversed to present oldest-first.
//!
//! Worker liveness events arrive on a pub/sub channel next to the queue
//! key. The subscription task is spawned lazily on first use and fans out
//! into a broadcast channel; it reconnects with a fixed delay when the
//! server connection drops.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::QueueError;

use super::{QueueBackend, WorkerEvent};

/// Capacity of the worker-event fan-out channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Delay before re-subscribing after a dropped pub/sub connection.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Redis list + pub/sub channel pair for one tenant.
pub struct RedisQueue {
    client: redis::Client,
    name: String,
    queue_key: String,
    events_channel: String,
    events: OnceLock<broadcast::Sender<WorkerEvent>>,
}

impl RedisQueue {
    /// Opens a queue for `prefix` on the given server.
    ///
    /// Connection establishment is lazy; this only validates the URL.
    pub fn open(prefix: &str, host: &str, port: u16) -> Result<Self, QueueError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        Ok(Self {
            client,
            name: prefix.to_string(),
            queue_key: format!("huey.redis.{prefix}"),
            events_channel: format!("huey.events.{prefix}"),
            events: OnceLock::new(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn enqueued_items(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        let mut conn = self.connection().await?;
        let mut items: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(&self.queue_key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        // LPUSH-fed list reads newest-first; callers want oldest-first.
        items.reverse();
        Ok(items)
    }

    async fn enqueue(&self, raw: Vec<u8>) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn worker_events(&self) -> Result<broadcast::Receiver<WorkerEvent>, QueueError> {
        let tx = self.events.get_or_init(|| {
            let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
            tokio::spawn(subscribe_loop(
                self.client.clone(),
                self.events_channel.clone(),
                tx.clone(),
            ));
            tx
        });
        Ok(tx.subscribe())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Shape of a worker event payload. Anything unparseable still counts as
/// activity and is forwarded with kind "unknown".
#[derive(Deserialize)]
struct WireEvent {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default, alias = "task")]
    task_id: Option<String>,
}

fn parse_event(payload: &[u8]) -> WorkerEvent {
    match serde_json::from_slice::<WireEvent>(payload) {
        Ok(wire) => WorkerEvent {
            kind: wire.kind.unwrap_or_else(|| "unknown".to_string()),
            task_id: wire.task_id,
        },
        Err(_) => WorkerEvent {
            kind: "unknown".to_string(),
            task_id: None,
        },
    }
}

/// Reads the pub/sub channel forever, forwarding into the broadcast sender.
///
/// Exits when every receiver is gone; reconnects on server errors.
async fn subscribe_loop(
    client: redis::Client,
    channel: String,
    tx: broadcast::Sender<WorkerEvent>,
) {
    loop {
        match client.get_async_pubsub().await {
            Ok(mut pubsub) => {
                if let Err(err) = pubsub.subscribe(&channel).await {
                    warn!(channel, error = %err, "worker event subscribe failed");
                } else {
                    debug!(channel, "subscribed to worker events");
                    let mut stream = pubsub.on_message();
                    while let Some(msg) = stream.next().await {
                        let payload: Vec<u8> = msg.get_payload().unwrap_or_default();
                        if tx.send(parse_event(&payload)).is_err() {
                            // Nobody is listening anymore.
                            return;
                        }
                    }
                    warn!(channel, "worker event stream ended");
                }
            }
            Err(err) => {
                warn!(channel, error = %err, "worker event connection failed");
            }
        }
        if tx.receiver_count() == 0 {
            return;
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}
