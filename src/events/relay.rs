use std::{sync::Arc, time::Duration};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{EventBus, PolicyEvent};
use crate::{
    cache::{CacheResult, RedisCache},
    config::RedisEventsConfig,
    observability::metrics,
};

/// Stream field carrying the JSON-encoded event.
const EVENT_FIELD: &str = "event";
const READ_BATCH: usize = 64;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fans policy events out to every gateway node through a Redis stream.
///
/// Locally produced events are appended to the stream. Each node reads the
/// stream through its own consumer group, so every node sees every event,
/// and republishes foreign events on its local bus. Events carrying this
/// node's origin are never re-appended or re-published.
pub struct RedisEventRelay {
    redis: Arc<RedisCache>,
    bus: EventBus,
    stream: String,
    group: String,
    max_len: usize,
    block_ms: usize,
}

impl RedisEventRelay {
    pub async fn connect(config: &RedisEventsConfig, bus: EventBus) -> CacheResult<Self> {
        let redis = RedisCache::connect(
            &config.url,
            "",
            false,
            Duration::from_secs(config.connect_timeout_secs),
        )
        .await?;

        let group = format!("warden-{}", bus.origin());
        // Start at `$`: history from before this node started is already
        // reflected in the initial load.
        redis
            .stream_create_group(&config.stream, &group, "$")
            .await?;

        tracing::info!(
            stream = %config.stream,
            group = %group,
            "Redis event relay connected"
        );

        Ok(Self {
            redis: Arc::new(redis),
            bus,
            stream: config.stream.clone(),
            group,
            max_len: config.max_len,
            block_ms: config.block_ms,
        })
    }

    /// Run the outbound and inbound halves on `tracker` until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken, tracker: &TaskTracker) {
        let relay = Arc::new(self);

        // Subscribe before spawning so nothing published in between is lost
        let rx = relay.bus.subscribe();
        tracker.spawn({
            let relay = Arc::clone(&relay);
            let cancel = cancel.clone();
            async move { relay.run_outbound(rx, cancel).await }
        });

        tracker.spawn(async move { relay.run_inbound(cancel).await });
    }

    async fn run_outbound(
        &self,
        mut rx: tokio::sync::broadcast::Receiver<PolicyEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                result = rx.recv() => match result {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event relay lagged, some events were not forwarded");
                        metrics::record_event_lag("redis_relay", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if event.origin != self.bus.origin() {
                continue;
            }

            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode policy event");
                    continue;
                }
            };

            if let Err(e) = self
                .redis
                .stream_add(
                    &self.stream,
                    &[(EVENT_FIELD, payload.as_str())],
                    Some(self.max_len),
                )
                .await
            {
                tracing::warn!(
                    error = %e,
                    topic = %event.topic,
                    id = event.id,
                    "Failed to forward policy event to Redis"
                );
            }
        }
    }

    async fn run_inbound(&self, cancel: CancellationToken) {
        let consumer = self.bus.origin().to_string();

        while !cancel.is_cancelled() {
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = self.redis.stream_read_group(
                    &self.stream,
                    &self.group,
                    &consumer,
                    READ_BATCH,
                    Some(self.block_ms),
                ) => read,
            };

            let entries = match read {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read policy events from Redis");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            let mut ids = Vec::with_capacity(entries.len());
            for entry in &entries {
                ids.push(entry.id.as_str());

                let Some(payload) = entry.get(EVENT_FIELD) else {
                    tracing::warn!(entry_id = %entry.id, "Stream entry without event payload");
                    continue;
                };
                match serde_json::from_str::<PolicyEvent>(payload) {
                    Ok(event) if event.origin == self.bus.origin() => {}
                    Ok(event) => {
                        self.bus.publish(event);
                    }
                    Err(e) => {
                        tracing::warn!(entry_id = %entry.id, error = %e, "Undecodable policy event");
                    }
                }
            }

            if let Err(e) = self.redis.stream_ack(&self.stream, &self.group, &ids).await {
                tracing::warn!(error = %e, "Failed to acknowledge policy events");
            }
        }

        // Per-node groups would otherwise accumulate forever
        if let Err(e) = self
            .redis
            .stream_destroy_group(&self.stream, &self.group)
            .await
        {
            tracing::debug!(error = %e, "Failed to remove relay consumer group");
        }
    }
}
