use std::time::Duration;

use async_trait::async_trait;
use redis::{
    ConnectionInfo, IntoConnectionInfo, Value, aio::MultiplexedConnection, cluster::ClusterClient,
    cluster_async::ClusterConnection,
};

use super::{
    error::{CacheError, CacheResult},
    traits::Cache,
};
use crate::config::RedisCacheConfig;

/// Either a standalone or a cluster connection. Both accept the same
/// command syntax.
enum RedisConn {
    Standalone(MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// Execute a Redis command on either connection type.
macro_rules! redis_cmd {
    ($conn:expr, $cmd:expr) => {
        match $conn {
            RedisConn::Standalone(ref mut c) => $cmd.query_async(c).await,
            RedisConn::Cluster(ref mut c) => $cmd.query_async(c).await,
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Types
// ─────────────────────────────────────────────────────────────────────────────

/// An entry read from a Redis Stream.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// The stream entry ID (e.g., "1234567890-0")
    pub id: String,
    /// Field-value pairs in this entry
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    /// Get a field value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

enum RedisClient {
    Standalone(redis::Client),
    Cluster(ClusterClient),
}

/// Redis-backed session store. Also carries the stream commands used to
/// relay policy events between nodes.
pub struct RedisCache {
    client: RedisClient,
    key_prefix: String,
    connect_timeout: Duration,
}

impl RedisCache {
    pub async fn from_config(config: &RedisCacheConfig) -> CacheResult<Self> {
        Self::connect(
            &config.url,
            &config.key_prefix,
            config.cluster,
            Duration::from_secs(config.connect_timeout_secs),
        )
        .await
    }

    /// Open a client for `url`. In cluster mode `url` is a comma-separated
    /// node list. The first connection is made eagerly so a bad address
    /// fails at startup.
    pub async fn connect(
        url: &str,
        key_prefix: &str,
        cluster: bool,
        connect_timeout: Duration,
    ) -> CacheResult<Self> {
        let client = if cluster {
            let nodes: Vec<ConnectionInfo> = url
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    let node_url = if s.starts_with("redis://") || s.starts_with("rediss://") {
                        s.to_string()
                    } else {
                        format!("redis://{}", s)
                    };
                    node_url.into_connection_info()
                })
                .collect::<Result<Vec<_>, _>>()?;

            if nodes.is_empty() {
                return Err(CacheError::Redis(redis::RedisError::from((
                    redis::ErrorKind::InvalidClientConfig,
                    "No cluster nodes specified in URL",
                ))));
            }

            let client = redis::cluster::ClusterClientBuilder::new(nodes)
                .connection_timeout(connect_timeout)
                .build()?;
            RedisClient::Cluster(client)
        } else {
            RedisClient::Standalone(redis::Client::open(url)?)
        };

        let cache = Self {
            client,
            key_prefix: key_prefix.to_string(),
            connect_timeout,
        };
        cache.health_check().await?;
        Ok(cache)
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a Redis connection, either standalone or cluster.
    async fn get_connection(&self) -> CacheResult<RedisConn> {
        let connect = async {
            match &self.client {
                RedisClient::Standalone(client) => {
                    let conn = client.get_multiplexed_async_connection().await?;
                    Ok::<_, CacheError>(RedisConn::Standalone(conn))
                }
                RedisClient::Cluster(client) => {
                    let conn = client.get_async_connection().await?;
                    Ok::<_, CacheError>(RedisConn::Cluster(conn))
                }
            }
        };

        tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| CacheError::Timeout)?
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Redis Streams Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Add an entry to a Redis Stream.
    ///
    /// Uses XADD with optional MAXLEN ~ for approximate trimming.
    /// Returns the auto-generated entry ID.
    pub async fn stream_add(
        &self,
        key: &str,
        fields: &[(&str, &str)],
        max_len: Option<usize>,
    ) -> CacheResult<String> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&full_key);

        if let Some(max) = max_len {
            cmd.arg("MAXLEN").arg("~").arg(max);
        }

        cmd.arg("*");

        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }

        let id: String = redis_cmd!(conn, cmd)?;
        Ok(id)
    }

    /// Create a consumer group for a stream.
    ///
    /// Uses XGROUP CREATE with MKSTREAM to create the stream if it doesn't exist.
    /// Returns true if the group was created, false if it already exists.
    pub async fn stream_create_group(
        &self,
        key: &str,
        group: &str,
        start_id: &str,
    ) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let result: Result<(), redis::RedisError> = redis_cmd!(
            conn,
            redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&full_key)
                .arg(group)
                .arg(start_id)
                .arg("MKSTREAM")
        );

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                // BUSYGROUP means the group already exists
                if e.to_string().contains("BUSYGROUP") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Remove a consumer group. Used on shutdown for per-node groups.
    pub async fn stream_destroy_group(&self, key: &str, group: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let _: i64 = redis_cmd!(
            conn,
            redis::cmd("XGROUP").arg("DESTROY").arg(&full_key).arg(group)
        )?;
        Ok(())
    }

    /// Read undelivered entries from a stream using a consumer group.
    pub async fn stream_read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: Option<usize>,
    ) -> CacheResult<Vec<StreamEntry>> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer);

        if let Some(ms) = block_ms {
            cmd.arg("BLOCK").arg(ms);
        }

        cmd.arg("COUNT").arg(count);
        cmd.arg("STREAMS").arg(&full_key).arg(">");

        let value: Value = redis_cmd!(conn, cmd)?;

        Ok(Self::parse_xreadgroup_response(value))
    }

    /// Acknowledge entries in a consumer group.
    ///
    /// Returns the number of entries acknowledged.
    pub async fn stream_ack(&self, key: &str, group: &str, ids: &[&str]) -> CacheResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let mut cmd = redis::cmd("XACK");
        cmd.arg(&full_key).arg(group);
        for id in ids {
            cmd.arg(*id);
        }

        let count: u64 = redis_cmd!(conn, cmd)?;
        Ok(count)
    }

    /// Parse XREADGROUP response into stream entries.
    fn parse_xreadgroup_response(value: Value) -> Vec<StreamEntry> {
        let mut entries = Vec::new();

        // Nil if no entries, or [[stream_name, [[id, [field, value, ...]]]]]
        if let Value::Array(streams) = value {
            for stream in streams {
                if let Value::Array(stream_data) = stream
                    && stream_data.len() >= 2
                    && let Value::Array(stream_entries) = &stream_data[1]
                {
                    for entry_value in stream_entries {
                        if let Value::Array(entry) = entry_value
                            && entry.len() >= 2
                        {
                            let id = match &entry[0] {
                                Value::BulkString(bytes) => {
                                    String::from_utf8_lossy(bytes).to_string()
                                }
                                _ => continue,
                            };

                            let mut fields = Vec::new();
                            if let Value::Array(field_values) = &entry[1] {
                                let mut iter = field_values.iter();
                                while let (Some(key), Some(val)) = (iter.next(), iter.next()) {
                                    if let (Value::BulkString(k), Value::BulkString(v)) = (key, val)
                                    {
                                        fields.push((
                                            String::from_utf8_lossy(k).to_string(),
                                            String::from_utf8_lossy(v).to_string(),
                                        ));
                                    }
                                }
                            }

                            entries.push(StreamEntry { id, fields });
                        }
                    }
                }
            }
        }

        entries
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let data: Option<Vec<u8>> = redis_cmd!(conn, redis::cmd("GET").arg(&full_key))?;

        Ok(data)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        if ttl.as_secs() > 0 {
            let _: () = redis_cmd!(
                conn,
                redis::cmd("SETEX")
                    .arg(&full_key)
                    .arg(ttl.as_secs())
                    .arg(value)
            )?;
        } else {
            let _: () = redis_cmd!(conn, redis::cmd("SET").arg(&full_key).arg(value))?;
        }

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let result: Option<String> = if ttl.as_secs() > 0 {
            redis_cmd!(
                conn,
                redis::cmd("SET")
                    .arg(&full_key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl.as_secs())
            )?
        } else {
            redis_cmd!(conn, redis::cmd("SET").arg(&full_key).arg(value).arg("NX"))?
        };

        // SET ... NX returns "OK" if set, nil if key exists
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let removed: i64 = redis_cmd!(conn, redis::cmd("DEL").arg(&full_key))?;
        Ok(removed > 0)
    }

    async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis_cmd!(conn, redis::cmd("PING"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_xreadgroup_response() {
        let value = Value::Array(vec![Value::Array(vec![
            bulk("warden:policy-events"),
            Value::Array(vec![Value::Array(vec![
                bulk("1700000000000-0"),
                Value::Array(vec![bulk("event"), bulk("{}"), bulk("origin"), bulk("n1")]),
            ])]),
        ])]);

        let entries = RedisCache::parse_xreadgroup_response(value);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "1700000000000-0");
        assert_eq!(entries[0].get("origin"), Some("n1"));
        assert_eq!(entries[0].get("missing"), None);
    }

    #[test]
    fn test_parse_xreadgroup_nil() {
        assert!(RedisCache::parse_xreadgroup_response(Value::Nil).is_empty());
    }
}
