//! Redis-backed durable queue (at-least-once delivery).
//!
//! ## Keys
//!
//! - `{prefix}:{queue}:job:{id}`: JSON job record
//! - `{prefix}:{queue}:pending`: list of ids waiting for a worker
//! - `{prefix}:{queue}:processing`: list of ids claimed by a worker
//! - `{prefix}:{queue}:owners`: hash of claimed id -> consumer id
//! - `{prefix}:{queue}:consumer:{consumer}`: heartbeat, expires after the lease TTL
//!
//! Claiming moves an id from `pending` to `processing` and records the
//! claiming consumer in one script, so any number of worker processes can
//! drain one queue. Every [`RedisJobQueue`] refreshes its heartbeat in the
//! background while it is alive. [`JobQueue::requeue_orphans`] only moves ids
//! whose owner's heartbeat has expired; jobs held by live consumers stay put.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::MultiplexedConnection;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use clarity_core::{JobId, JobProgress, JobRecord, JobStatus};

use super::queue::{JobQueue, QueueError};

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "clarity";

/// How long a consumer's claims survive without a heartbeat.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

// KEYS: pending, processing, owners. ARGV: consumer, heartbeat key prefix.
// Returns nil when `pending` is empty, else {id, claimed}. An id whose owner
// is still alive is a duplicate delivery: it is dropped, claimed = 0.
static CLAIM_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local id = redis.call('LMOVE', KEYS[1], KEYS[2], 'LEFT', 'RIGHT')
if not id then return false end
local owner = redis.call('HGET', KEYS[3], id)
if owner and owner ~= ARGV[1] and redis.call('EXISTS', ARGV[2] .. owner) == 1 then
  redis.call('LREM', KEYS[2], -1, id)
  return {id, 0}
end
redis.call('HSET', KEYS[3], id, ARGV[1])
return {id, 1}
",
    )
});

// KEYS: processing, owners. ARGV: id, consumer.
static RELEASE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
redis.call('LREM', KEYS[1], 1, ARGV[1])
if redis.call('HGET', KEYS[2], ARGV[1]) == ARGV[2] then
  redis.call('HDEL', KEYS[2], ARGV[1])
end
return 1
",
    )
});

// KEYS: processing, pending, owners. ARGV: heartbeat key prefix.
// Returns the number of ids moved back to the head of `pending`.
static REQUEUE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local moved = 0
local seen = {}
for _, id in ipairs(redis.call('LRANGE', KEYS[1], 0, -1)) do
  if not seen[id] then
    seen[id] = true
    local owner = redis.call('HGET', KEYS[3], id)
    if (not owner) or redis.call('EXISTS', ARGV[1] .. owner) == 0 then
      redis.call('LREM', KEYS[1], 0, id)
      redis.call('HDEL', KEYS[3], id)
      redis.call('LPUSH', KEYS[2], id)
      moved = moved + 1
    end
  end
end
return moved
",
    )
});

/// Aborts the heartbeat task once the last queue handle is dropped.
struct Heartbeat(JoinHandle<()>);

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub struct RedisJobQueue {
    name: String,
    prefix: String,
    consumer: String,
    conn: MultiplexedConnection,
    _heartbeat: Arc<Heartbeat>,
}

impl RedisJobQueue {
    /// Connect to `redis_url` with the default lease TTL.
    ///
    /// Fails if the server cannot be reached; callers decide whether that is
    /// fatal.
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, QueueError> {
        Self::connect_with_lease(redis_url, prefix, name, DEFAULT_LEASE_TTL).await
    }

    /// Connect as a new consumer whose claims expire `lease_ttl` after its
    /// last heartbeat. Heartbeats are sent every third of the TTL.
    pub async fn connect_with_lease(
        redis_url: &str,
        prefix: impl Into<String>,
        name: impl Into<String>,
        lease_ttl: Duration,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::storage)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::storage)?;

        let name = name.into();
        let prefix = prefix.into();
        let consumer = Uuid::now_v7().to_string();
        let heartbeat_key = format!("{prefix}:{name}:consumer:{consumer}");

        // The first beat must land before any claim can be made.
        beat(&mut conn.clone(), &heartbeat_key, lease_ttl).await?;
        let heartbeat = spawn_heartbeat(conn.clone(), heartbeat_key, lease_ttl);

        Ok(Self {
            name,
            prefix,
            consumer,
            conn,
            _heartbeat: Arc::new(heartbeat),
        })
    }

    /// Identifier this handle claims jobs under.
    pub fn consumer_id(&self) -> &str {
        &self.consumer
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:{}:job:{}", self.prefix, self.name, id)
    }

    fn pending_key(&self) -> String {
        format!("{}:{}:pending", self.prefix, self.name)
    }

    fn processing_key(&self) -> String {
        format!("{}:{}:processing", self.prefix, self.name)
    }

    fn owners_key(&self) -> String {
        format!("{}:{}:owners", self.prefix, self.name)
    }

    fn heartbeat_prefix(&self) -> String {
        format!("{}:{}:consumer:", self.prefix, self.name)
    }

    async fn load(&self, id: &JobId) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("GET failed: {e}")))?;

        raw.map(|r| serde_json::from_str(&r).map_err(QueueError::from))
            .transpose()
    }

    async fn save(&self, job: &JobRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.job_key(&job.id))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("SET failed: {e}")))?;
        Ok(())
    }

    /// Read-modify-write of one record.
    ///
    /// Only the consumer that owns a claim writes to it, so no optimistic
    /// locking is used.
    async fn update(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> bool + Send) -> Result<bool, QueueError> {
        let mut job = self
            .load(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        let changed = f(&mut job);
        if changed {
            self.save(&job).await?;
        }
        Ok(changed)
    }

    /// Drop `id` from `processing` and clear our ownership of it.
    async fn release(&self, id: &JobId) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = RELEASE_SCRIPT
            .key(self.processing_key())
            .key(self.owners_key())
            .arg(id.as_str())
            .arg(&self.consumer)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("release failed: {e}")))?;
        Ok(())
    }

    async fn finish(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> bool + Send) -> Result<(), QueueError> {
        if !self.update(id, f).await? {
            warn!(queue = %self.name, job_id = %id, "job already terminal");
        }
        self.release(id).await
    }
}

async fn beat(conn: &mut MultiplexedConnection, key: &str, ttl: Duration) -> Result<(), QueueError> {
    let _: () = redis::cmd("SET")
        .arg(key)
        .arg(1)
        .arg("PX")
        .arg(ttl.as_millis() as u64)
        .query_async(conn)
        .await
        .map_err(|e| QueueError::Storage(format!("heartbeat failed: {e}")))?;
    Ok(())
}

fn spawn_heartbeat(mut conn: MultiplexedConnection, key: String, ttl: Duration) -> Heartbeat {
    let period = (ttl / 3).max(Duration::from_millis(10));
    Heartbeat(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = beat(&mut conn, &key, ttl).await {
                warn!(heartbeat = %key, error = %e, "queue heartbeat failed");
            }
        }
    }))
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, payload), fields(queue = %self.name), err)]
    async fn submit(&self, payload: JsonValue, id: Option<JobId>) -> Result<JobId, QueueError> {
        let id = id.unwrap_or_default();
        let job = JobRecord::new(id.clone(), self.name.clone(), payload);
        let body = serde_json::to_string(&job)?;

        let mut conn = self.conn.clone();
        // NX: an existing record with this id is never overwritten.
        let created: Option<String> = redis::cmd("SET")
            .arg(self.job_key(&id))
            .arg(body)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("SET NX failed: {e}")))?;
        if created.is_none() {
            return Err(QueueError::AlreadyExists(id));
        }

        let _: i64 = redis::cmd("RPUSH")
            .arg(self.pending_key())
            .arg(id.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("RPUSH failed: {e}")))?;

        debug!(queue = %self.name, job_id = %id, "job queued");
        Ok(id)
    }

    async fn status(&self, id: &JobId) -> Result<JobStatus, QueueError> {
        Ok(JobStatus::from(self.load(id).await?))
    }

    async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.conn.clone();
        loop {
            let claimed: Option<(String, i64)> = CLAIM_SCRIPT
                .key(self.pending_key())
                .key(self.processing_key())
                .key(self.owners_key())
                .arg(&self.consumer)
                .arg(self.heartbeat_prefix())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| QueueError::Storage(format!("claim failed: {e}")))?;
            let Some((raw_id, owned)) = claimed else {
                return Ok(None);
            };
            if owned == 0 {
                warn!(queue = %self.name, job_id = %raw_id, "job still held by a live consumer, skipping");
                continue;
            }
            let id: JobId = raw_id
                .parse()
                .map_err(|e| QueueError::Serialization(format!("bad job id in pending list: {e}")))?;

            let Some(mut job) = self.load(&id).await? else {
                warn!(queue = %self.name, job_id = %id, "pending id without record, dropping");
                self.release(&id).await?;
                continue;
            };
            // A requeued job may have finished before its worker died.
            if !job.mark_active() {
                self.release(&id).await?;
                continue;
            }
            self.save(&job).await?;
            return Ok(Some(job));
        }
    }

    async fn record_progress(&self, id: &JobId, update: JobProgress) -> Result<(), QueueError> {
        self.update(id, |job| job.merge_progress(update)).await.map(|_| ())
    }

    async fn complete(&self, id: &JobId, result: JsonValue) -> Result<(), QueueError> {
        self.finish(id, |job| job.mark_completed(result)).await
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        let error = error.to_string();
        self.finish(id, |job| job.mark_failed(error)).await
    }

    /// Moves ids whose owning consumer stopped heartbeating back to the head
    /// of `pending`.
    async fn requeue_orphans(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let moved: usize = REQUEUE_SCRIPT
            .key(self.processing_key())
            .key(self.pending_key())
            .key(self.owners_key())
            .arg(self.heartbeat_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Storage(format!("requeue failed: {e}")))?;
        Ok(moved)
    }

    fn allows_concurrent_claims(&self) -> bool {
        true
    }
}
