use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, PgPool, Row};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::{
    EventEnvelope, Result,
    transport::{
        ConsumerGroup, GroupSession, OffsetCommitter, PartitionClaim, SessionLease, StreamMessage,
    },
};

const CLAIM_BUFFER: usize = 64;

/// Tuning knobs for [`PgBroker`].
#[derive(Debug, Clone)]
pub struct PgBrokerOptions {
    /// Partitions per topic.
    pub partitions: i32,
    /// Delay between fetches on an idle partition.
    pub poll_interval: Duration,
    /// How long a session keeps its partitions before rejoining.
    pub session_timeout: Duration,
    /// Maximum rows fetched per poll.
    pub batch_size: i64,
}

impl Default for PgBrokerOptions {
    fn default() -> Self {
        Self {
            partitions: 3,
            poll_interval: Duration::from_millis(500),
            session_timeout: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

/// PostgreSQL-backed partitioned stream.
///
/// Messages live in `stream_messages`, committed positions in
/// `consumer_offsets`. A member owns a partition while it holds a
/// session-level advisory lock on a dedicated connection; the lock is dropped
/// when the session is released or the connection dies, at which point any
/// other member of the group can claim it on its next join.
#[derive(Clone)]
pub struct PgBroker {
    pool: PgPool,
    options: PgBrokerOptions,
}

impl PgBroker {
    /// Creates a new broker over `pool`.
    pub fn new(pool: PgPool, options: PgBrokerOptions) -> Self {
        Self { pool, options }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn options(&self) -> &PgBrokerOptions {
        &self.options
    }

    /// Appends a message and returns its `(partition, offset)`.
    ///
    /// Unkeyed messages all land on the partition of the empty key.
    pub async fn publish(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<(i32, i64)> {
        let mut tx = self.pool.begin().await?;

        let partition: i32 =
            sqlx::query_scalar("SELECT (mod(abs(hashtext($1)::bigint), $2::bigint))::int")
                .bind(key.unwrap_or(""))
                .bind(self.options.partitions)
                .fetch_one(&mut *tx)
                .await?;

        // Serialises offset assignment per partition.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("stream/{topic}/{partition}"))
            .execute(&mut *tx)
            .await?;

        let offset: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(message_offset) + 1, 0)
            FROM stream_messages
            WHERE topic = $1 AND partition_no = $2
            "#,
        )
        .bind(topic)
        .bind(partition)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stream_messages (topic, partition_no, message_offset, message_key, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(topic)
        .bind(partition)
        .bind(offset)
        .bind(key)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(topic, partition, offset, "Message published");
        Ok((partition, offset))
    }

    /// Encodes an envelope and publishes it keyed by its aggregate id.
    pub async fn publish_envelope(&self, topic: &str, envelope: &EventEnvelope) -> Result<(i32, i64)> {
        let bytes = envelope.to_bytes()?;
        self.publish(topic, Some(&envelope.aggregate_id), &bytes)
            .await
    }

    /// Creates a membership handle for `group_id` with a fresh member id.
    pub fn consumer_group(&self, group_id: impl Into<String>) -> PgGroup {
        let group_id = group_id.into();
        let member_id = format!("{group_id}-{}", Uuid::new_v4());
        PgGroup {
            broker: self.clone(),
            group_id,
            member_id,
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the next offset the group will read from a partition.
    pub async fn committed_offset(
        &self,
        group_id: &str,
        topic: &str,
        partition: i32,
    ) -> Result<Option<i64>> {
        let offset = sqlx::query_scalar(
            r#"
            SELECT next_offset FROM consumer_offsets
            WHERE group_id = $1 AND topic = $2 AND partition_no = $3
            "#,
        )
        .bind(group_id)
        .bind(topic)
        .bind(partition)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offset)
    }

    async fn fetch(&self, topic: &str, partition: i32, from: i64) -> Result<Vec<StreamMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT message_offset, message_key, payload
            FROM stream_messages
            WHERE topic = $1 AND partition_no = $2 AND message_offset >= $3
            ORDER BY message_offset ASC
            LIMIT $4
            "#,
        )
        .bind(topic)
        .bind(partition)
        .bind(from)
        .bind(self.options.batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StreamMessage> {
                Ok(StreamMessage {
                    topic: topic.to_string(),
                    partition,
                    offset: row.try_get("message_offset")?,
                    key: row.try_get("message_key")?,
                    payload: row.try_get("payload")?,
                })
            })
            .collect()
    }

    /// Polls one claimed partition from the committed offset onwards.
    async fn poll(
        self,
        group_id: String,
        topic: String,
        partition: i32,
        tx: mpsc::Sender<StreamMessage>,
        mut revoked: watch::Receiver<bool>,
    ) {
        let mut position = None;

        loop {
            if *revoked.borrow() {
                return;
            }

            let from = match position {
                Some(from) => from,
                None => match self.committed_offset(&group_id, &topic, partition).await {
                    Ok(committed) => *position.insert(committed.unwrap_or(0)),
                    Err(e) => {
                        tracing::warn!(%group_id, %topic, partition, error = %e, "Failed to read committed offset");
                        if idle(&mut revoked, self.options.poll_interval).await {
                            return;
                        }
                        continue;
                    }
                },
            };

            let batch = match self.fetch(&topic, partition, from).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(%group_id, %topic, partition, error = %e, "Poll failed");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                if idle(&mut revoked, self.options.poll_interval).await {
                    return;
                }
                continue;
            }

            for message in batch {
                let offset = message.offset;
                tokio::select! {
                    biased;
                    _ = revoked.wait_for(|r| *r) => return,
                    sent = tx.send(message) => {
                        if sent.is_err() {
                            return;
                        }
                        position = Some(offset + 1);
                    }
                }
            }
        }
    }
}

/// Sleeps for `interval`; returns true if the session was revoked meanwhile.
async fn idle(revoked: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        _ = revoked.wait_for(|r| *r) => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

fn lock_key(group_id: &str, topic: &str, partition: i32) -> String {
    format!("{group_id}/{topic}/{partition}")
}

/// A membership handle for one consumer group on a [`PgBroker`].
pub struct PgGroup {
    broker: PgBroker,
    group_id: String,
    member_id: String,
    generation: AtomicU64,
}

#[async_trait]
impl ConsumerGroup for PgGroup {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn join(&self, topic: &str) -> Result<GroupSession> {
        let options = &self.broker.options;
        let mut conn = self.broker.pool.acquire().await?.detach();

        let mut partitions = Vec::new();
        for partition in 0..options.partitions {
            let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtextextended($1, 0))")
                .bind(lock_key(&self.group_id, topic, partition))
                .fetch_one(&mut conn)
                .await?;
            if locked {
                partitions.push(partition);
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let revoke = Arc::new(watch::channel(false).0);

        // Sessions are time-boxed so that partitions left by a dead member
        // are picked up by the survivors on their next join.
        let timer = Arc::clone(&revoke);
        let timeout = options.session_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer.send_replace(true);
        });

        let committer: Arc<dyn OffsetCommitter> = Arc::new(PgCommitter {
            pool: self.broker.pool.clone(),
            group_id: self.group_id.clone(),
        });

        let mut claims = Vec::with_capacity(partitions.len());
        for partition in &partitions {
            let (tx, rx) = mpsc::channel(CLAIM_BUFFER);
            tokio::spawn(self.broker.clone().poll(
                self.group_id.clone(),
                topic.to_string(),
                *partition,
                tx,
                revoke.subscribe(),
            ));
            claims.push(PartitionClaim::new(
                topic,
                *partition,
                generation,
                rx,
                revoke.subscribe(),
                committer.clone(),
            ));
        }

        tracing::info!(
            group_id = %self.group_id,
            member_id = %self.member_id,
            topic,
            generation,
            ?partitions,
            "Joined consumer group"
        );

        let revoked = revoke.subscribe();
        let lease = PgLease { conn, revoke };

        Ok(GroupSession::new(
            generation,
            self.member_id.clone(),
            claims,
            revoked,
            Some(Box::new(lease)),
        ))
    }

    async fn close(&self) -> Result<()> {
        // Partition locks belong to session connections, which are closed on
        // release; nothing is registered for the member itself.
        tracing::info!(
            group_id = %self.group_id,
            member_id = %self.member_id,
            "Left consumer group"
        );
        Ok(())
    }
}

struct PgCommitter {
    pool: PgPool,
    group_id: String,
}

#[async_trait]
impl OffsetCommitter for PgCommitter {
    async fn commit(
        &self,
        topic: &str,
        partition: i32,
        next_offset: i64,
        _generation: u64,
    ) -> Result<()> {
        // Only the holder of the partition lock commits, so the generation
        // needs no check here.
        sqlx::query(
            r#"
            INSERT INTO consumer_offsets (group_id, topic, partition_no, next_offset, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (group_id, topic, partition_no)
            DO UPDATE SET next_offset = EXCLUDED.next_offset, updated_at = NOW()
            "#,
        )
        .bind(&self.group_id)
        .bind(topic)
        .bind(partition)
        .bind(next_offset)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

struct PgLease {
    conn: PgConnection,
    revoke: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl SessionLease for PgLease {
    async fn release(self: Box<Self>) -> Result<()> {
        let PgLease { mut conn, revoke } = *self;
        revoke.send_replace(true);

        sqlx::query("SELECT pg_advisory_unlock_all()")
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }
}
