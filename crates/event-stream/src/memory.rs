use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use uuid::Uuid;

use crate::{
    EventEnvelope, Result, TransportError,
    transport::{ConsumerGroup, GroupSession, OffsetCommitter, PartitionClaim, SessionLease, StreamMessage},
};

const CLAIM_BUFFER: usize = 64;

type PartitionKey = (String, i32);

/// In-memory partitioned broker for testing and single-process runs.
///
/// Topics are created on first use with a fixed partition count. Messages are
/// routed by key hash, so one key always lands on one partition.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    partitions: i32,
    state: Mutex<BrokerState>,
    /// Bumped on every publish, commit and release; feeders wait on it.
    changed: watch::Sender<u64>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<StreamMessage>>>,
    groups: HashMap<String, GroupState>,
    next_unkeyed: u64,
    join_failures: u32,
}

struct GroupState {
    generation: u64,
    /// member id -> subscribed topic
    members: BTreeMap<String, String>,
    revoke: watch::Sender<bool>,
    offsets: HashMap<PartitionKey, i64>,
    /// Partition -> member currently holding it. Cleared on release, so a new
    /// owner never reads while the previous one is still processing.
    owners: HashMap<PartitionKey, String>,
}

impl GroupState {
    fn new() -> Self {
        Self {
            generation: 0,
            members: BTreeMap::new(),
            revoke: watch::channel(false).0,
            offsets: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    fn bump_generation(&mut self) {
        self.revoke.send_replace(true);
        self.revoke = watch::channel(false).0;
        self.generation += 1;
    }

    fn assignment(&self, member_id: &str, topic: &str, partitions: i32) -> Vec<i32> {
        let subscribed: Vec<&String> = self
            .members
            .iter()
            .filter(|(_, t)| t.as_str() == topic)
            .map(|(id, _)| id)
            .collect();

        let Some(index) = subscribed.iter().position(|id| id.as_str() == member_id) else {
            return Vec::new();
        };

        (0..partitions)
            .filter(|p| (*p as usize) % subscribed.len() == index)
            .collect()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl InMemoryBroker {
    /// Creates a broker whose topics have `partitions` partitions.
    pub fn new(partitions: i32) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                state: Mutex::new(BrokerState::default()),
                changed: watch::channel(0).0,
            }),
        }
    }

    pub fn partitions(&self) -> i32 {
        self.inner.partitions
    }

    /// Returns the partition a key is routed to.
    pub fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.inner.partitions as u64) as i32
    }

    /// Appends a message and returns its `(partition, offset)`.
    pub async fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> (i32, i64) {
        let mut state = self.inner.state.lock().await;

        let partition = match key {
            Some(key) => self.partition_for(key),
            None => {
                state.next_unkeyed += 1;
                (state.next_unkeyed % self.inner.partitions as u64) as i32
            }
        };

        let log = &mut state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.inner.partitions as usize])
            [partition as usize];

        let offset = log.len() as i64;
        log.push(StreamMessage {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.map(str::to_string),
            payload,
        });
        drop(state);

        self.notify();
        tracing::debug!(topic, partition, offset, "Message published");
        (partition, offset)
    }

    /// Encodes an envelope and publishes it keyed by its aggregate id.
    pub async fn publish_envelope(&self, topic: &str, envelope: &EventEnvelope) -> Result<(i32, i64)> {
        let bytes = envelope.to_bytes()?;
        Ok(self
            .publish(topic, Some(&envelope.aggregate_id), bytes)
            .await)
    }

    /// Creates a membership handle for `group_id` with a fresh member id.
    pub fn consumer_group(&self, group_id: impl Into<String>) -> InMemoryGroup {
        let group_id = group_id.into();
        let member_id = format!("{group_id}-{}", Uuid::new_v4());
        InMemoryGroup {
            broker: self.clone(),
            group_id,
            member_id,
        }
    }

    /// Makes the next `count` joins fail with `JoinFailed`.
    pub async fn inject_join_failures(&self, count: u32) {
        self.inner.state.lock().await.join_failures = count;
    }

    /// Returns the next offset the group will read from a partition.
    pub async fn committed_offset(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        let state = self.inner.state.lock().await;
        state
            .groups
            .get(group_id)?
            .offsets
            .get(&(topic.to_string(), partition))
            .copied()
    }

    /// Current generation of a group, if it exists.
    pub async fn generation(&self, group_id: &str) -> Option<u64> {
        let state = self.inner.state.lock().await;
        state.groups.get(group_id).map(|g| g.generation)
    }

    /// Number of messages stored on a topic across all partitions.
    pub async fn message_count(&self, topic: &str) -> usize {
        let state = self.inner.state.lock().await;
        state
            .topics
            .get(topic)
            .map(|parts| parts.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn notify(&self) {
        self.inner.changed.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Drives one claim: waits for the previous owner to let go, then forwards
    /// messages from the committed offset until the generation moves on.
    async fn feed(
        self,
        group_id: String,
        member_id: String,
        key: PartitionKey,
        generation: u64,
        tx: mpsc::Sender<StreamMessage>,
        mut revoked: watch::Receiver<bool>,
    ) {
        let mut changed = self.inner.changed.subscribe();
        let mut position: Option<i64> = None;

        loop {
            changed.borrow_and_update();

            let batch: Vec<StreamMessage> = {
                let mut state = self.inner.state.lock().await;
                let BrokerState { topics, groups, .. } = &mut *state;

                let Some(group) = groups.get_mut(&group_id) else {
                    return;
                };
                if group.generation != generation {
                    return;
                }

                let owned = match group.owners.get(&key) {
                    Some(owner) => owner == &member_id,
                    None => {
                        group.owners.insert(key.clone(), member_id.clone());
                        true
                    }
                };

                if owned {
                    let from = *position
                        .get_or_insert_with(|| group.offsets.get(&key).copied().unwrap_or(0));
                    let log = topics
                        .get(&key.0)
                        .and_then(|parts| parts.get(key.1 as usize));
                    log.map(|log| log.iter().skip(from as usize).cloned().collect())
                        .unwrap_or_default()
                } else {
                    Vec::new()
                }
            };

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

            tokio::select! {
                _ = revoked.wait_for(|r| *r) => return,
                result = changed.changed() => {
                    if result.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// A membership handle for one consumer group on an [`InMemoryBroker`].
pub struct InMemoryGroup {
    broker: InMemoryBroker,
    group_id: String,
    member_id: String,
}

#[async_trait]
impl ConsumerGroup for InMemoryGroup {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn join(&self, topic: &str) -> Result<GroupSession> {
        let inner = &self.broker.inner;
        let mut state = inner.state.lock().await;

        if state.join_failures > 0 {
            state.join_failures -= 1;
            return Err(TransportError::JoinFailed {
                group_id: self.group_id.clone(),
                reason: "injected failure".to_string(),
            });
        }

        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); inner.partitions as usize]);

        let group = state
            .groups
            .entry(self.group_id.clone())
            .or_insert_with(GroupState::new);

        // Rejoining members keep the generation so that they do not revoke
        // each other in turn.
        if !group.members.contains_key(&self.member_id) {
            group
                .members
                .insert(self.member_id.clone(), topic.to_string());
            group.bump_generation();
        }

        let generation = group.generation;
        let partitions = group.assignment(&self.member_id, topic, inner.partitions);
        let committer: Arc<dyn OffsetCommitter> = Arc::new(InMemoryCommitter {
            broker: self.broker.clone(),
            group_id: self.group_id.clone(),
        });

        let mut claims = Vec::with_capacity(partitions.len());
        for partition in &partitions {
            let (tx, rx) = mpsc::channel(CLAIM_BUFFER);
            tokio::spawn(self.broker.clone().feed(
                self.group_id.clone(),
                self.member_id.clone(),
                (topic.to_string(), *partition),
                generation,
                tx,
                group.revoke.subscribe(),
            ));
            claims.push(PartitionClaim::new(
                topic,
                *partition,
                generation,
                rx,
                group.revoke.subscribe(),
                committer.clone(),
            ));
        }

        let revoked = group.revoke.subscribe();
        drop(state);

        tracing::info!(
            group_id = %self.group_id,
            member_id = %self.member_id,
            topic,
            generation,
            ?partitions,
            "Joined consumer group"
        );

        let lease = InMemoryLease {
            broker: self.broker.clone(),
            group_id: self.group_id.clone(),
            member_id: self.member_id.clone(),
            topic: topic.to_string(),
            partitions,
        };

        Ok(GroupSession::new(
            generation,
            self.member_id.clone(),
            claims,
            revoked,
            Some(Box::new(lease)),
        ))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.broker.inner.state.lock().await;
        if let Some(group) = state.groups.get_mut(&self.group_id)
            && group.members.remove(&self.member_id).is_some()
        {
            group.owners.retain(|_, owner| owner != &self.member_id);
            group.bump_generation();
            tracing::info!(
                group_id = %self.group_id,
                member_id = %self.member_id,
                generation = group.generation,
                "Left consumer group"
            );
        }
        drop(state);

        self.broker.notify();
        Ok(())
    }
}

struct InMemoryCommitter {
    broker: InMemoryBroker,
    group_id: String,
}

#[async_trait]
impl OffsetCommitter for InMemoryCommitter {
    async fn commit(
        &self,
        topic: &str,
        partition: i32,
        next_offset: i64,
        generation: u64,
    ) -> Result<()> {
        let mut state = self.broker.inner.state.lock().await;
        let group = state
            .groups
            .entry(self.group_id.clone())
            .or_insert_with(GroupState::new);

        if group.generation != generation {
            return Err(TransportError::StaleGeneration {
                group_id: self.group_id.clone(),
                generation,
                current: group.generation,
            });
        }

        group
            .offsets
            .insert((topic.to_string(), partition), next_offset);
        drop(state);

        self.broker.notify();
        Ok(())
    }
}

struct InMemoryLease {
    broker: InMemoryBroker,
    group_id: String,
    member_id: String,
    topic: String,
    partitions: Vec<i32>,
}

#[async_trait]
impl SessionLease for InMemoryLease {
    async fn release(self: Box<Self>) -> Result<()> {
        let mut state = self.broker.inner.state.lock().await;
        if let Some(group) = state.groups.get_mut(&self.group_id) {
            for partition in &self.partitions {
                let key = (self.topic.clone(), *partition);
                if group.owners.get(&key) == Some(&self.member_id) {
                    group.owners.remove(&key);
                }
            }
        }
        drop(state);

        self.broker.notify();
        Ok(())
    }
}
