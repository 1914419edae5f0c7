//! Consumer-group contract between a stream broker and the consumer runtime.
//!
//! A member joins a group for one topic and receives a [`GroupSession`]: the
//! group generation, one [`PartitionClaim`] per assigned partition and a
//! revocation signal. Messages within a claim arrive in partition order.
//! Delivery is at-least-once: an offset only advances when the consumer calls
//! [`PartitionClaim::mark_message`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::Result;

/// A raw message as stored on a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Persists the next offset to read for a partition on behalf of a group.
#[async_trait]
pub trait OffsetCommitter: Send + Sync {
    /// Records `next_offset` as the position the group resumes from.
    async fn commit(
        &self,
        topic: &str,
        partition: i32,
        next_offset: i64,
        generation: u64,
    ) -> Result<()>;
}

/// Broker-side resources held for the lifetime of one session.
#[async_trait]
pub trait SessionLease: Send {
    /// Returns the session's partitions to the group.
    async fn release(self: Box<Self>) -> Result<()>;
}

/// A group membership bound to one group id.
#[async_trait]
pub trait ConsumerGroup: Send + Sync {
    /// The consumer-group id.
    fn group_id(&self) -> &str;

    /// Joins the group for `topic` and waits for a partition assignment.
    async fn join(&self, topic: &str) -> Result<GroupSession>;

    /// Leaves the group. A later `join` enters it again as a new member.
    async fn close(&self) -> Result<()>;
}

/// One partition assigned to this member for the current generation.
pub struct PartitionClaim {
    topic: String,
    partition: i32,
    generation: u64,
    messages: mpsc::Receiver<StreamMessage>,
    revoked: watch::Receiver<bool>,
    committer: Arc<dyn OffsetCommitter>,
}

impl PartitionClaim {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        generation: u64,
        messages: mpsc::Receiver<StreamMessage>,
        revoked: watch::Receiver<bool>,
        committer: Arc<dyn OffsetCommitter>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            generation,
            messages,
            revoked,
            committer,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the next message on this partition.
    ///
    /// Returns `None` once the session has been revoked or the broker stopped
    /// feeding the partition. Revocation wins over a buffered message.
    pub async fn next_message(&mut self) -> Option<StreamMessage> {
        if *self.revoked.borrow() {
            return None;
        }

        tokio::select! {
            biased;
            _ = wait_revoked(&mut self.revoked) => None,
            message = self.messages.recv() => message,
        }
    }

    /// Marks `message` as processed by committing the offset after it.
    pub async fn mark_message(&self, message: &StreamMessage) -> Result<()> {
        self.committer
            .commit(
                &message.topic,
                message.partition,
                message.offset + 1,
                self.generation,
            )
            .await
    }
}

impl std::fmt::Debug for PartitionClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionClaim")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("generation", &self.generation)
            .finish()
    }
}

/// The result of a successful join: one generation of group membership.
pub struct GroupSession {
    generation: u64,
    member_id: String,
    claims: Vec<PartitionClaim>,
    revoked: watch::Receiver<bool>,
    lease: Option<Box<dyn SessionLease>>,
}

impl GroupSession {
    pub fn new(
        generation: u64,
        member_id: impl Into<String>,
        claims: Vec<PartitionClaim>,
        revoked: watch::Receiver<bool>,
        lease: Option<Box<dyn SessionLease>>,
    ) -> Self {
        Self {
            generation,
            member_id: member_id.into(),
            claims,
            revoked,
            lease,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Partitions assigned in this generation, in partition order.
    pub fn partitions(&self) -> Vec<i32> {
        self.claims.iter().map(PartitionClaim::partition).collect()
    }

    /// Moves the claims out so each can be driven by its own task.
    pub fn take_claims(&mut self) -> Vec<PartitionClaim> {
        std::mem::take(&mut self.claims)
    }

    pub fn is_revoked(&self) -> bool {
        *self.revoked.borrow()
    }

    /// Resolves when the group rebalances away from this generation.
    pub async fn revoked(&mut self) {
        wait_revoked(&mut self.revoked).await;
    }

    /// Ends the session, handing its partitions back to the group.
    pub async fn release(mut self) -> Result<()> {
        match self.lease.take() {
            Some(lease) => lease.release().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for GroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupSession")
            .field("generation", &self.generation)
            .field("member_id", &self.member_id)
            .field("partitions", &self.partitions())
            .finish()
    }
}

/// A dropped sender means the broker side is gone, which also ends the session.
async fn wait_revoked(revoked: &mut watch::Receiver<bool>) {
    let _ = revoked.wait_for(|revoked| *revoked).await;
}
