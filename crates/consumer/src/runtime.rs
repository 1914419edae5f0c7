//! Consumer runtime: one topic, one consumer group, one handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use event_stream::{ConsumerGroup, GroupSession, PartitionClaim, StreamMessage};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::handler::MessageHandler;
use crate::shutdown::Shutdown;
use crate::state::RuntimeState;
use crate::{ConsumerError, Result};

/// Default delay between failed join attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Observable status of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub state: RuntimeState,
    /// Number of successful joins since the runtime was built.
    pub epoch: u64,
    /// True once the current run has received its first assignment.
    ///
    /// An assignment may be empty when the group has more members than the
    /// topic has partitions; such a member is ready but idle.
    pub ready: bool,
    /// Partitions held in the current generation.
    pub partitions: usize,
}

/// Read-only view of a runtime's status, usable from other tasks.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    status: watch::Receiver<RuntimeStatus>,
}

impl RuntimeHandle {
    pub fn status(&self) -> RuntimeStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> RuntimeState {
        self.status.borrow().state
    }

    pub fn epoch(&self) -> u64 {
        self.status.borrow().epoch
    }

    /// Waits until the current run has its first assignment and returns the
    /// epoch of that subscription. Returns `None` if the runtime was dropped.
    pub async fn ready(&self) -> Option<u64> {
        let mut status = self.status.clone();
        status
            .wait_for(|status| status.ready)
            .await
            .ok()
            .map(|status| status.epoch)
    }

    /// Waits until the runtime reaches `state`.
    pub async fn wait_for_state(&self, state: RuntimeState) -> Option<RuntimeStatus> {
        let mut status = self.status.clone();
        status
            .wait_for(|status| status.state == state)
            .await
            .ok()
            .map(|status| *status)
    }
}

enum SessionEnd {
    Revoked,
    Shutdown,
}

/// Drives a consumer group subscription and feeds every message to a handler.
///
/// Each claimed partition is processed sequentially in its own task; claims
/// run in parallel. A handler error is logged and the offset still advances.
/// Join errors are retried after a backoff until shutdown.
pub struct ConsumerRuntime {
    name: String,
    topic: String,
    group: Arc<dyn ConsumerGroup>,
    handler: Arc<dyn MessageHandler>,
    retry_backoff: Duration,
    status: watch::Sender<RuntimeStatus>,
    running: AtomicBool,
}

impl ConsumerRuntime {
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        group: Arc<dyn ConsumerGroup>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (status, _) = watch::channel(RuntimeStatus {
            state: RuntimeState::Created,
            epoch: 0,
            ready: false,
            partitions: 0,
        });

        Self {
            name: name.into(),
            topic: topic.into(),
            group,
            handler,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            status,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> RuntimeState {
        self.status.borrow().state
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            status: self.status.subscribe(),
        }
    }

    /// Consumes until `shutdown` fires, then leaves the group.
    ///
    /// Returns the error from closing the group, if any. A closed runtime may
    /// be run again.
    #[tracing::instrument(
        skip_all,
        fields(runtime = %self.name, topic = %self.topic, group_id = %self.group.group_id())
    )]
    pub async fn run(&self, shutdown: Shutdown) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConsumerError::AlreadyRunning);
        }

        let result = self.run_until_shutdown(shutdown).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_until_shutdown(&self, mut shutdown: Shutdown) -> Result<()> {
        self.transition(RuntimeState::Subscribing)?;
        self.status.send_modify(|status| status.ready = false);
        tracing::info!("Consumer runtime started");

        while !shutdown.is_triggered() {
            let joined = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                joined = self.group.join(&self.topic) => joined,
            };

            let mut session = match joined {
                Ok(session) => session,
                Err(e) => {
                    metrics::counter!(
                        "consumer_transport_errors_total",
                        "topic" => self.topic.clone(),
                        "operation" => "join"
                    )
                    .increment(1);
                    tracing::warn!(
                        error = %e,
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "Failed to join consumer group, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(self.retry_backoff) => continue,
                    }
                }
            };

            self.transition(RuntimeState::Consuming)?;
            let assigned = session.partitions().len();
            self.status.send_modify(|status| {
                status.epoch += 1;
                status.ready = true;
                status.partitions = assigned;
            });
            if assigned == 0 {
                tracing::warn!(
                    member_id = session.member_id(),
                    "No partitions assigned, member is idle until the next rebalance"
                );
            }
            tracing::info!(
                epoch = self.status.borrow().epoch,
                member_id = session.member_id(),
                generation = session.generation(),
                partitions = ?session.partitions(),
                "Partitions assigned"
            );

            let end = self.consume(&mut session, &mut shutdown).await;

            if let Err(e) = session.release().await {
                metrics::counter!(
                    "consumer_transport_errors_total",
                    "topic" => self.topic.clone(),
                    "operation" => "release"
                )
                .increment(1);
                tracing::warn!(error = %e, "Failed to release session");
            }

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Revoked => {
                    metrics::counter!("consumer_rebalances_total", "topic" => self.topic.clone())
                        .increment(1);
                    tracing::info!("Assignment revoked, rebalancing");
                    self.transition(RuntimeState::Rebalancing)?;
                }
            }
        }

        self.transition(RuntimeState::ShuttingDown)?;
        let closed = self.group.close().await;
        self.transition(RuntimeState::Closed)?;
        self.status.send_modify(|status| {
            status.ready = false;
            status.partitions = 0;
        });

        match closed {
            Ok(()) => {
                tracing::info!("Consumer runtime closed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to close consumer group");
                Err(e.into())
            }
        }
    }

    /// Runs one task per claim until the session is revoked or shutdown
    /// fires, then waits for in-flight messages to finish.
    async fn consume(&self, session: &mut GroupSession, shutdown: &mut Shutdown) -> SessionEnd {
        let mut tasks = JoinSet::new();
        for claim in session.take_claims() {
            tasks.spawn(drive_claim(claim, self.handler.clone(), shutdown.clone()));
        }

        let end = tokio::select! {
            _ = shutdown.wait() => SessionEnd::Shutdown,
            _ = session.revoked() => SessionEnd::Revoked,
        };

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Partition task failed");
            }
        }

        end
    }

    fn transition(&self, next: RuntimeState) -> Result<()> {
        let mut outcome = Ok(());
        self.status.send_if_modified(|status| {
            if !status.state.can_transition_to(next) {
                outcome = Err(ConsumerError::InvalidTransition {
                    from: status.state,
                    to: next,
                });
                return false;
            }
            tracing::debug!(from = %status.state, to = %next, "Runtime state changed");
            status.state = next;
            true
        });
        outcome
    }
}

/// Processes one partition in order until it is revoked or shutdown fires.
/// A message already taken from the claim is always finished.
#[tracing::instrument(
    skip_all,
    fields(topic = %claim.topic(), partition = claim.partition(), generation = claim.generation())
)]
async fn drive_claim(
    mut claim: PartitionClaim,
    handler: Arc<dyn MessageHandler>,
    mut shutdown: Shutdown,
) {
    tracing::debug!("Partition claim started");

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            message = claim.next_message() => match message {
                Some(message) => message,
                None => break,
            },
        };

        process_message(&claim, &handler, message).await;
    }

    tracing::debug!("Partition claim stopped");
}

/// Handles one message on its own task so a panicking handler is contained,
/// then commits the offset whatever the outcome.
async fn process_message(
    claim: &PartitionClaim,
    handler: &Arc<dyn MessageHandler>,
    message: StreamMessage,
) {
    let started = Instant::now();
    let topic = message.topic.clone();
    let offset = message.offset;
    let key = message.key.clone();
    metrics::counter!("consumer_messages_total", "topic" => topic.clone()).increment(1);

    let task = {
        let handler = handler.clone();
        let message = message.clone();
        tokio::spawn(
            async move { handler.handle(&message).await }.instrument(tracing::Span::current()),
        )
    };

    match task.await {
        Ok(Ok(())) => {
            tracing::debug!(offset, key = ?key, "Message processed");
        }
        Ok(Err(e)) => {
            metrics::counter!(
                "consumer_handler_errors_total",
                "topic" => topic.clone(),
                "kind" => e.kind()
            )
            .increment(1);
            tracing::error!(
                error = %e,
                offset,
                key = ?key,
                "Failed to process message, skipping"
            );
        }
        Err(e) => {
            metrics::counter!(
                "consumer_handler_errors_total",
                "topic" => topic.clone(),
                "kind" => "panic"
            )
            .increment(1);
            tracing::error!(
                error = %e,
                offset,
                key = ?key,
                "Message handler panicked, skipping"
            );
        }
    }

    metrics::histogram!("consumer_message_duration_seconds", "topic" => topic.clone())
        .record(started.elapsed().as_secs_f64());

    if let Err(e) = claim.mark_message(&message).await {
        metrics::counter!("consumer_commit_errors_total", "topic" => topic).increment(1);
        tracing::warn!(error = %e, offset, "Failed to commit offset");
    }
}
