//! Message handlers: the seam between a partition claim and the read side.

use async_trait::async_trait;
use event_stream::StreamMessage;
use projections::Projection;

use crate::Result;

/// Processes one raw stream message.
///
/// Errors are reported to the runtime, which logs them and still advances
/// the partition offset.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &StreamMessage) -> Result<()>;
}

/// Decodes messages as event envelopes and dispatches them to a projection.
pub struct ProjectionHandler<P> {
    projection: P,
}

impl<P: Projection> ProjectionHandler<P> {
    pub fn new(projection: P) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }
}

#[async_trait]
impl<P: Projection> MessageHandler for ProjectionHandler<P> {
    async fn handle(&self, message: &StreamMessage) -> Result<()> {
        let envelope = event_stream::decode(&message.payload)?;

        tracing::debug!(
            projection = self.projection.name(),
            event_type = %envelope.event_type,
            aggregate_id = %envelope.aggregate_id,
            event_id = %envelope.event_id,
            "Dispatching event"
        );

        projections::dispatch(&envelope, &self.projection).await?;
        Ok(())
    }
}
