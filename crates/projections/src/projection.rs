//! Core projection trait and catalog dispatch.

use async_trait::async_trait;
use event_stream::{EventEnvelope, EventFamily};

use crate::Result;

/// A projection that applies one family of events to a read model.
///
/// Implementations match on the family's variants; adding an event type to
/// the catalog is a compile error here until it is handled.
#[async_trait]
pub trait Projection: Send + Sync {
    /// The closed set of events this projection consumes.
    type Event: EventFamily;

    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Applies a single decoded event.
    async fn apply(&self, event: Self::Event) -> Result<()>;
}

/// Decodes `envelope` through the projection's catalog and applies it.
///
/// An unknown type tag yields `UnknownEventType` before anything is read
/// or written.
pub async fn dispatch<P>(envelope: &EventEnvelope, projection: &P) -> Result<()>
where
    P: Projection + ?Sized,
{
    let event = P::Event::from_envelope(envelope)?;
    let event_type = event.event_type();

    projection.apply(event).await?;

    metrics::counter!(
        "projection_events_applied_total",
        "projection" => projection.name(),
        "event_type" => event_type
    )
    .increment(1);
    Ok(())
}
