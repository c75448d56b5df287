//! The tracing surface consumed from the host SDK.
//!
//! The correlation engine creates, mutates, and finishes spans exclusively
//! through [`Tracer`]. The host SDK supplies the real implementation;
//! [`mock::MockTracer`] is an in-memory one for tests.

use crate::model::{SpanId, SpanStatus};

pub mod mock;

/// Handle to a span owned by the host tracer.
///
/// Handles stay valid after the span finishes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct SpanHandle(pub SpanId);

/// The span operations the correlation engine needs from the host SDK.
///
/// Implementations must be safe to call concurrently from many threads; the
/// engine does no locking of its own around these calls. A span's parent is
/// mutable until the span finishes, because correlation information can
/// arrive after the span was created (see the engine's reparenting step).
pub trait Tracer: Send + Sync {
    /// The ambient span for the calling thread or task, if any.
    fn current_span(&self) -> Option<SpanHandle>;

    /// Starts a child span under `parent`.
    fn start_child(
        &self,
        parent: SpanHandle,
        operation: &str,
        description: Option<&str>,
    ) -> SpanHandle;

    /// Rewrites a span's parent. Must take effect even if the span has
    /// already finished: correlation information can arrive after the fact,
    /// and the reported parent has to reflect it.
    fn set_parent(&self, span: SpanHandle, parent: SpanHandle);

    /// Sets or replaces a span's description.
    fn set_description(&self, span: SpanHandle, description: &str);

    /// Finishes a span with a terminal status, transferring ownership of it
    /// back to the tracer's ambient transaction. Finishing an already
    /// finished span is a no-op.
    fn finish(&self, span: SpanHandle, status: SpanStatus);

    /// Stores a value in the span's extra-attribute bag.
    fn set_attribute(&self, span: SpanHandle, key: &str, value: serde_json::Value);

    /// Reads a value from the span's extra-attribute bag.
    fn get_attribute(&self, span: SpanHandle, key: &str) -> Option<serde_json::Value>;
}
