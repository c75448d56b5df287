//! Correlates database diagnostic events into distributed-tracing spans.
//!
//! Instrumented database drivers publish loosely-typed notifications on a
//! process-wide diagnostic bus: connection opens and closes, command
//! executions and failures. The notifications arrive concurrently, on
//! whatever thread the driver happens to be running, and out of order with
//! respect to the identifiers needed to link them. This crate reconstructs
//! a causally-correct span tree from that stream and reports the finished
//! spans to the host SDK's tracer.
//!
//! The entry point is [`correlate::Correlator::on_event`], which is safe to
//! invoke with arbitrary event names and payloads: unrecognized events are
//! ignored without side effects, and nothing below it can panic into the
//! instrumented application.

pub mod correlate;
pub mod events;
pub mod model;
pub mod payload;
pub mod tracer;

pub use correlate::{Config, Correlator};
