//! Correlates database diagnostic events into a span tree.
//!
//! Events arrive concurrently on whatever threads the drivers happen to run,
//! and out of order with respect to the identifiers that link them: a
//! connection's id is only revealed after its open has begun, and a command
//! can begin before the id of the connection it runs on has been revealed.
//! The engine keeps three small concurrent tables and corrects span
//! parentage after the fact when the missing identifier arrives.
//!
//! Nothing in here may crash the host application. Unknown events and stale
//! identifiers are no-ops, malformed payloads degrade to missing fields, and
//! the outermost entry point swallows panics.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;

use crate::events::{self, Kind, Phase};
use crate::model::{ConnectionId, OperationId, SpanStatus};
use crate::payload::{self, DynamicPayload};
use crate::tracer::{SpanHandle, Tracer};


/// Operation tag for connection spans.
pub const DB_CONNECTION_OP: &str = "db.connection";
/// Operation tag for command spans.
pub const DB_QUERY_OP: &str = "db.query";
/// Operation tag for query-compilation spans.
pub const DB_QUERY_COMPILER_OP: &str = "db.query_compiler";

/// Attribute key under which a span records its connection id.
pub const CONNECTION_ID_KEY: &str = "db.connection_id";
/// Attribute key under which a span records the operation id that minted it.
pub const OPERATION_ID_KEY: &str = "db.operation_id";

const OPERATION_ID_FIELD: &str = "OperationId";
const CONNECTION_ID_FIELD: &str = "ConnectionId";
const COMMAND_TEXT_FIELD: &str = "Command.CommandText";

/// Per-category span emission switches.
///
/// Disabling a category skips both the span and its correlation bookkeeping:
/// no pending entry is created, so the category's terminal events degrade to
/// no-ops and the other category is unaffected. With connection spans off,
/// commands parent to the ambient span. Query-compilation spans have no
/// switch of their own and are always emitted.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub connection_spans: bool,
    pub command_spans: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_spans: true,
            command_spans: true,
        }
    }
}

/// Bookkeeping for a started-but-not-yet-finished operation.
struct Pending {
    kind: Kind,
    span: SpanHandle,
}

/// The correlation engine.
///
/// One instance is attached to the diagnostic bus and invoked synchronously
/// on the delivering thread, which may be many distinct threads at once. All
/// shared state lives in the three maps below; there is no global lock and
/// no blocking.
pub struct Correlator {
    tracer: Arc<dyn Tracer>,
    config: Config,
    /// In-flight operations, keyed by the provider's per-occurrence id.
    pending_ops: DashMap<OperationId, Pending>,
    /// The currently-open connection span per connection id.
    anchors: DashMap<ConnectionId, SpanHandle>,
    /// Command spans that began before their connection was anchored.
    unanchored: DashMap<ConnectionId, Vec<SpanHandle>>,
}

impl Correlator {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self::with_config(tracer, Config::default())
    }

    pub fn with_config(tracer: Arc<dyn Tracer>, config: Config) -> Self {
        Self {
            tracer,
            config,
            pending_ops: DashMap::new(),
            anchors: DashMap::new(),
            unanchored: DashMap::new(),
        }
    }

    /// Entry point for the diagnostic bus.
    ///
    /// Safe to call with arbitrary names and payloads: unrecognized events
    /// return before touching any state, and a failure anywhere below is
    /// caught here so it can never propagate into the instrumented
    /// application.
    pub fn on_event(&self, name: &str, payload: &dyn DynamicPayload) {
        let Some((kind, phase)) = events::classify(name) else {
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.process(kind, phase, payload)));
        if outcome.is_err() {
            log::error!("failed to correlate diagnostic event {name}");
        }
    }

    /// Number of operations still waiting for their terminal event. An
    /// operation whose end never arrives stays here; that is a bounded leak,
    /// not an error.
    pub fn pending_operations(&self) -> usize {
        self.pending_ops.len()
    }

    /// Number of connections with a live, un-closed connection span.
    pub fn anchored_connections(&self) -> usize {
        self.anchors.len()
    }

    fn process(&self, kind: Kind, phase: Phase, payload: &dyn DynamicPayload) {
        match (kind, phase) {
            (Kind::Connection, Phase::Begin) => self.connection_begin(payload),
            (Kind::Connection, Phase::Anchor) => self.connection_anchor(payload),
            (Kind::Connection, Phase::Close) => self.connection_close(payload),
            (Kind::Command, Phase::Begin) => self.command_begin(payload),
            (Kind::Command, Phase::End) => self.command_end(payload, SpanStatus::Ok),
            (Kind::Command, Phase::Fail) => self.command_end(payload, SpanStatus::InternalError),
            (Kind::QueryCompiler, Phase::Begin) => self.compile_begin(payload),
            (Kind::QueryCompiler, Phase::End) => self.compile_end(payload),
            // No adapter table produces the remaining combinations.
            _ => {}
        }
    }

    fn connection_begin(&self, payload: &dyn DynamicPayload) {
        if !self.config.connection_spans {
            return;
        }
        let Some(op_id) = operation_id(payload) else {
            return;
        };
        // No ambient transaction means no tracing for this operation at all.
        let Some(parent) = self.tracer.current_span() else {
            return;
        };

        let span = self.tracer.start_child(parent, DB_CONNECTION_OP, None);
        self.tracer
            .set_attribute(span, OPERATION_ID_KEY, op_id.to_string().into());
        self.pending_ops.insert(
            op_id,
            Pending {
                kind: Kind::Connection,
                span,
            },
        );
    }

    fn connection_anchor(&self, payload: &dyn DynamicPayload) {
        let (Some(op_id), Some(conn_id)) = (operation_id(payload), connection_id(payload)) else {
            return;
        };
        // Late, duplicate, or never-begun opens have no pending entry.
        let Some((_, pending)) = self
            .pending_ops
            .remove_if(&op_id, |_, p| p.kind == Kind::Connection)
        else {
            log::debug!("connection anchor for unknown operation {op_id}");
            return;
        };

        let span = pending.span;
        self.tracer
            .set_attribute(span, CONNECTION_ID_KEY, conn_id.to_string().into());

        // Anchoring over a live anchor means the driver closed a connection
        // without a close notification; last write wins.
        if self.anchors.insert(conn_id, span).is_some() {
            log::warn!("connection {conn_id} re-anchored while a previous span was still open");
        }
        self.reparent_unanchored(conn_id, span);
    }

    fn connection_close(&self, payload: &dyn DynamicPayload) {
        // Close events are matched by connection id: the close notification
        // carries a fresh operation id unrelated to the one that opened it.
        let Some(conn_id) = connection_id(payload) else {
            return;
        };
        // The connection's cycle is over; commands still waiting for an
        // anchor that never came stay on their ambient parent.
        self.unanchored.remove(&conn_id);
        let Some((_, span)) = self.anchors.remove(&conn_id) else {
            log::debug!("connection close for unknown connection {conn_id}");
            return;
        };

        record_connection_statistics(self.tracer.as_ref(), span, payload);
        self.tracer.finish(span, SpanStatus::Ok);
    }

    fn command_begin(&self, payload: &dyn DynamicPayload) {
        if !self.config.command_spans {
            return;
        }
        let (Some(op_id), Some(conn_id)) = (operation_id(payload), connection_id(payload)) else {
            return;
        };

        let anchor = self.anchors.get(&conn_id).map(|s| *s);
        let parent = match anchor {
            Some(anchor) => anchor,
            // The connection span is not anchored yet (or connection spans
            // are disabled); fall back to the ambient span and register for
            // corrective reparenting.
            None => match self.tracer.current_span() {
                Some(ambient) => ambient,
                None => return,
            },
        };

        let span = self.tracer.start_child(parent, DB_QUERY_OP, None);
        self.tracer
            .set_attribute(span, OPERATION_ID_KEY, op_id.to_string().into());
        self.tracer
            .set_attribute(span, CONNECTION_ID_KEY, conn_id.to_string().into());
        self.pending_ops.insert(
            op_id,
            Pending {
                kind: Kind::Command,
                span,
            },
        );

        // With connection spans disabled no anchor will ever arrive, so
        // there is nothing to wait for.
        if anchor.is_none() && self.config.connection_spans {
            self.register_unanchored(conn_id, span);
        }
    }

    fn command_end(&self, payload: &dyn DynamicPayload, status: SpanStatus) {
        let Some(op_id) = operation_id(payload) else {
            return;
        };
        let Some((_, pending)) = self
            .pending_ops
            .remove_if(&op_id, |_, p| p.kind == Kind::Command)
        else {
            log::debug!("command end for unknown operation {op_id}");
            return;
        };

        if let Some(text) = payload::get_string(payload, COMMAND_TEXT_FIELD) {
            self.tracer
                .set_description(pending.span, strip_preamble(&text));
        }
        self.tracer.finish(pending.span, status);
    }

    fn compile_begin(&self, payload: &dyn DynamicPayload) {
        // Compiler spans are their own category; the command switch does not
        // cover them.
        let Some(op_id) = operation_id(payload) else {
            return;
        };
        let Some(parent) = self.tracer.current_span() else {
            return;
        };

        let description = payload::render(payload);
        let description = description.as_deref().map(strip_preamble);
        let span = self
            .tracer
            .start_child(parent, DB_QUERY_COMPILER_OP, description);
        self.tracer
            .set_attribute(span, OPERATION_ID_KEY, op_id.to_string().into());
        self.pending_ops.insert(
            op_id,
            Pending {
                kind: Kind::QueryCompiler,
                span,
            },
        );
    }

    fn compile_end(&self, payload: &dyn DynamicPayload) {
        let Some(op_id) = operation_id(payload) else {
            return;
        };
        let Some((_, pending)) = self
            .pending_ops
            .remove_if(&op_id, |_, p| p.kind == Kind::QueryCompiler)
        else {
            log::debug!("query compilation end for unknown operation {op_id}");
            return;
        };

        self.tracer.finish(pending.span, SpanStatus::Ok);
    }

    /// Registers a command span for corrective reparenting once its
    /// connection anchors.
    ///
    /// The anchor may land between the lookup miss in `command_begin` and
    /// the insert here; re-checking afterwards closes that window. Both
    /// drain paths go through `reparent_unanchored`, which takes the whole
    /// bucket atomically, so a span is reparented by exactly one caller and
    /// none is lost.
    fn register_unanchored(&self, conn_id: ConnectionId, span: SpanHandle) {
        self.unanchored.entry(conn_id).or_default().push(span);

        if let Some(anchor) = self.anchors.get(&conn_id).map(|s| *s) {
            self.reparent_unanchored(conn_id, anchor);
        }
    }

    /// Rewrites the parent of every command span that began before
    /// `conn_id` was anchored.
    fn reparent_unanchored(&self, conn_id: ConnectionId, anchor: SpanHandle) {
        if let Some((_, spans)) = self.unanchored.remove(&conn_id) {
            for span in spans {
                self.tracer.set_parent(span, anchor);
            }
        }
    }
}

fn operation_id(payload: &dyn DynamicPayload) -> Option<OperationId> {
    payload::get_uuid(payload, OPERATION_ID_FIELD).map(OperationId)
}

fn connection_id(payload: &dyn DynamicPayload) -> Option<ConnectionId> {
    payload::get_uuid(payload, CONNECTION_ID_FIELD).map(ConnectionId)
}

/// Drops a provider's diagnostic preamble from a description.
///
/// The ORM prefixes compiled-query text with a marker line such as
/// `Compiling query model:`; the real text follows the first newline.
/// Multi-line SQL without a marker line is left intact.
fn strip_preamble(text: &str) -> &str {
    match text.split_once('\n') {
        Some((first, rest)) if first.trim_end().ends_with(':') => rest,
        _ => text,
    }
}

/// Connection pool statistics some drivers attach to their close events.
fn record_connection_statistics(
    tracer: &dyn Tracer,
    span: SpanHandle,
    payload: &dyn DynamicPayload,
) {
    const STATS: &[(&str, &str)] = &[
        ("Statistics.SelectRows", "rows_sent"),
        ("Statistics.BytesReceived", "bytes_received"),
        ("Statistics.BytesSent", "bytes_sent"),
    ];

    for &(path, key) in STATS {
        if let Some(value) = payload::get_int(payload, path) {
            tracer.set_attribute(span, key, value.into());
        }
    }
}
