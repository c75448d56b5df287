//! In-memory tracer for tests.
//!
//! Records every span with enough detail for tests to assert on parentage,
//! status, attributes, and exactly-once finishing. The ambient span is a
//! single settable value rather than a real thread/task-local stack; tests
//! substitute whatever fixed value they need.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{SpanHandle, Tracer};
use crate::model::{SpanId, SpanStatus};

/// A span recorded by [`MockTracer`].
#[derive(Debug)]
pub struct SpanRecord {
    pub id: SpanId,
    pub operation: String,
    pub started: DateTime<Utc>,
    description: Mutex<Option<String>>,
    parent: RwLock<Option<SpanHandle>>,
    attributes: DashMap<String, serde_json::Value>,
    status: Mutex<Option<SpanStatus>>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
    finish_count: AtomicU32,
}

impl SpanRecord {
    fn new(id: SpanId, operation: &str, description: Option<&str>, parent: Option<SpanHandle>) -> Self {
        Self {
            id,
            operation: operation.to_string(),
            started: Utc::now(),
            description: Mutex::new(description.map(str::to_string)),
            parent: RwLock::new(parent),
            attributes: DashMap::new(),
            status: Mutex::new(None),
            finished_at: Mutex::new(None),
            finish_count: AtomicU32::new(0),
        }
    }

    pub fn parent(&self) -> Option<SpanHandle> {
        *self.parent.read().expect("span parent lock poisoned")
    }

    pub fn description(&self) -> Option<String> {
        self.description
            .lock()
            .expect("span description lock poisoned")
            .clone()
    }

    pub fn status(&self) -> Option<SpanStatus> {
        *self.status.lock().expect("span status lock poisoned")
    }

    pub fn is_finished(&self) -> bool {
        self.finish_count.load(Ordering::Acquire) > 0
    }

    /// How many times `finish` was called on this span. The engine
    /// guarantees this never exceeds one.
    pub fn finish_count(&self) -> u32 {
        self.finish_count.load(Ordering::Acquire)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        *self
            .finished_at
            .lock()
            .expect("span finished_at lock poisoned")
    }

    pub fn attribute(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.get(key).map(|v| v.value().clone())
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

/// An in-memory [`Tracer`] implementation.
#[derive(Default)]
pub struct MockTracer {
    spans: DashMap<SpanId, Arc<SpanRecord>>,
    order: Mutex<Vec<SpanId>>,
    current: RwLock<Option<SpanHandle>>,
    /// Calls into any trait method, including ones that resolved to no-ops.
    calls: AtomicUsize,
}

impl MockTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer with a root span installed as the ambient current
    /// span, mimicking an active transaction.
    pub fn with_root(operation: &str) -> (Self, SpanHandle) {
        let tracer = Self::new();
        let root = tracer.record_span(operation, None, None);
        tracer.set_current(Some(root));
        (tracer, root)
    }

    /// Substitutes the ambient span returned by `current_span`.
    pub fn set_current(&self, span: Option<SpanHandle>) {
        *self.current.write().expect("current span lock poisoned") = span;
    }

    pub fn span(&self, handle: SpanHandle) -> Option<Arc<SpanRecord>> {
        self.spans.get(&handle.0).map(|s| s.value().clone())
    }

    /// All recorded spans in creation order.
    pub fn spans(&self) -> Vec<Arc<SpanRecord>> {
        let order = self.order.lock().expect("span order lock poisoned");
        order
            .iter()
            .filter_map(|id| self.spans.get(id).map(|s| s.value().clone()))
            .collect()
    }

    pub fn spans_with_operation(&self, operation: &str) -> Vec<Arc<SpanRecord>> {
        self.spans()
            .into_iter()
            .filter(|s| s.operation == operation)
            .collect()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Total number of trait-method invocations observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    fn record_span(
        &self,
        operation: &str,
        description: Option<&str>,
        parent: Option<SpanHandle>,
    ) -> SpanHandle {
        let id = SpanId::generate();
        let record = Arc::new(SpanRecord::new(id, operation, description, parent));
        self.spans.insert(id, record);
        self.order.lock().expect("span order lock poisoned").push(id);
        SpanHandle(id)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::AcqRel);
    }
}

impl Tracer for MockTracer {
    fn current_span(&self) -> Option<SpanHandle> {
        self.touch();
        *self.current.read().expect("current span lock poisoned")
    }

    fn start_child(
        &self,
        parent: SpanHandle,
        operation: &str,
        description: Option<&str>,
    ) -> SpanHandle {
        self.touch();
        self.record_span(operation, description, Some(parent))
    }

    // Parent rewrites apply to finished spans too: a connection anchor can
    // arrive after a command on it has already finished, and the command's
    // reported parent must still become the connection span.
    fn set_parent(&self, span: SpanHandle, parent: SpanHandle) {
        self.touch();
        if let Some(record) = self.spans.get(&span.0) {
            *record.parent.write().expect("span parent lock poisoned") = Some(parent);
        }
    }

    fn set_description(&self, span: SpanHandle, description: &str) {
        self.touch();
        if let Some(record) = self.spans.get(&span.0) {
            *record
                .description
                .lock()
                .expect("span description lock poisoned") = Some(description.to_string());
        }
    }

    fn finish(&self, span: SpanHandle, status: SpanStatus) {
        self.touch();
        if let Some(record) = self.spans.get(&span.0) {
            // Only the first finish records a status; later ones are counted
            // so tests can detect double-finishing.
            if record.finish_count.fetch_add(1, Ordering::AcqRel) == 0 {
                *record.status.lock().expect("span status lock poisoned") = Some(status);
                *record
                    .finished_at
                    .lock()
                    .expect("span finished_at lock poisoned") = Some(Utc::now());
            }
        }
    }

    fn set_attribute(&self, span: SpanHandle, key: &str, value: serde_json::Value) {
        self.touch();
        if let Some(record) = self.spans.get(&span.0) {
            record.attributes.insert(key.to_string(), value);
        }
    }

    fn get_attribute(&self, span: SpanHandle, key: &str) -> Option<serde_json::Value> {
        self.touch();
        self.spans
            .get(&span.0)
            .and_then(|record| record.attribute(key))
    }
}
