//! Read-only access to loosely-typed diagnostic payloads.
//!
//! Instrumentation providers publish anonymous payload objects whose shape
//! is known only by convention, and some of them misbehave when a field is
//! touched. Every lookup here is panic-isolated: a payload can never take
//! down the caller, it can only come back as absent.

use std::panic::{catch_unwind, AssertUnwindSafe};

use uuid::Uuid;

/// A loosely-typed event payload, navigable one property at a time.
pub trait DynamicPayload {
    /// Resolves a single property by name.
    fn property(&self, name: &str) -> Option<&dyn DynamicPayload>;

    /// Renders this value as text. `None` for null-ish values.
    fn to_text(&self) -> Option<String>;
}

/// Looks up a string field at a dotted path, e.g. `"Command.CommandText"`.
///
/// Each segment is resolved against the payload's dynamic shape; a missing
/// or null link short-circuits to `None`. Lookups are O(segments) and retain
/// no state.
pub fn get_string(payload: &dyn DynamicPayload, path: &str) -> Option<String> {
    isolated(payload, path, |payload| {
        let mut current = payload;
        for segment in path.split('.') {
            current = current.property(segment)?;
        }
        current.to_text()
    })
}

/// Renders the payload itself as text, with the same panic isolation as
/// [`get_string`].
pub fn render(payload: &dyn DynamicPayload) -> Option<String> {
    isolated(payload, "<root>", |payload| payload.to_text())
}

/// Looks up a field and parses it as a UUID.
pub fn get_uuid(payload: &dyn DynamicPayload, path: &str) -> Option<Uuid> {
    get_string(payload, path).and_then(|s| Uuid::parse_str(&s).ok())
}

/// Looks up a field and parses it as an integer.
pub fn get_int(payload: &dyn DynamicPayload, path: &str) -> Option<i64> {
    get_string(payload, path).and_then(|s| s.parse().ok())
}

fn isolated<F>(payload: &dyn DynamicPayload, path: &str, f: F) -> Option<String>
where
    F: FnOnce(&dyn DynamicPayload) -> Option<String>,
{
    match catch_unwind(AssertUnwindSafe(|| f(payload))) {
        Ok(value) => value,
        Err(_) => {
            log::debug!("payload lookup for {path} panicked; treating field as absent");
            None
        }
    }
}

impl DynamicPayload for serde_json::Value {
    fn property(&self, name: &str) -> Option<&dyn DynamicPayload> {
        match self {
            serde_json::Value::Object(map) => map.get(name).map(|v| v as &dyn DynamicPayload),
            _ => None,
        }
    }

    /// Only scalar leaves render as text; objects and arrays do not.
    fn to_text(&self) -> Option<String> {
        match self {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => None,
        }
    }
}

impl DynamicPayload for String {
    fn property(&self, _name: &str) -> Option<&dyn DynamicPayload> {
        None
    }

    fn to_text(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl DynamicPayload for str {
    fn property(&self, _name: &str) -> Option<&dyn DynamicPayload> {
        None
    }

    fn to_text(&self) -> Option<String> {
        Some(self.to_string())
    }
}
