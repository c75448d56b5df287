//! Classifies raw diagnostic event names into the canonical span vocabulary.
//!
//! Each instrumentation provider names semantically identical events
//! differently, so every provider contributes its own static name table and
//! classification is a single merged lookup.

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub mod efcore;
pub mod sqlclient;

/// The semantic category of a diagnostic event.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Kind {
    Connection,
    Command,
    QueryCompiler,
}

/// Where in an operation's lifecycle an event falls.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Phase {
    /// The operation started.
    Begin,
    /// The connection id for an in-flight open was revealed.
    Anchor,
    /// The operation completed successfully.
    End,
    /// The operation completed with an error.
    Fail,
    /// The connection was closed.
    Close,
}

/// One provider's table, mapping its event names to the canonical vocabulary.
pub type AdapterTable = &'static [(&'static str, Kind, Phase)];

static TABLE: Lazy<HashMap<&'static str, (Kind, Phase)>> = Lazy::new(|| {
    let adapters: [AdapterTable; 3] = [
        sqlclient::CLASSIC,
        sqlclient::MODERN,
        efcore::QUERY_COMPILER,
    ];

    let mut table = HashMap::new();
    for adapter in adapters {
        for &(name, kind, phase) in adapter {
            table.insert(name, (kind, phase));
        }
    }
    table
});

/// Maps a raw event name to its canonical classification.
///
/// Unknown names return `None` and must be treated as inert: the engine is
/// attached to a process-wide diagnostic bus and sees plenty of events that
/// are none of its business.
pub fn classify(event_name: &str) -> Option<(Kind, Phase)> {
    TABLE.get(event_name).copied()
}
