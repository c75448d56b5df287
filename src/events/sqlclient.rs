//! Name tables for the two SQL client drivers.
//!
//! The classic and modern drivers instrument the same operations but publish
//! them under their own prefixes. The "open after" notification is the one
//! that reveals the connection id for an in-flight open, which is why it
//! maps to [`Phase::Anchor`] rather than a terminal phase; the open itself
//! stays in flight until the close arrives.

use super::{AdapterTable, Kind, Phase};

/// Events published by the classic `System.Data.SqlClient` driver.
pub const CLASSIC: AdapterTable = &[
    (
        "System.Data.SqlClient.WriteConnectionOpenBefore",
        Kind::Connection,
        Phase::Begin,
    ),
    (
        "System.Data.SqlClient.WriteConnectionOpenAfter",
        Kind::Connection,
        Phase::Anchor,
    ),
    (
        "System.Data.SqlClient.WriteConnectionCloseAfter",
        Kind::Connection,
        Phase::Close,
    ),
    (
        "System.Data.SqlClient.WriteCommandBefore",
        Kind::Command,
        Phase::Begin,
    ),
    (
        "System.Data.SqlClient.WriteCommandAfter",
        Kind::Command,
        Phase::End,
    ),
    (
        "System.Data.SqlClient.WriteCommandError",
        Kind::Command,
        Phase::Fail,
    ),
];

/// Events published by the modern `Microsoft.Data.SqlClient` driver.
pub const MODERN: AdapterTable = &[
    (
        "Microsoft.Data.SqlClient.WriteConnectionOpenBefore",
        Kind::Connection,
        Phase::Begin,
    ),
    (
        "Microsoft.Data.SqlClient.WriteConnectionOpenAfter",
        Kind::Connection,
        Phase::Anchor,
    ),
    (
        "Microsoft.Data.SqlClient.WriteConnectionCloseAfter",
        Kind::Connection,
        Phase::Close,
    ),
    (
        "Microsoft.Data.SqlClient.WriteCommandBefore",
        Kind::Command,
        Phase::Begin,
    ),
    (
        "Microsoft.Data.SqlClient.WriteCommandAfter",
        Kind::Command,
        Phase::End,
    ),
    (
        "Microsoft.Data.SqlClient.WriteCommandError",
        Kind::Command,
        Phase::Fail,
    ),
];
