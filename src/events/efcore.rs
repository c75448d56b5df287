//! Name table for the ORM's query-compilation instrumentation.
//!
//! Query compilation has no connection attached; its spans are keyed by
//! operation id alone and finish with the same pending discipline as
//! commands.

use super::{AdapterTable, Kind, Phase};

/// Query-compilation events. The two begin names cover different major
/// versions of the ORM, which renamed the event.
pub const QUERY_COMPILER: AdapterTable = &[
    (
        "Microsoft.EntityFrameworkCore.Query.QueryCompilationStarting",
        Kind::QueryCompiler,
        Phase::Begin,
    ),
    (
        "Microsoft.EntityFrameworkCore.Query.QueryModelCompiling",
        Kind::QueryCompiler,
        Phase::Begin,
    ),
    (
        "Microsoft.EntityFrameworkCore.Query.QueryExecutionPlanned",
        Kind::QueryCompiler,
        Phase::End,
    ),
];
