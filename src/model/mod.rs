use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use uuid::Uuid;

/// Uniquely identifies a span created by the tracer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub fn generate() -> Self {
        let mut span_id = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut span_id);
        SpanId(span_id)
    }

    pub fn serialize_std(&self) -> String {
        hex::encode(self.0)
    }

    pub fn parse_std(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let span_id: [u8; 8] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(SpanId(span_id))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_std())
    }
}

/// Opaque identifier minted by an instrumentation provider for one
/// occurrence of a begin/end (or begin/fail) event pair.
///
/// Unique per occurrence and never reused while the operation is in flight.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct OperationId(pub Uuid);

/// Opaque identifier naming a logical database connection.
///
/// Stable across multiple open/close cycles of the same underlying
/// connection. Not known when a connection-open begins; it is only revealed
/// by a later notification carrying the same [`OperationId`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(pub Uuid);

#[derive(Debug, thiserror::Error)]
#[error("invalid correlation identifier: {0}")]
pub struct InvalidId(#[from] uuid::Error);

impl FromStr for OperationId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OperationId(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ConnectionId(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal status a span is finished with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpanStatus {
    Ok,
    InternalError,
}
