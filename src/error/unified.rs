//! Machine-readable error classification.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad error kind, reported in structured log fields and in the
/// `error_type` of transport error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    AuthenticationFailed,
    InvalidRequest,
    StreamInterrupted,
    Configuration,
    Internal,
}
