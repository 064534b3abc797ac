//! Streaming types.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// One fragment of a bot response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialResponse {
    pub text: String,
    #[serde(default)]
    pub is_suggested_reply: bool,
}

impl PartialResponse {
    /// A normal streamed fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_suggested_reply: false,
        }
    }

    /// A fragment the client should offer as a suggested follow-up.
    pub fn suggested_reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_suggested_reply: true,
        }
    }
}

/// Lazy, single-pass sequence of text fragments produced by a model adapter.
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

/// Lazy, single-pass sequence of fragments produced by a bot for one request.
///
/// The stream ends right after the first `Err` item.
pub type ResponseStream = BoxStream<'static, Result<PartialResponse, BackendError>>;
