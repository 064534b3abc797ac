//! Generation settings.

use bon::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Parameters forwarded to a backend with every completion request.
#[derive(Debug, Clone, Copy, Builder, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    /// Upper bound on generated tokens (`max_tokens` / `num_predict`).
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
