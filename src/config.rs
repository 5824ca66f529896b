//! Pipeline configuration
//!
//! Provides the knobs that shape normalization and display flattening:
//! - Result duplication policy for decoded nodes with several results
//! - Price lookup key prefix for metadata requests
//!
//! Per-transaction inputs (hash, block timestamp) travel with each
//! `DecodeRequest` instead.

use serde::{Deserialize, Serialize};

/// Configuration shared by the normalization and display stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// When a decoded node yields several results, attach the full set of
    /// descendant records under every result record (`true`) or only under
    /// the first one (`false`)
    pub duplicate_descendants_across_results: bool,
    /// Chain prefix for price lookup keys, e.g. `"ethereum"`
    pub price_key_prefix: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            duplicate_descendants_across_results: true,
            price_key_prefix: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result duplication policy
    ///
    /// # Returns
    /// * `Self` - Returns self for method chaining
    pub fn with_duplicate_descendants(mut self, duplicate: bool) -> Self {
        self.duplicate_descendants_across_results = duplicate;
        self
    }

    pub fn with_price_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.price_key_prefix = Some(prefix.into());
        self
    }
}
