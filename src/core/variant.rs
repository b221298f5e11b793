use serde::{Deserialize, Serialize};

use crate::core::types::ZeroBasedSpan;

/// A single variant-call record.
///
/// Coordinates are 0-based half-open: `start = POS - 1`, `end = start + len(REF)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub chromosome: String,

    pub span: ZeroBasedSpan,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "ref")]
    pub reference: String,

    #[serde(rename = "alt")]
    pub alternate: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,

    pub filter: String,

    pub info: String,
}

impl Variant {
    #[must_use]
    pub fn start(&self) -> u64 {
        self.span.start
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.span.end
    }
}
