use serde::{Deserialize, Serialize};

/// Provenance of a pinned image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// The reference was pinned from a tag
    Resolved {
        /// The `repository:tag` reference that was resolved
        url: String,
        tag: String,
    },
}

/// A digest-pinned image reference and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    /// `registry/path@algorithm:hex`
    pub url: String,
    pub origins: Vec<Origin>,
}

impl ResolvedImage {
    pub fn new(url: impl Into<String>, origins: Vec<Origin>) -> Self {
        Self {
            url: url.into(),
            origins,
        }
    }
}
