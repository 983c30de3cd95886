//! Registry collaborators consumed by the resolver
//!
//! Implementations are shared between concurrent resolutions through `Arc`,
//! so they must be safe to call from several tasks at once. Timeouts and
//! cancellation are theirs to apply.

#[cfg(test)]
use mockall::automock;

use crate::image::error::RegistryError;
use crate::image::reference::Repository;
use crate::image::types::ResolvedImage;

/// Lists the tags of a repository
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait TagLister: Send + Sync {
    /// Fetches every tag visible for the repository
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - All tags, in no particular order
    /// * `Err(RegistryError)` - If the listing fails
    async fn list_tags(&self, repository: &Repository) -> Result<Vec<String>, RegistryError>;
}

/// Pins a tagged reference to a content digest
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DigestResolver: Send + Sync {
    /// Resolves `repository:tag` to a digest reference with provenance
    ///
    /// # Arguments
    /// * `image` - A tagged reference, e.g. "ghcr.io/org/app:1.2.3"
    async fn resolve_digest(&self, image: &str) -> Result<ResolvedImage, RegistryError>;
}
