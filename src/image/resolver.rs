//! Tag-selected image resolution
//!
//! Turns an untagged repository reference plus a [`VersionSelection`] into a
//! digest-pinned reference: validate, list tags, select one, pin it.

use std::sync::Arc;

use tracing::debug;

use crate::image::error::ResolveError;
use crate::image::policy::VersionSelection;
use crate::image::reference::Repository;
use crate::image::registry::{DigestResolver, TagLister};
use crate::image::selectors::TagSelector;
use crate::image::types::ResolvedImage;

/// Resolves repository references by selecting a tag according to a policy
///
/// Holds no state between calls; concurrent `resolve` calls are safe as long
/// as the collaborators are.
pub struct TagSelectedResolver {
    tag_lister: Arc<dyn TagLister>,
    digest_resolver: Arc<dyn DigestResolver>,
}

impl TagSelectedResolver {
    pub fn new(tag_lister: Arc<dyn TagLister>, digest_resolver: Arc<dyn DigestResolver>) -> Self {
        Self {
            tag_lister,
            digest_resolver,
        }
    }

    /// Select a tag for `reference` and pin it to a digest
    ///
    /// # Arguments
    /// * `reference` - Repository reference without tag or digest, e.g. "ghcr.io/org/app"
    /// * `selection` - The policy picking the tag
    ///
    /// # Returns
    /// The pinned URL and provenance exactly as returned by the digest resolver
    pub async fn resolve(
        &self,
        reference: &str,
        selection: &VersionSelection,
    ) -> Result<ResolvedImage, ResolveError> {
        let repository =
            Repository::parse(reference).map_err(|source| ResolveError::InvalidReference {
                reference: reference.to_string(),
                source,
            })?;

        let tags = self
            .tag_lister
            .list_tags(&repository)
            .await
            .map_err(|source| ResolveError::RegistryList {
                repository: repository.clone(),
                source,
            })?;

        debug!("Listed {} tags for {}", tags.len(), repository);

        let tag = selection
            .select(&tags)
            .map_err(|source| ResolveError::Selection {
                repository: repository.clone(),
                source,
            })?;

        let tagged = format!("{}:{}", reference, tag);
        debug!("Selected {} for {}", tagged, repository);

        self.digest_resolver
            .resolve_digest(&tagged)
            .await
            .map_err(|source| ResolveError::Digest {
                reference: tagged,
                source,
            })
    }
}
