//! Registry test utilities

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tagpin::image::error::RegistryError;
use tagpin::image::reference::{Repository, TaggedReference};
use tagpin::image::registry::{DigestResolver, TagLister};
use tagpin::image::resolver::TagSelectedResolver;
use tagpin::image::types::{Origin, ResolvedImage};

/// In-memory registry for testing
///
/// Digests default to a value derived from the tag so every listed tag can be
/// pinned without extra setup.
#[derive(Default)]
pub struct MockRegistry {
    tags: HashMap<String, Vec<String>>,
    digests: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register tags for a repository, keyed by its normalized name
    pub fn with_tags(mut self, repository: &str, tags: Vec<&str>) -> Self {
        let name = Repository::parse(repository)
            .map(|repo| repo.name())
            .unwrap_or_else(|_| repository.to_string());
        self.tags
            .insert(name, tags.into_iter().map(|t| t.to_string()).collect());
        self
    }

    /// Pin a tagged reference to a specific digest
    pub fn with_digest(mut self, image: &str, digest: &str) -> Self {
        self.digests.insert(image.to_string(), digest.to_string());
        self
    }

    /// Tagged references passed to `resolve_digest`, in call order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

/// A well-formed digest derived from the tag bytes
pub fn fake_digest(tag: &str) -> String {
    let hex: String = tag.bytes().map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{:0<64.64}", hex)
}

#[async_trait]
impl TagLister for MockRegistry {
    async fn list_tags(&self, repository: &Repository) -> Result<Vec<String>, RegistryError> {
        self.tags
            .get(&repository.name())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(repository.name()))
    }
}

#[async_trait]
impl DigestResolver for MockRegistry {
    async fn resolve_digest(&self, image: &str) -> Result<ResolvedImage, RegistryError> {
        self.requested.lock().unwrap().push(image.to_string());

        let reference = TaggedReference::parse(image)?;
        let listed = self
            .tags
            .get(&reference.repository().name())
            .is_some_and(|tags| tags.iter().any(|t| t == reference.tag()));
        if !listed {
            return Err(RegistryError::NotFound(image.to_string()));
        }

        let digest = self
            .digests
            .get(image)
            .cloned()
            .unwrap_or_else(|| fake_digest(reference.tag()));

        Ok(ResolvedImage::new(
            format!("{}@{}", reference.repository().name(), digest),
            vec![Origin::Resolved {
                url: image.to_string(),
                tag: reference.tag().to_string(),
            }],
        ))
    }
}

/// Create a resolver backed by one mock registry for both roles
pub fn create_test_resolver(registry: Arc<MockRegistry>) -> TagSelectedResolver {
    TagSelectedResolver::new(registry.clone(), registry)
}
