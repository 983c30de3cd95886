//! Repository and tagged image references
//!
//! A repository reference is `[registry/]path` with no tag or digest. When the
//! registry host is omitted the reference points at Docker Hub, and
//! single-component Docker Hub paths live under `library/`:
//!
//! - `alpine` -> `index.docker.io/library/alpine`
//! - `docker.io/bitnami/redis` -> `index.docker.io/bitnami/redis`
//! - `ghcr.io/org/app` -> `ghcr.io/org/app`
//! - `localhost:5000/app` -> `localhost:5000/app`

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::image::error::ReferenceError;

/// Registry host used when a reference names none
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Namespace for official Docker Hub images
const DOCKER_HUB_LIBRARY: &str = "library";

/// Maximum length of a repository path
const MAX_PATH_LEN: usize = 255;

static REGISTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*|\[[0-9a-fA-F:]+\])(?::[0-9]+)?$",
    )
    .expect("registry pattern is valid")
});

static PATH_COMPONENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("path pattern is valid")
});

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").expect("tag pattern is valid")
});

/// A validated repository reference without tag or digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    registry: String,
    path: String,
}

impl Repository {
    /// Parse and validate a repository reference
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if reference.contains('@') {
            return Err(ReferenceError::UnexpectedDigest(reference.to_string()));
        }

        let (registry, path) = split_registry(reference);
        if path.contains(':') {
            return Err(ReferenceError::UnexpectedTag(reference.to_string()));
        }

        let registry = match registry {
            "docker.io" => DEFAULT_REGISTRY,
            other => other,
        };
        if !REGISTRY_PATTERN.is_match(registry) {
            return Err(ReferenceError::InvalidRegistry(registry.to_string()));
        }

        let path = if registry == DEFAULT_REGISTRY && !path.contains('/') {
            format!("{}/{}", DOCKER_HUB_LIBRARY, path)
        } else {
            path.to_string()
        };
        validate_path(&path)?;

        Ok(Self {
            registry: registry.to_string(),
            path,
        })
    }

    /// Registry host, including port if any
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path within the registry
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fully-qualified name, `registry/path`
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Repository {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.path)
    }
}

/// A repository reference carrying a tag, as handed to digest resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedReference {
    repository: Repository,
    tag: String,
}

impl TaggedReference {
    /// Parse `repository:tag`
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        if reference.contains('@') {
            return Err(ReferenceError::UnexpectedDigest(reference.to_string()));
        }

        // The tag separator is the last ':' that comes after every '/'
        let last_slash = reference.rfind('/').map_or(0, |i| i + 1);
        let Some(colon) = reference[last_slash..].rfind(':').map(|i| i + last_slash) else {
            return Err(ReferenceError::MissingTag(reference.to_string()));
        };

        let tag = &reference[colon + 1..];
        if !TAG_PATTERN.is_match(tag) {
            return Err(ReferenceError::InvalidTag(tag.to_string()));
        }

        Ok(Self {
            repository: Repository::parse(&reference[..colon])?,
            tag: tag.to_string(),
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for TaggedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Split off the registry host if the first component looks like one
fn split_registry(reference: &str) -> (&str, &str) {
    match reference.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first, rest)
        }
        _ => (DEFAULT_REGISTRY, reference),
    }
}

fn validate_path(path: &str) -> Result<(), ReferenceError> {
    let valid = (2..=MAX_PATH_LEN).contains(&path.len())
        && path
            .split('/')
            .all(|component| PATH_COMPONENT_PATTERN.is_match(component));

    if valid {
        Ok(())
    } else {
        Err(ReferenceError::InvalidRepository(path.to_string()))
    }
}
