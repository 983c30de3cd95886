use thiserror::Error;

use crate::image::reference::Repository;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No tags match pattern '{pattern}'")]
    NoMatchingTags { pattern: String },

    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error(
        "No versions match constraints {constraints:?} (prereleases: {prereleases})"
    )]
    NoMatchingVersions {
        constraints: Vec<String>,
        prereleases: bool,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Unknown tag selection strategy: expected one of 'semver' or 'regex'")]
    UnknownSelectionStrategy,

    #[error("Conflicting tag selection strategies: only one of 'semver' or 'regex' may be set")]
    ConflictingSelectionStrategies,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Reference is empty")]
    Empty,

    #[error("Expected a reference without digest: {0}")]
    UnexpectedDigest(String),

    #[error("Expected a reference without tag: {0}")]
    UnexpectedTag(String),

    #[error("Invalid registry host '{0}'")]
    InvalidRegistry(String),

    #[error("Invalid repository path '{0}'")]
    InvalidRepository(String),

    #[error("Expected a tagged reference: {0}")]
    MissingTag(String),

    #[error("Invalid tag '{0}'")]
    InvalidTag(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid repository reference '{reference}': {source}")]
    InvalidReference {
        reference: String,
        #[source]
        source: ReferenceError,
    },

    #[error("Listing tags for '{repository}': {source}")]
    RegistryList {
        repository: Repository,
        #[source]
        source: RegistryError,
    },

    #[error("Selecting tag for '{repository}': {source}")]
    Selection {
        repository: Repository,
        #[source]
        source: SelectionError,
    },

    #[error("Resolving digest for '{reference}': {source}")]
    Digest {
        reference: String,
        #[source]
        source: RegistryError,
    },
}
