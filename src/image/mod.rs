//! Tag selection and digest pinning for container images
//!
//! This module picks one tag from the tags a registry reports for a
//! repository, according to a [`policy::VersionSelection`], and pins the
//! result to a content digest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Reference  │────▶│  Resolver   │────▶│  TagLister  │
//! │ (validate)  │     │(orchestrate)│     │   (list)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │       │
//!                        ▼       ▼
//!             ┌───────────────┐ ┌──────────────┐
//!             │   Selectors   │ │DigestResolver│
//!             │(semver, regex)│ │    (pin)     │
//!             └───────────────┘ └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`policy`]: The version selection policy, one strategy per policy
//! - [`reference`]: Repository and tagged reference validation
//! - [`selectors`]: Semver and regex tag selectors
//! - [`semver`]: Relaxed version parsing and constraint expressions
//! - [`registry`]: Collaborator traits for listing tags and resolving digests
//! - [`registries`]: OCI distribution API implementation of the collaborators
//! - [`resolver`]: Ties the pieces together
//! - [`error`]: Error types
//! - [`types`]: Resolved image and provenance types

pub mod error;
pub mod policy;
pub mod reference;
pub mod registries;
pub mod registry;
pub mod resolver;
pub mod selectors;
pub mod semver;
pub mod types;
