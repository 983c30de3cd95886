//! Version selection policy
//!
//! A policy names exactly one strategy for picking a tag. In configuration it
//! is an object with a single `semver` or `regex` key:
//!
//! ```json
//! {"semver": {"constraints": ">=1.0.0 <2.0.0", "prereleases": {"identifiers": ["rc"]}}}
//! {"regex": {"pattern": "^3\\.19\\."}}
//! ```
//!
//! Objects naming neither or both strategies are rejected while deserializing.

use serde::{Deserialize, Serialize};

use crate::image::error::PolicyError;

/// How to pick one tag out of a repository's tag list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawVersionSelection")]
pub enum VersionSelection {
    /// Highest tag by semantic-version precedence
    Semver(SemverSelection),
    /// Lexicographically highest tag matching a pattern
    Regex(RegexSelection),
}

/// Semver strategy settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSemverSelection")]
pub struct SemverSelection {
    /// Whether versions with prerelease metadata are candidates
    pub prereleases: bool,
    /// When non-empty, only prereleases carrying one of these identifiers
    /// (e.g. "rc" in "1.0.0-rc.1") are candidates
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerelease_identifiers: Vec<String>,
    /// Constraint expressions, all of which must hold
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

impl SemverSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_prereleases(mut self, prereleases: bool) -> Self {
        self.prereleases = prereleases;
        self
    }

    pub fn with_prerelease_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.prereleases = true;
        self.prerelease_identifiers.push(identifier.into());
        self
    }
}

/// Regex strategy settings
///
/// The pattern is matched anywhere in a tag, and the winner is the highest
/// match by plain string order, so `v2` beats `v10` and `3.13.9` beats
/// `3.13.12`. Anchor and zero-pad accordingly, or use [`SemverSelection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexSelection {
    pub pattern: String,
}

impl RegexSelection {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl From<SemverSelection> for VersionSelection {
    fn from(selection: SemverSelection) -> Self {
        VersionSelection::Semver(selection)
    }
}

impl From<RegexSelection> for VersionSelection {
    fn from(selection: RegexSelection) -> Self {
        VersionSelection::Regex(selection)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersionSelection {
    semver: Option<SemverSelection>,
    regex: Option<RegexSelection>,
}

impl TryFrom<RawVersionSelection> for VersionSelection {
    type Error = PolicyError;

    fn try_from(raw: RawVersionSelection) -> Result<Self, Self::Error> {
        match (raw.semver, raw.regex) {
            (Some(semver), None) => Ok(VersionSelection::Semver(semver)),
            (None, Some(regex)) => Ok(VersionSelection::Regex(regex)),
            (None, None) => Err(PolicyError::UnknownSelectionStrategy),
            (Some(_), Some(_)) => Err(PolicyError::ConflictingSelectionStrategies),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSemverSelection {
    #[serde(default)]
    prereleases: Option<RawPrereleases>,
    #[serde(default)]
    prerelease_identifiers: Vec<String>,
    #[serde(default)]
    constraints: OneOrMany,
}

/// `prereleases: true` or `prereleases: {identifiers: [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrereleases {
    Enabled(bool),
    Identifiers {
        #[serde(default)]
        identifiers: Vec<String>,
    },
}

#[derive(Default, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl From<RawSemverSelection> for SemverSelection {
    fn from(raw: RawSemverSelection) -> Self {
        let mut prerelease_identifiers = raw.prerelease_identifiers;
        let prereleases = match raw.prereleases {
            None => !prerelease_identifiers.is_empty(),
            Some(RawPrereleases::Enabled(enabled)) => enabled,
            Some(RawPrereleases::Identifiers { identifiers }) => {
                prerelease_identifiers.extend(identifiers);
                true
            }
        };

        let constraints = match raw.constraints {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(constraint) => vec![constraint],
            OneOrMany::Many(constraints) => constraints,
        };

        Self {
            prereleases,
            prerelease_identifiers,
            constraints,
        }
    }
}
