//! Tag selectors, one per selection strategy

mod regex;
mod semver;

pub use self::regex::select_regex;
pub use self::semver::select_semver;

use crate::image::error::SelectionError;
use crate::image::policy::VersionSelection;

/// Picks exactly one tag out of an unordered tag list
///
/// Implementations are pure: the same tags, in any order, give the same
/// result.
pub trait TagSelector {
    fn select(&self, tags: &[String]) -> Result<String, SelectionError>;
}

impl TagSelector for VersionSelection {
    fn select(&self, tags: &[String]) -> Result<String, SelectionError> {
        match self {
            VersionSelection::Semver(selection) => selection.select(tags),
            VersionSelection::Regex(selection) => selection.select(tags),
        }
    }
}
