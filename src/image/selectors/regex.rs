//! Regex tag selector

use regex::Regex;

use crate::image::error::SelectionError;
use crate::image::policy::RegexSelection;
use crate::image::selectors::TagSelector;

/// Select the highest tag matching `pattern`.
///
/// The pattern is unanchored: it only has to match somewhere in the tag.
/// "Highest" is plain byte-wise string order, not numeric order, so for
/// `v1`, `v2` and `v10` the result is `v2`, and `3.13.9` wins over
/// `3.13.12`. Callers relying on numeric order should anchor and zero-pad
/// their tags or select by semver instead.
pub fn select_regex(tags: &[String], pattern: &str) -> Result<String, SelectionError> {
    let regex = Regex::new(pattern).map_err(|source| SelectionError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    tags.iter()
        .filter(|tag| regex.is_match(tag))
        .max()
        .cloned()
        .ok_or_else(|| SelectionError::NoMatchingTags {
            pattern: pattern.to_string(),
        })
}

impl TagSelector for RegexSelection {
    fn select(&self, tags: &[String]) -> Result<String, SelectionError> {
        select_regex(tags, &self.pattern)
    }
}
