//! Semver tag selector

use semver::Version;

use crate::image::error::SelectionError;
use crate::image::policy::SemverSelection;
use crate::image::selectors::TagSelector;
use crate::image::semver::{Constraint, cmp_precedence, parse_relaxed};

/// Select the tag with the highest semantic version.
///
/// Tags that are not versions (`latest`, `edge`, ...) are skipped without
/// error. Constraints are all parsed before any tag is looked at, so an
/// invalid constraint fails even for an empty tag list.
pub fn select_semver(
    tags: &[String],
    selection: &SemverSelection,
) -> Result<String, SelectionError> {
    let constraints = selection
        .constraints
        .iter()
        .map(|expression| {
            Constraint::parse(expression).map_err(|reason| SelectionError::InvalidConstraint {
                constraint: expression.clone(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tags.iter()
        .filter_map(|tag| parse_relaxed(tag).map(|version| (version, tag)))
        .filter(|(version, _)| prerelease_allowed(version, selection))
        .filter(|(version, _)| constraints.iter().all(|c| c.matches(version)))
        // Equal precedence ("v1.0.0", "1.0.0", "1.0.0+b") falls back to
        // string order so the input order never decides.
        .max_by(|(a, a_tag), (b, b_tag)| cmp_precedence(a, b).then_with(|| a_tag.cmp(b_tag)))
        .map(|(_, tag)| tag.clone())
        .ok_or_else(|| SelectionError::NoMatchingVersions {
            constraints: selection.constraints.clone(),
            prereleases: selection.prereleases,
        })
}

fn prerelease_allowed(version: &Version, selection: &SemverSelection) -> bool {
    if version.pre.is_empty() {
        return true;
    }
    if !selection.prereleases {
        return false;
    }
    if selection.prerelease_identifiers.is_empty() {
        return true;
    }

    version
        .pre
        .split('.')
        .filter(|identifier| identifier.parse::<u64>().is_err())
        .any(|identifier| {
            selection
                .prerelease_identifiers
                .iter()
                .any(|allowed| allowed == identifier)
        })
}

impl TagSelector for SemverSelection {
    fn select(&self, tags: &[String]) -> Result<String, SelectionError> {
        select_semver(tags, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn stable() -> SemverSelection {
        SemverSelection::new()
    }

    #[rstest]
    #[case(&["1.0.0", "1.2.0", "1.10.0"], "1.10.0")]
    #[case(&["latest", "1.0.0"], "1.0.0")]
    #[case(&["v1.0.0", "v2.0.0", "v1.5.0"], "v2.0.0")]
    #[case(&["1", "1.1", "1.0.9"], "1.1")]
    #[case(&["3.17.0_rc1", "3.16", "edge"], "3.16")]
    #[case(&["1.0.0+build.1", "1.0.0"], "1.0.0+build.1")]
    fn select_semver_returns_highest_version(#[case] input: &[&str], #[case] expected: &str) {
        assert_eq!(select_semver(&tags(input), &stable()).unwrap(), expected);
    }

    #[rstest]
    #[case(false, "1.0.0")]
    #[case(true, "1.1.0-beta")]
    fn select_semver_filters_prereleases(#[case] prereleases: bool, #[case] expected: &str) {
        let selection = stable().with_prereleases(prereleases);

        assert_eq!(
            select_semver(&tags(&["1.0.0", "1.1.0-beta"]), &selection).unwrap(),
            expected
        );
    }

    #[rstest]
    #[case(&["1.0.0", "1.0.0-rc.1"], "1.0.0")]
    #[case(&["1.0.0-alpha", "1.0.0-alpha.1"], "1.0.0-alpha.1")]
    #[case(&["1.0.0-alpha.beta", "1.0.0-alpha.1"], "1.0.0-alpha.beta")]
    #[case(&["1.0.0-rc.2", "1.0.0-rc.10"], "1.0.0-rc.10")]
    #[case(&["1.0.0-beta.11", "1.0.0-rc.1", "1.0.0-beta"], "1.0.0-rc.1")]
    fn select_semver_follows_prerelease_precedence(
        #[case] input: &[&str],
        #[case] expected: &str,
    ) {
        let selection = stable().with_prereleases(true);

        assert_eq!(select_semver(&tags(input), &selection).unwrap(), expected);
    }

    #[test]
    fn select_semver_keeps_only_listed_prerelease_identifiers() {
        let input = tags(&["1.0.0", "1.1.0-rc.1", "1.2.0-alpha.1", "1.3.0-nightly.20240101"]);
        let selection = stable()
            .with_prerelease_identifier("rc")
            .with_prerelease_identifier("alpha");

        assert_eq!(select_semver(&input, &selection).unwrap(), "1.2.0-alpha.1");
    }

    #[rstest]
    #[case(&[">=2.0.0,<3.0.0"], "2.0.0")]
    #[case(&[">=2.0.0", "<3.0.0"], "2.0.0")]
    #[case(&[">=1.0.0 <3.0.0"], "2.0.0")]
    #[case(&["<2.0.0 || >=3.0.0"], "3.0.0")]
    #[case(&["!=3.0.0"], "2.0.0")]
    fn select_semver_applies_constraints(#[case] constraints: &[&str], #[case] expected: &str) {
        let selection = constraints
            .iter()
            .fold(stable(), |s, c| s.with_constraint(*c));

        assert_eq!(
            select_semver(&tags(&["1.0.0", "2.0.0", "3.0.0"]), &selection).unwrap(),
            expected
        );
    }

    #[rstest]
    #[case("=1.0.0")]
    #[case("<=1.0.0")]
    #[case(">=1.0.0")]
    fn select_semver_ignores_build_metadata_in_constraints(#[case] constraint: &str) {
        let selection = stable().with_constraint(constraint);

        let result = select_semver(&tags(&["1.0.0+build.5", "0.9.0"]), &selection);

        assert_eq!(result.unwrap(), "1.0.0+build.5");
    }

    #[test]
    fn select_semver_breaks_build_metadata_ties_by_tag() {
        let forward = tags(&["1.0.0+build.10", "1.0.0+build.9", "1.0.0"]);
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(select_semver(&forward, &stable()).unwrap(), "1.0.0+build.9");
        assert_eq!(select_semver(&reversed, &stable()).unwrap(), "1.0.0+build.9");
    }

    #[rstest]
    #[case("18446744073709551615.x")]
    #[case("~1.18446744073709551615")]
    #[case("^18446744073709551615")]
    fn select_semver_rejects_out_of_range_constraint(#[case] constraint: &str) {
        let selection = stable().with_constraint(constraint);

        let result = select_semver(&tags(&["1.0.0"]), &selection);

        assert!(matches!(
            result,
            Err(SelectionError::InvalidConstraint { constraint: c, .. }) if c == constraint
        ));
    }

    #[test]
    fn select_semver_fails_when_constraints_exclude_everything() {
        let selection = stable().with_constraint(">=5.0.0");

        let result = select_semver(&tags(&["1.0.0", "2.0.0", "3.0.0"]), &selection);

        assert!(matches!(
            result,
            Err(SelectionError::NoMatchingVersions { constraints, prereleases: false })
                if constraints == vec![">=5.0.0".to_string()]
        ));
    }

    #[rstest]
    #[case(&[])]
    #[case(&["latest", "edge"])]
    #[case(&["1.0.0-rc.1"])]
    fn select_semver_fails_without_candidates(#[case] input: &[&str]) {
        let result = select_semver(&tags(input), &stable());

        assert!(matches!(
            result,
            Err(SelectionError::NoMatchingVersions { .. })
        ));
    }

    #[rstest]
    #[case(&["1.0.0"])]
    #[case(&[])]
    fn select_semver_rejects_invalid_constraint_before_filtering(#[case] input: &[&str]) {
        let selection = stable().with_constraint(">=1.0.0").with_constraint("~>=banana");

        let result = select_semver(&tags(input), &selection);

        assert!(matches!(
            result,
            Err(SelectionError::InvalidConstraint { constraint, .. }) if constraint == "~>=banana"
        ));
    }

    #[test]
    fn select_semver_ignores_input_order() {
        let forward = tags(&["v1.0.0", "1.0.0", "0.9.0", "1.0", "latest"]);
        let mut reversed = forward.clone();
        reversed.reverse();

        let first = select_semver(&forward, &stable()).unwrap();

        // all of "v1.0.0", "1.0.0" and "1.0" are 1.0.0; "v1.0.0" sorts last
        assert_eq!(first, "v1.0.0");
        assert_eq!(select_semver(&forward, &stable()).unwrap(), first);
        assert_eq!(select_semver(&reversed, &stable()).unwrap(), first);
    }

    #[test]
    fn semver_selection_delegates_to_select_semver() {
        let selection = stable().with_constraint("^1");

        assert_eq!(
            selection.select(&tags(&["0.9.0", "1.4.2", "2.0.0"])).unwrap(),
            "1.4.2"
        );
    }
}
