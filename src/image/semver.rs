//! Relaxed version parsing and constraint expressions for registry tags

use std::cmp::Ordering;

use semver::Version;

/// Parse a tag as a version, tolerating common deviations from semver 2.0.0.
///
/// - a single leading `v` is stripped: "v1.2.3" -> 1.2.3
/// - leading zeros are dropped: "1.02.003" -> 1.2.3
/// - missing components are zero-filled: "1" -> 1.0.0, "1.2" -> 1.2.0
///
/// Short versions may not carry prerelease or build metadata ("1.2-rc" is
/// rejected). Returns `None` when the tag is not a version at all.
pub fn parse_relaxed(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let mut parts: Vec<String> = trimmed.splitn(3, '.').map(strip_leading_zeros).collect();

    if parts.len() < 3 {
        if parts.last().is_some_and(|p| p.contains(['-', '+'])) {
            return None;
        }
        parts.resize(3, "0".to_string());
    }

    Version::parse(&parts.join(".")).ok()
}

/// Compare by semver precedence, ignoring build metadata
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

fn strip_leading_zeros(part: &str) -> String {
    if part.len() <= 1 {
        return part.to_string();
    }

    let stripped = part.trim_start_matches('0');
    if stripped.starts_with(|c: char| c.is_ascii_digit()) {
        stripped.to_string()
    } else {
        format!("0{}", stripped)
    }
}

/// A parsed constraint expression
///
/// Alternatives are separated by `||`. Within an alternative, comparators
/// separated by commas or whitespace must all hold: `>=1.0, <2.0 || >=3.0`.
#[derive(Debug, Clone)]
pub struct Constraint {
    alternatives: Vec<Vec<Comparator>>,
}

impl Constraint {
    /// Parse a constraint expression, describing the problem on failure
    pub fn parse(expression: &str) -> Result<Self, String> {
        if expression.trim().is_empty() {
            return Err("empty constraint".to_string());
        }

        let alternatives = expression
            .split("||")
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { alternatives })
    }

    /// Check whether a version satisfies the expression
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|comparators| comparators.iter().all(|c| c.matches(version)))
    }
}

fn parse_alternative(alternative: &str) -> Result<Vec<Comparator>, String> {
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        // An operator written apart from its version, as in ">= 1.0"
        if token.chars().all(|c| "<>=!~^".contains(c)) {
            if let Some(op) = pending_op {
                return Err(format!("operator '{}' has no version", op));
            }
            pending_op = Some(token);
            continue;
        }

        let comparator = match pending_op.take() {
            Some(op) => Comparator::parse(&format!("{}{}", op, token))?,
            None => Comparator::parse(token)?,
        };
        comparators.push(comparator);
    }

    if let Some(op) = pending_op {
        return Err(format!("operator '{}' has no version", op));
    }
    if comparators.is_empty() {
        return Err("empty alternative".to_string());
    }

    Ok(comparators)
}

/// A single comparison against a version
#[derive(Debug, Clone, PartialEq)]
enum Comparator {
    Exact(Version),
    NotEqual(Version),
    Gt(Version),
    Gte(Version),
    Lt(Version),
    Lte(Version),
    /// Inclusive lower bound, exclusive upper bound. Tilde, caret and
    /// wildcard requirements all reduce to this.
    Range { from: Version, until: Version },
    Any,
}

impl Comparator {
    fn parse(token: &str) -> Result<Self, String> {
        const OPERATORS: [&str; 11] = [">=", "=>", "<=", "=<", "!=", "==", ">", "<", "=", "!", "~"];

        if let Some(rest) = token.strip_prefix('^') {
            let version = parse_bound(rest)?;
            let until = caret_upper_bound(&version).ok_or_else(|| out_of_range(token))?;
            return Ok(Comparator::Range {
                from: version,
                until,
            });
        }

        for op in OPERATORS {
            let Some(rest) = token.strip_prefix(op) else {
                continue;
            };
            // "~>" is the Ruby-style spelling of tilde
            let rest = if op == "~" {
                rest.strip_prefix('>').unwrap_or(rest)
            } else {
                rest
            };
            let version = parse_bound(rest)?;

            return Ok(match op {
                ">=" | "=>" => Comparator::Gte(version),
                "<=" | "=<" => Comparator::Lte(version),
                "!=" | "!" => Comparator::NotEqual(version),
                "==" | "=" => Comparator::Exact(version),
                ">" => Comparator::Gt(version),
                "<" => Comparator::Lt(version),
                _ => {
                    let minor = version.minor.checked_add(1).ok_or_else(|| out_of_range(token))?;
                    let until = Version::new(version.major, minor, 0);
                    Comparator::Range {
                        from: version,
                        until,
                    }
                }
            });
        }

        if let Some(wildcard) = parse_wildcard(token)? {
            return Ok(wildcard);
        }

        if token.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return parse_bound(token).map(Comparator::Exact);
        }

        Err(format!("unknown operator in '{}'", token))
    }

    fn matches(&self, version: &Version) -> bool {
        let cmp = |bound: &Version| cmp_precedence(version, bound);

        match self {
            Comparator::Exact(v) => cmp(v).is_eq(),
            Comparator::NotEqual(v) => cmp(v).is_ne(),
            Comparator::Gt(v) => cmp(v).is_gt(),
            Comparator::Gte(v) => cmp(v).is_ge(),
            Comparator::Lt(v) => cmp(v).is_lt(),
            Comparator::Lte(v) => cmp(v).is_le(),
            Comparator::Range { from, until } => cmp(from).is_ge() && cmp(until).is_lt(),
            Comparator::Any => true,
        }
    }
}

fn parse_bound(text: &str) -> Result<Version, String> {
    parse_relaxed(text).ok_or_else(|| format!("'{}' is not a valid version", text))
}

/// ^1.2.3 -> <2.0.0, ^0.2.3 -> <0.3.0, ^0.0.3 -> <0.0.4
fn caret_upper_bound(version: &Version) -> Option<Version> {
    if version.major > 0 {
        Some(Version::new(version.major.checked_add(1)?, 0, 0))
    } else if version.minor > 0 {
        Some(Version::new(0, version.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, version.patch.checked_add(1)?))
    }
}

fn out_of_range(token: &str) -> String {
    format!("'{}' is out of range", token)
}

/// Parse `*`, `x`, `1.x`, `1.*`, `1.2.x`, `1.2.*`
fn parse_wildcard(token: &str) -> Result<Option<Comparator>, String> {
    let is_wild = |part: &str| matches!(part, "*" | "x" | "X");
    let number = |part: &str| {
        part.parse::<u64>()
            .map_err(|_| format!("'{}' is not a valid version", token))
    };

    let parts: Vec<&str> = token.split('.').collect();
    let comparator = match parts.as_slice() {
        [all] if is_wild(all) => Comparator::Any,
        [major, rest @ ..] if !rest.is_empty() && rest.iter().all(|p| is_wild(p)) => {
            let major = number(major)?;
            Comparator::Range {
                from: Version::new(major, 0, 0),
                until: Version::new(
                    major.checked_add(1).ok_or_else(|| out_of_range(token))?,
                    0,
                    0,
                ),
            }
        }
        [major, minor, patch] if is_wild(patch) => {
            let (major, minor) = (number(major)?, number(minor)?);
            Comparator::Range {
                from: Version::new(major, minor, 0),
                until: Version::new(
                    major,
                    minor.checked_add(1).ok_or_else(|| out_of_range(token))?,
                    0,
                ),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(comparator))
}
