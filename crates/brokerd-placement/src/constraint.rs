//! Placement constraints.
//!
//! A constraint restricts the value an offer may carry for one attribute
//! (or for the hostname). Constraints are built from a short textual form:
//!
//! | Text             | Matches when                                              |
//! |------------------|-----------------------------------------------------------|
//! | `*`              | always                                                    |
//! | `v`              | value equals `v`                                          |
//! | `a\|b`           | value is one of the listed values                         |
//! | `like:<re>`      | value fully matches the regex                             |
//! | `unlike:<re>`    | value does not fully match the regex                      |
//! | `unique`         | no sibling broker holds the value                         |
//! | `cluster[:v]`    | value equals `v`, or equals what siblings already hold    |
//! | `groupBy[:n]`    | value keeps sibling brokers spread over `n` groups        |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

/// Errors produced while parsing a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid groupBy count: {0:?}")]
    InvalidGroupBy(String),
}

#[derive(Debug, Clone)]
pub enum Constraint {
    Unconstrained,
    Equals(String),
    OneOf(Vec<String>),
    /// Full-string regex match, inverted when `negated`.
    Pattern {
        source: String,
        regex: Regex,
        negated: bool,
    },
    /// The value must not already be held by a sibling broker.
    Unique,
    /// All brokers share one value: the given one, or the first one claimed.
    Cluster(Option<String>),
    /// Spread brokers evenly across at least this many distinct values.
    GroupBy(usize),
}

impl Constraint {
    /// Build a pattern constraint. The regex must match the whole value.
    pub fn pattern(source: &str, negated: bool) -> Result<Self, ConstraintError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            ConstraintError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Constraint::Pattern {
            source: source.to_string(),
            regex,
            negated,
        })
    }

    /// Evaluate the constraint.
    ///
    /// `value` is the offer's value for the attribute, `claimed` the values
    /// sibling brokers already hold for it. Only `Unique`, `Cluster` and
    /// `GroupBy` look at `claimed`.
    pub fn matches(&self, value: Option<&str>, claimed: &[String]) -> bool {
        let Some(value) = value else {
            return matches!(self, Constraint::Unconstrained);
        };

        match self {
            Constraint::Unconstrained => true,
            Constraint::Equals(expected) => value == expected,
            Constraint::OneOf(values) => values.iter().any(|v| v == value),
            Constraint::Pattern { regex, negated, .. } => regex.is_match(value) != *negated,
            Constraint::Unique => !claimed.iter().any(|c| c == value),
            Constraint::Cluster(Some(expected)) => value == expected,
            Constraint::Cluster(None) => claimed.first().is_none_or(|c| c == value),
            Constraint::GroupBy(groups) => group_by_matches(value, claimed, *groups),
        }
    }
}

/// Until `groups` distinct values are in use, only a new value is accepted.
/// After that, only values held by the fewest siblings are accepted.
fn group_by_matches(value: &str, claimed: &[String], groups: usize) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in claimed {
        *counts.entry(c.as_str()).or_default() += 1;
    }

    if counts.len() < groups {
        return !counts.contains_key(value);
    }

    let min = counts.values().copied().min().unwrap_or(0);
    counts.get(value).is_some_and(|&n| n == min)
}

impl FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "*" {
            return Ok(Constraint::Unconstrained);
        }
        if let Some(source) = s.strip_prefix("like:") {
            return Constraint::pattern(source, false);
        }
        if let Some(source) = s.strip_prefix("unlike:") {
            return Constraint::pattern(source, true);
        }
        if s == "unique" {
            return Ok(Constraint::Unique);
        }
        if s == "cluster" {
            return Ok(Constraint::Cluster(None));
        }
        if let Some(value) = s.strip_prefix("cluster:") {
            return Ok(Constraint::Cluster(Some(value.to_string())));
        }
        if s == "groupBy" {
            return Ok(Constraint::GroupBy(1));
        }
        if let Some(count) = s.strip_prefix("groupBy:") {
            return match count.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Constraint::GroupBy(n)),
                _ => Err(ConstraintError::InvalidGroupBy(count.to_string())),
            };
        }
        if s.contains('|') {
            return Ok(Constraint::OneOf(s.split('|').map(str::to_string).collect()));
        }
        Ok(Constraint::Equals(s.to_string()))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unconstrained => f.write_str("*"),
            Constraint::Equals(value) => f.write_str(value),
            Constraint::OneOf(values) => f.write_str(&values.join("|")),
            Constraint::Pattern {
                source, negated, ..
            } => {
                let prefix = if *negated { "unlike" } else { "like" };
                write!(f, "{prefix}:{source}")
            }
            Constraint::Unique => f.write_str("unique"),
            Constraint::Cluster(None) => f.write_str("cluster"),
            Constraint::Cluster(Some(value)) => write!(f, "cluster:{value}"),
            Constraint::GroupBy(1) => f.write_str("groupBy"),
            Constraint::GroupBy(n) => write!(f, "groupBy:{n}"),
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Constraint {}
