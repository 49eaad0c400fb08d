//! Typed multiplicity for remote resource lookups
//!
//! Scans over remote collections (rules, target groups, balancers) must
//! distinguish "absent", "exactly one", and "several" instead of silently
//! taking the first match.

use thiserror::Error;

/// Outcome of resolving a resource that is expected to be unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    NotFound,
    One(T),
    Ambiguous(Vec<T>),
}

/// A lookup that did not resolve to exactly one resource
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{what} '{key}' not found")]
    NotFound { what: &'static str, key: String },

    #[error("{what} '{key}' matched {count} resources, expected exactly one")]
    Ambiguous {
        what: &'static str,
        key: String,
        count: usize,
    },
}

impl<T> Lookup<T> {
    /// Classify an iterator of matches.
    pub fn from_matches<I: IntoIterator<Item = T>>(matches: I) -> Self {
        let mut iter = matches.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Lookup::NotFound,
            (Some(only), None) => Lookup::One(only),
            (Some(first), Some(second)) => {
                let mut all = vec![first, second];
                all.extend(iter);
                Lookup::Ambiguous(all)
            }
        }
    }

    /// Require exactly one match, converting the other arms into errors.
    pub fn exactly_one(self, what: &'static str, key: &str) -> Result<T, LookupError> {
        match self {
            Lookup::One(value) => Ok(value),
            Lookup::NotFound => Err(LookupError::NotFound {
                what,
                key: key.to_string(),
            }),
            Lookup::Ambiguous(all) => Err(LookupError::Ambiguous {
                what,
                key: key.to_string(),
                count: all.len(),
            }),
        }
    }
}

/// Lift an `Option` into a lookup error for resources resolved by name.
pub fn require<T>(found: Option<T>, what: &'static str, key: &str) -> Result<T, LookupError> {
    found.ok_or_else(|| LookupError::NotFound {
        what,
        key: key.to_string(),
    })
}
