//! Optimistic concurrency via weak versioned ETags
//!
//! Every user data instance carries `(version, updated)`; the pair is
//! exposed as the weak validator `W/"<version>-<updated>"`. If-Match
//! handling on update/delete:
//!
//! - missing header: unconditional, allowed
//! - `*`: existence check only
//! - weak validator: must equal the current pair exactly
//!
//! A mismatch on either field, a strong validator, a digits-only value or
//! any malformed syntax all collapse into the single
//! [`PreconditionFailed`] outcome; callers never see which part failed.

use std::fmt;

use thiserror::Error;

/// The single failure outcome for If-Match checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("If-Match precondition failed")]
pub struct PreconditionFailed;

/// A weak entity validator: the `(version, updated)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Etag {
    /// Monotonic per-instance counter, starts at 1
    pub version: u64,
    /// Millisecond timestamp of the last successful write
    pub updated: i64,
}

impl Etag {
    pub fn new(version: u64, updated: i64) -> Self {
        Self { version, updated }
    }

    /// Parse the weak form `W/"<version>-<updated>"`.
    ///
    /// Strong validators, unquoted values and non-numeric parts are all
    /// rejected the same way.
    pub fn parse_weak(s: &str) -> Result<Self, PreconditionFailed> {
        let inner = s
            .strip_prefix("W/\"")
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or(PreconditionFailed)?;
        let (version, updated) = inner.split_once('-').ok_or(PreconditionFailed)?;
        if version.is_empty() || updated.is_empty() {
            return Err(PreconditionFailed);
        }
        let version = version.parse::<u64>().map_err(|_| PreconditionFailed)?;
        let updated = updated.parse::<i64>().map_err(|_| PreconditionFailed)?;
        Ok(Self { version, updated })
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W/\"{}-{}\"", self.version, self.updated)
    }
}

/// Parsed If-Match header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfMatch {
    /// Header absent: the operation runs unconditionally
    Unconditional,
    /// `*`: any current representation matches
    Any,
    /// Weak validator that must match exactly
    Weak(Etag),
}

impl IfMatch {
    /// Parse an optional If-Match header value
    pub fn parse(header: Option<&str>) -> Result<Self, PreconditionFailed> {
        match header {
            None => Ok(IfMatch::Unconditional),
            Some("*") => Ok(IfMatch::Any),
            Some(value) => Etag::parse_weak(value).map(IfMatch::Weak),
        }
    }

    /// Check this condition against the current validator
    pub fn check(&self, current: Etag) -> Result<(), PreconditionFailed> {
        match self {
            IfMatch::Unconditional | IfMatch::Any => Ok(()),
            IfMatch::Weak(expected) => {
                if *expected == current {
                    Ok(())
                } else {
                    Err(PreconditionFailed)
                }
            }
        }
    }
}

/// Parse and check an If-Match header in one step
pub fn check_if_match(header: Option<&str>, current: Etag) -> Result<(), PreconditionFailed> {
    IfMatch::parse(header)?.check(current)
}
