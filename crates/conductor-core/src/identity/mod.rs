//! Typed identifiers for jobs, attempts, and containers.
//!
//! The cluster manager addresses everything it launches with textual
//! identifiers, and the controller receives its own identity on the command
//! line in that form. The grammar is stable across releases because recovery
//! depends on attempt N reading staging paths derived by attempt N-1:
//!
//! ```text
//! job_<cluster>_<seq>                        job_1317529182569_0004
//! attempt_<cluster>_<seq>_<ordinal>          attempt_1317529182569_0004_000002
//! container_<cluster>_<seq>_<ordinal>_<idx>  container_1317529182569_0004_000002_000001
//! ```
//!
//! `<cluster>` is the cluster manager's start timestamp, which scopes the
//! sequence numbers it allocates. Parsing is strict: a malformed identifier
//! is rejected before recovery runs rather than producing a staging path
//! that silently never matches a prior attempt's.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing identifier strings from the launch context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The identifier did not start with the expected prefix.
    #[error("expected '{expected}' prefix in identifier: '{value}'")]
    WrongPrefix {
        /// Prefix the parser was looking for.
        expected: &'static str,
        /// The full input string.
        value: String,
    },

    /// The identifier had the wrong number of `_`-separated fields.
    #[error("expected {expected} fields in identifier, found {found}: '{value}'")]
    WrongFieldCount {
        /// Number of fields the grammar requires.
        expected: usize,
        /// Number of fields present.
        found: usize,
        /// The full input string.
        value: String,
    },

    /// A numeric field could not be parsed.
    #[error("non-numeric field '{field}' in identifier: '{value}'")]
    BadField {
        /// The offending field text.
        field: String,
        /// The full input string.
        value: String,
    },

    /// Attempt ordinals start at 1; zero means the launch context is corrupt.
    #[error("attempt ordinal must be >= 1: '{value}'")]
    ZeroOrdinal {
        /// The full input string.
        value: String,
    },
}

fn numeric_field<T: FromStr>(field: &str, value: &str) -> Result<T, IdentityError> {
    field.parse().map_err(|_| IdentityError::BadField {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn split_fields<'a>(
    value: &'a str,
    prefix: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, IdentityError> {
    let rest = value
        .strip_prefix(prefix)
        .ok_or_else(|| IdentityError::WrongPrefix {
            expected: prefix,
            value: value.to_string(),
        })?;
    let fields: Vec<&str> = rest.split('_').collect();
    if fields.len() != expected {
        return Err(IdentityError::WrongFieldCount {
            expected,
            found: fields.len(),
            value: value.to_string(),
        });
    }
    Ok(fields)
}

/// Identity of a job, stable across all of its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    /// Cluster manager start timestamp scoping the sequence number.
    pub cluster_timestamp: u64,
    /// Sequence number allocated by the cluster manager.
    pub sequence: u32,
}

impl JobId {
    /// Create a job id from its raw parts.
    #[must_use]
    pub const fn new(cluster_timestamp: u64, sequence: u32) -> Self {
        Self {
            cluster_timestamp,
            sequence,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job_{}_{:04}", self.cluster_timestamp, self.sequence)
    }
}

impl FromStr for JobId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(s, "job_", 2)?;
        Ok(Self {
            cluster_timestamp: numeric_field(fields[0], s)?,
            sequence: numeric_field(fields[1], s)?,
        })
    }
}

/// Identity of one attempt of a job.
///
/// The ordinal starts at 1 for the first attempt and increases by one each
/// time the cluster manager launches a fresh controller for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId {
    /// The job this attempt belongs to.
    pub job: JobId,
    /// 1-based attempt ordinal.
    pub ordinal: u32,
}

impl AttemptId {
    /// Create an attempt id. `ordinal` must be >= 1; the parser enforces
    /// this for textual input and callers constructing ids directly are
    /// expected to hold the same invariant.
    #[must_use]
    pub const fn new(job: JobId, ordinal: u32) -> Self {
        Self { job, ordinal }
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt_{}_{:04}_{:06}",
            self.job.cluster_timestamp, self.job.sequence, self.ordinal
        )
    }
}

impl FromStr for AttemptId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(s, "attempt_", 3)?;
        let ordinal: u32 = numeric_field(fields[2], s)?;
        if ordinal == 0 {
            return Err(IdentityError::ZeroOrdinal {
                value: s.to_string(),
            });
        }
        Ok(Self {
            job: JobId {
                cluster_timestamp: numeric_field(fields[0], s)?,
                sequence: numeric_field(fields[1], s)?,
            },
            ordinal,
        })
    }
}

/// Identity of the container the controller itself runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId {
    /// The attempt the container was allocated to.
    pub attempt: AttemptId,
    /// Container index within the attempt.
    pub index: u64,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container_{}_{:04}_{:06}_{:06}",
            self.attempt.job.cluster_timestamp,
            self.attempt.job.sequence,
            self.attempt.ordinal,
            self.index
        )
    }
}

impl FromStr for ContainerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(s, "container_", 4)?;
        let ordinal: u32 = numeric_field(fields[2], s)?;
        if ordinal == 0 {
            return Err(IdentityError::ZeroOrdinal {
                value: s.to_string(),
            });
        }
        Ok(Self {
            attempt: AttemptId {
                job: JobId {
                    cluster_timestamp: numeric_field(fields[0], s)?,
                    sequence: numeric_field(fields[1], s)?,
                },
                ordinal,
            },
            index: numeric_field(fields[3], s)?,
        })
    }
}
