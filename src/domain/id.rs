//! Hierarchical ID system for projects and takes
//!
//! ID Format:
//! - Project IDs: `p-{7-char-hash}` (e.g., `p-7f2b4c1`)
//! - Take IDs: `{project-id}.{sequence}` (e.g., `p-7f2b4c1.12`)
//!
//! Hash is derived from project name + creation timestamp. The take sequence
//! is a record identity only; it is unrelated to the take number on the slate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid project ID format: expected 'p-{{7-char-hash}}', got '{0}'")]
    InvalidProjectId(String),

    #[error("Invalid take ID format: expected '{{project-id}}.{{sequence}}', got '{0}'")]
    InvalidTakeId(String),

    #[error("Invalid sequence number: {0}")]
    InvalidSequence(String),
}

/// Generates a 7-character hash from a name and timestamp
fn generate_hash(name: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", name, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 7 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Project ID in the format `p-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId {
    hash: String,
}

impl ProjectId {
    /// Creates a new project ID from name and timestamp
    pub fn new(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(name, timestamp),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Creates a take ID in this project with the given sequence number
    pub fn take_id(&self, sequence: u32) -> TakeId {
        TakeId {
            hash: self.hash.clone(),
            sequence,
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}", self.hash)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = s
            .strip_prefix("p-")
            .ok_or_else(|| IdError::InvalidProjectId(s.to_string()))?;

        if !is_valid_hash(hash) {
            return Err(IdError::InvalidProjectId(s.to_string()));
        }

        Ok(Self {
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for ProjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.to_string()
    }
}

/// Take ID - `p-{hash}.{sequence}`
///
/// The project hash prefix ties every take record to its owning project, so a
/// take can be located from its ID alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TakeId {
    hash: String,
    sequence: u32,
}

impl TakeId {
    /// Creates a take ID for a project with a sequence number
    pub fn new(project_id: &ProjectId, sequence: u32) -> Self {
        project_id.take_id(sequence)
    }

    /// Returns the project this take belongs to
    pub fn project_id(&self) -> ProjectId {
        ProjectId {
            hash: self.hash.clone(),
        }
    }

    /// Returns the record sequence within the project
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for TakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}.{}", self.hash, self.sequence)
    }
}

impl FromStr for TakeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rest = s
            .strip_prefix("p-")
            .ok_or_else(|| IdError::InvalidTakeId(s.to_string()))?;

        let (hash, seq) = rest
            .split_once('.')
            .ok_or_else(|| IdError::InvalidTakeId(s.to_string()))?;

        if !is_valid_hash(hash) {
            return Err(IdError::InvalidTakeId(s.to_string()));
        }

        let sequence = seq
            .parse::<u32>()
            .map_err(|_| IdError::InvalidSequence(seq.to_string()))?;

        Ok(Self {
            hash: hash.to_string(),
            sequence,
        })
    }
}

impl TryFrom<String> for TakeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TakeId> for String {
    fn from(id: TakeId) -> Self {
        id.to_string()
    }
}
