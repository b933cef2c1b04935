// src/models/verification.rs
//! Verification results for credentials and presentations.
//!
//! Records are derived state: they name their subject but hold no
//! reference to it, and a newer record for the same subject replaces the
//! older one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of object is being verified.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Credential,
    Presentation,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Credential => f.write_str("credential"),
            SubjectKind::Presentation => f.write_str("presentation"),
        }
    }
}

impl FromStr for SubjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credential" | "vc" => Ok(SubjectKind::Credential),
            "presentation" | "vp" => Ok(SubjectKind::Presentation),
            other => Err(format!("unknown subject kind {other:?}")),
        }
    }
}

/// Key of the per-subject verification state machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectKey {
    pub kind: SubjectKind,
    pub name: String,
}

impl SubjectKey {
    pub fn new(kind: SubjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.name)
    }
}

/// Terminal outcome of a verify call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Valid,
    /// Carries the authority's message, or a local reason such as `timeout`.
    Invalid(String),
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid)
    }
}

/// Result of one verify call against the authority.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub subject_kind: SubjectKind,
    pub subject_name: String,
    pub outcome: Outcome,
    /// Message returned by the authority (or the local failure reason).
    pub message: String,
    /// When the outcome was reached.
    pub timestamp: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn valid(key: &SubjectKey, message: String) -> Self {
        Self::at(key, Outcome::Valid, message)
    }

    pub fn invalid(key: &SubjectKey, reason: String) -> Self {
        Self::at(key, Outcome::Invalid(reason.clone()), reason)
    }

    fn at(key: &SubjectKey, outcome: Outcome, message: String) -> Self {
        Self {
            subject_kind: key.kind,
            subject_name: key.name.clone(),
            outcome,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of a subject's verification state machine.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "record", rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Never verified.
    Idle,
    /// A request is in flight.
    Verifying,
    /// Last finished verification.
    Completed(VerificationRecord),
}

/// Body of a verify request for either subject kind.
#[derive(Serialize, Debug)]
pub enum VerifyRequest<'a> {
    #[serde(rename = "vc")]
    Credential(&'a str),
    #[serde(rename = "vp")]
    Presentation(&'a str),
}

impl<'a> VerifyRequest<'a> {
    pub fn new(kind: SubjectKind, encoded: &'a str) -> Self {
        match kind {
            SubjectKind::Credential => VerifyRequest::Credential(encoded),
            SubjectKind::Presentation => VerifyRequest::Presentation(encoded),
        }
    }
}
