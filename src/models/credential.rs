// src/models/credential.rs
//! Verifiable Credential data model as seen by the front end.
//!
//! The signed credential itself is opaque here: the authority returns it as
//! an encoded token and this crate only stores and forwards it. What the
//! front end does track is whether a record is confirmed, i.e. whether the
//! authority has handed back that token yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::serialization::empty_as_none;

/// Signed payload of a credential or presentation.
///
/// Only a [`Payload::Confirmed`] value may be selected, verified or bundled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "encoded", rename_all = "snake_case")]
pub enum Payload {
    /// The authority has not produced a signed token for this record.
    Pending,
    /// Signed token returned by the authority.
    Confirmed(String),
}

impl Payload {
    /// Wraps an optional token, mapping absence to [`Payload::Pending`].
    pub fn from_encoded(encoded: Option<String>) -> Self {
        match encoded {
            Some(token) => Payload::Confirmed(token),
            None => Payload::Pending,
        }
    }

    /// The signed token, if confirmed.
    pub fn encoded(&self) -> Option<&str> {
        match self {
            Payload::Confirmed(token) => Some(token),
            Payload::Pending => None,
        }
    }

    /// `true` once the authority has returned a token.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Payload::Confirmed(_))
    }
}

/// Validity window stamped by the authority at issuance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    /// Start of validity
    pub start: DateTime<Utc>,
    /// End of validity
    pub end: DateTime<Utc>,
}

/// One issued credential, keyed by its case-sensitive `name`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Unique identifier; the primary key of the store.
    pub name: String,

    /// Free-text claim asserted about the holder.
    pub claim: String,

    /// Holder the credential was issued to.
    pub holder: String,

    /// Issuer identifier (a DID) assigned by the authority.
    pub issuer: String,

    /// Validity window.
    pub validity: Validity,

    /// Signed credential token, or pending.
    pub payload: Payload,
}

impl Credential {
    /// Signed token, if the credential is confirmed.
    pub fn encoded(&self) -> Option<&str> {
        self.payload.encoded()
    }

    /// `true` once the authority has returned the signed token.
    pub fn is_confirmed(&self) -> bool {
        self.payload.is_confirmed()
    }
}

/// Credential record as exchanged with the authority.
///
/// Field names follow the authority's storage model; bookkeeping fields
/// such as `ID` or `CreatedAt` are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    #[serde(rename = "Credential_Name", alias = "name")]
    pub name: String,

    #[serde(rename = "Claim", alias = "claim")]
    pub claim: String,

    #[serde(rename = "Holder", alias = "holder")]
    pub holder: String,

    #[serde(rename = "Issuer", alias = "issuer")]
    pub issuer: String,

    #[serde(rename = "Start_Time", alias = "start")]
    pub start: DateTime<Utc>,

    #[serde(rename = "End_Time", alias = "end")]
    pub end: DateTime<Utc>,

    #[serde(rename = "VC", alias = "encoded", default, deserialize_with = "empty_as_none")]
    pub encoded: Option<String>,
}

impl From<CredentialRecord> for Credential {
    fn from(record: CredentialRecord) -> Self {
        Credential {
            name: record.name,
            claim: record.claim,
            holder: record.holder,
            issuer: record.issuer,
            validity: Validity {
                start: record.start,
                end: record.end,
            },
            payload: Payload::from_encoded(record.encoded),
        }
    }
}

/// Body of an issuance request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    #[serde(rename = "credential_name")]
    pub name: String,
    pub claim: String,
    pub holder: String,
}

impl IssueRequest {
    /// Builds a request from raw form input, trimming every field.
    pub fn new(name: &str, claim: &str, holder: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            claim: claim.trim().to_string(),
            holder: holder.trim().to_string(),
        }
    }

    /// Name of the first blank field, if any.
    pub fn blank_field(&self) -> Option<&'static str> {
        [("name", &self.name), ("claim", &self.claim), ("holder", &self.holder)]
            .into_iter()
            .find(|(_, value)| value.is_empty())
            .map(|(field, _)| field)
    }
}
