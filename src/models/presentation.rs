// src/models/presentation.rs
//! Verifiable Presentation model: a named bundle of credentials.
//!
//! A presentation refers to its credentials by name only. Payloads are
//! resolved from the credential store at submission time and never copied
//! into the presentation.

use serde::{Deserialize, Serialize};

use crate::models::credential::Payload;

/// A named, immutable bundle of credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    /// Unique among presentations; independent of credential names.
    pub name: String,

    /// Bundled credential names in selection order, without duplicates.
    pub included_credential_names: Vec<String>,

    /// Signed presentation token.
    pub payload: Payload,
}

impl Presentation {
    /// Signed token, if confirmed.
    pub fn encoded(&self) -> Option<&str> {
        self.payload.encoded()
    }
}

/// Body of a presentation generation request.
#[derive(Serialize, Debug)]
pub struct GenerateRequest<'a> {
    pub vcs: &'a [String],
}

/// Success body of a presentation generation request.
#[derive(Deserialize, Debug)]
pub struct GenerateResponse {
    #[serde(default)]
    pub vp: Option<String>,
}
