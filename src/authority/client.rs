// src/authority/client.rs
//! HTTP client for the credential authority.
//!
//! The authority signs and verifies credentials and presentations; this
//! client only moves opaque tokens back and forth. Every call:
//! - is bounded by the configured timeout (send and body read together)
//! - reads the full body before looking at the status code
//! - surfaces the authority's `message` verbatim on failure, falling back
//!   to a fixed message when the body carries none
//!
//! | Operation             | Endpoint            |
//! |-----------------------|---------------------|
//! | List credentials      | `GET /credentials`  |
//! | Issue credential      | `POST /credentials` |
//! | Verify credential     | `POST /verify`      |
//! | Generate presentation | `POST /generate-vp` |
//! | Verify presentation   | `POST /verify-vp`   |

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::credential::{CredentialRecord, IssueRequest};
use crate::models::presentation::{GenerateRequest, GenerateResponse};
use crate::models::verification::{SubjectKind, VerifyRequest};
use crate::utils::serialization::{deserialize, message_or, serialize};

const ISSUE_FALLBACK: &str = "the authority returned an error that could not be parsed";
const VERIFY_VC_FALLBACK: &str = "verification failed with an unknown error";
const GENERATE_FALLBACK: &str = "presentation generation failed with an unknown error";
const VERIFY_VP_FALLBACK: &str = "presentation verification failed with an unknown error";
const VERIFIED_FALLBACK: &str = "verified";

/// Raw status and body of one exchange.
struct Reply {
    status: StatusCode,
    body: String,
}

/// Authority's answer to a verify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// `true` for a 2xx response.
    pub accepted: bool,
    /// Authority message, or the fallback.
    pub message: String,
}

/// Cloneable handle to the authority; clones share one connection pool.
#[derive(Clone)]
pub struct AuthorityClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    timeout: Duration,
}

impl AuthorityClient {
    /// Creates a client for `base_url` with a per-call `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("vc-portal/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            timeout,
        })
    }

    /// Creates a client from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.authority_base(), settings.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and reads the body, all within the timeout.
    async fn send(&self, request: RequestBuilder) -> Result<Reply> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| Error::Transport(format!("request failed: {e}")))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;
            Ok::<_, Error>(Reply { status, body })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Reply> {
        let url = self.url(path);
        let payload = serialize(body).map_err(|e| Error::Transport(format!("serialization_error: {e}")))?;
        debug!("POST {url}");

        self.send(
            self.client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload),
        )
        .await
        .map_err(|e| {
            warn!("POST {url} failed: {e}");
            e
        })
    }

    /// Fetches every credential the authority holds, in creation order.
    ///
    /// # Errors
    /// [`Error::FetchFailed`] on transport failure, timeout, a non-2xx
    /// status or an unparseable body.
    pub async fn list_credentials(&self) -> Result<Vec<CredentialRecord>> {
        let url = self.url("/credentials");
        debug!("GET {url}");

        let reply = self.send(self.client.get(&url)).await.map_err(reason_as(Error::FetchFailed))?;
        if !reply.status.is_success() {
            return Err(Error::FetchFailed(format!("HTTP error! status: {}", reply.status.as_u16())));
        }

        // an empty table may be encoded as `null`
        let records: Option<Vec<CredentialRecord>> =
            deserialize(&reply.body).map_err(|e| Error::FetchFailed(format!("malformed credential list: {e}")))?;
        Ok(records.unwrap_or_default())
    }

    /// Asks the authority to issue and sign a credential.
    ///
    /// # Errors
    /// [`Error::IssuanceRejected`] carrying the authority's message (or a
    /// transport reason, or `timeout`). A success body without a signed
    /// token is also rejected.
    pub async fn issue_credential(&self, request: &IssueRequest) -> Result<CredentialRecord> {
        let reply = self
            .post_json("/credentials", request)
            .await
            .map_err(reason_as(Error::IssuanceRejected))?;
        if !reply.status.is_success() {
            return Err(Error::IssuanceRejected(message_or(&reply.body, ISSUE_FALLBACK)));
        }

        let record: CredentialRecord = deserialize(&reply.body)
            .map_err(|e| Error::IssuanceRejected(format!("malformed credential record: {e}")))?;
        if record.encoded.is_none() {
            return Err(Error::IssuanceRejected(format!(
                "authority returned credential {:?} without a signed payload",
                record.name
            )));
        }
        Ok(record)
    }

    /// Asks the authority to bundle signed credentials into a presentation.
    ///
    /// # Errors
    /// [`Error::GenerationRejected`] with the authority's message, a
    /// transport reason, or `timeout`.
    pub async fn generate_presentation(&self, vcs: &[String]) -> Result<String> {
        let reply = self
            .post_json("/generate-vp", &GenerateRequest { vcs })
            .await
            .map_err(reason_as(Error::GenerationRejected))?;
        if !reply.status.is_success() {
            return Err(Error::GenerationRejected(message_or(&reply.body, GENERATE_FALLBACK)));
        }

        deserialize::<GenerateResponse>(&reply.body)
            .ok()
            .and_then(|r| r.vp)
            .filter(|vp| !vp.is_empty())
            .ok_or_else(|| Error::GenerationRejected(message_or(&reply.body, GENERATE_FALLBACK)))
    }

    /// Submits a signed credential or presentation for verification.
    ///
    /// Any HTTP response, success or not, yields a [`Verdict`].
    ///
    /// # Errors
    /// [`Error::Transport`] or [`Error::Timeout`] when no response arrived.
    pub async fn verify(&self, kind: SubjectKind, encoded: &str) -> Result<Verdict> {
        let (path, fallback) = match kind {
            SubjectKind::Credential => ("/verify", VERIFY_VC_FALLBACK),
            SubjectKind::Presentation => ("/verify-vp", VERIFY_VP_FALLBACK),
        };
        let reply = self.post_json(path, &VerifyRequest::new(kind, encoded)).await?;

        if reply.status.is_success() {
            Ok(Verdict {
                accepted: true,
                message: message_or(&reply.body, VERIFIED_FALLBACK),
            })
        } else {
            Ok(Verdict {
                accepted: false,
                message: message_or(&reply.body, fallback),
            })
        }
    }
}

/// Re-labels a transport error as an operation-specific rejection.
fn reason_as(wrap: fn(String) -> Error) -> impl Fn(Error) -> Error {
    move |err| match err {
        Error::Timeout => wrap("timeout".to_string()),
        Error::Transport(reason) => wrap(reason),
        other => other,
    }
}
