// src/wallet/credential_storage.rs
//! Client-side credential store.
//!
//! Holds the authoritative local view of issued credentials, keyed by name
//! and kept in append order. The view is only ever changed by confirmed
//! authority responses:
//! - a successful issuance appends the returned credential
//! - a successful refresh merges the authority's list into the view
//!
//! No operation removes a credential, so the view grows monotonically. A
//! failed refresh keeps serving the cached view rather than blanking it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::credential::{Credential, IssueRequest};

/// Result of a refresh: the credentials to display plus an optional warning.
#[derive(Serialize, Debug, Clone)]
pub struct CredentialListing {
    pub credentials: Vec<Credential>,
    /// Set when the refresh failed and `credentials` is the cached view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<Error>,
}

#[derive(Default)]
struct StoreState {
    /// Confirmed and pending credentials in append order.
    credentials: Vec<Credential>,
    /// Names of issuance requests currently awaiting the authority.
    in_flight: Vec<String>,
}

impl StoreState {
    fn position(&self, name: &str) -> Option<usize> {
        self.credentials.iter().position(|c| c.name == name)
    }

    /// Inserts or replaces by name; a confirmed entry is never downgraded.
    fn upsert(&mut self, credential: Credential) {
        match self.position(&credential.name) {
            Some(i) if self.credentials[i].is_confirmed() && !credential.is_confirmed() => {}
            Some(i) => self.credentials[i] = credential,
            None => self.credentials.push(credential),
        }
    }
}

/// In-memory credential store backed by the authority.
///
/// All reads return owned snapshots, so a concurrent update can never
/// disturb a caller that is still iterating.
pub struct CredentialStore {
    context: Arc<Context>,
    state: Mutex<StoreState>,
}

impl CredentialStore {
    /// Creates an empty store.
    pub fn new(context: Arc<Context>) -> Self {
        CredentialStore {
            context,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches every credential from the authority and merges it into the
    /// local view.
    ///
    /// The merged view lists the authority's credentials in its creation
    /// order, followed by any locally known credential the authority did not
    /// return. On failure the cached view is returned with
    /// [`Error::FetchFailed`] as a warning; before the first successful load
    /// that view is simply empty.
    pub async fn list_credentials(&self) -> CredentialListing {
        match self.context.authority.list_credentials().await {
            Ok(records) => {
                let mut state = self.state();
                let mut merged = StoreState {
                    credentials: Vec::with_capacity(records.len()),
                    in_flight: std::mem::take(&mut state.in_flight),
                };
                for record in records {
                    merged.upsert(Credential::from(record));
                }
                for local in std::mem::take(&mut state.credentials) {
                    // keeps confirmed local copies over pending fetched ones
                    merged.upsert(local);
                }
                *state = merged;
                debug!("credential view refreshed: {} entries", state.credentials.len());
                CredentialListing {
                    credentials: state.credentials.clone(),
                    warning: None,
                }
            }
            Err(err) => {
                let credentials = self.credentials();
                warn!("credential refresh failed, serving {} cached entries: {}", credentials.len(), err);
                CredentialListing {
                    credentials,
                    warning: Some(err),
                }
            }
        }
    }

    /// Issues a credential and appends it to the view once confirmed.
    ///
    /// # Errors
    /// - [`Error::Validation`] if any field is blank after trimming; nothing
    ///   is sent
    /// - [`Error::IssuanceRejected`] if the authority declines, fails or
    ///   times out; the view is left untouched
    pub async fn issue_credential(&self, name: &str, claim: &str, holder: &str) -> Result<Credential> {
        let request = IssueRequest::new(name, claim, holder);
        if let Some(field) = request.blank_field() {
            return Err(Error::validation(format!("{field} must not be blank")));
        }

        let _in_flight = InFlight::register(self, &request.name);
        let record = self.context.authority.issue_credential(&request).await?;
        let credential = Credential::from(record);

        // appended in resolution order, which may differ from submission order
        self.state().upsert(credential.clone());
        info!("credential {:?} issued to {:?}", credential.name, credential.holder);
        Ok(credential)
    }

    /// Snapshot of every known credential in append order.
    pub fn credentials(&self) -> Vec<Credential> {
        self.state().credentials.clone()
    }

    /// Snapshot of one credential by exact name.
    pub fn get_credential(&self, name: &str) -> Option<Credential> {
        let state = self.state();
        state.position(name).map(|i| state.credentials[i].clone())
    }

    /// Signed token of a confirmed credential.
    pub fn confirmed_payload(&self, name: &str) -> Option<String> {
        self.get_credential(name)
            .and_then(|c| c.encoded().map(str::to_string))
    }

    /// Checks if a confirmed credential exists under `name`.
    pub fn contains_confirmed(&self, name: &str) -> bool {
        self.get_credential(name).is_some_and(|c| c.is_confirmed())
    }

    /// Returns the number of known credentials.
    pub fn count_credentials(&self) -> usize {
        self.state().credentials.len()
    }

    /// Names of issuances submitted but not yet resolved.
    pub fn pending_issuances(&self) -> Vec<String> {
        self.state().in_flight.clone()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, credential: Credential) {
        self.state().upsert(credential);
    }
}

/// Tracks one in-flight issuance; deregisters when dropped, including when
/// the issuing future is cancelled.
struct InFlight<'a> {
    store: &'a CredentialStore,
    name: String,
}

impl<'a> InFlight<'a> {
    fn register(store: &'a CredentialStore, name: &str) -> Self {
        store.state().in_flight.push(name.to_string());
        InFlight {
            store,
            name: name.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.store.state();
        if let Some(i) = state.in_flight.iter().position(|n| *n == self.name) {
            state.in_flight.remove(i);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::credential::{Payload, Validity};
    use crate::authority::client::tests::silent_authority;
    use chrono::{TimeZone, Utc};
    use mockito::Server;
    use std::time::Duration;

    pub(crate) fn record_json(name: &str, holder: &str, vc: &str) -> String {
        format!(
            r#"{{"Credential_Name":"{name}","Claim":"claim of {name}","Holder":"{holder}",
                "Issuer":"did:key:zDnIssuer","Start_Time":"2024-08-01T10:00:00+09:00",
                "End_Time":"2025-08-01T10:00:00+09:00","VC":"{vc}"}}"#
        )
    }

    pub(crate) fn credential(name: &str, holder: &str, payload: Payload) -> Credential {
        Credential {
            name: name.to_string(),
            claim: format!("claim of {name}"),
            holder: holder.to_string(),
            issuer: "did:key:zDnIssuer".to_string(),
            validity: Validity {
                start: Utc.with_ymd_and_hms(2024, 8, 1, 1, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 8, 1, 1, 0, 0).unwrap(),
            },
            payload,
        }
    }

    fn store(server: &Server) -> CredentialStore {
        CredentialStore::new(Context::for_authority(&server.url()).unwrap())
    }

    #[tokio::test]
    async fn test_issue_appends_confirmed_credential() {
        let mut server = Server::new_async().await;
        let list = server.mock("GET", "/credentials").expect(0).create_async().await;
        server
            .mock("POST", "/credentials")
            .with_status(201)
            .with_body(record_json("A", "h", "a.vc.sig"))
            .create_async()
            .await;

        let store = store(&server);
        let issued = store.issue_credential("A", "c", "h").await.unwrap();

        let cached = store.credentials();
        assert_eq!(cached.iter().filter(|c| c.name == "A").count(), 1);
        assert_eq!(cached[0].encoded(), Some("a.vc.sig"));
        assert_eq!(issued, cached[0]);
        assert!(store.pending_issuances().is_empty());
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_pending_issuance_visible_until_resolved() {
        let addr = silent_authority().await;
        let store = CredentialStore::new(Context::with_timeout(
            &format!("http://{addr}"),
            Duration::from_millis(300),
        ));

        let (issued, in_flight) = tokio::join!(store.issue_credential("X", "c", "h"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.pending_issuances()
        });

        assert_eq!(in_flight, ["X"]);
        assert_eq!(issued.unwrap_err(), Error::IssuanceRejected("timeout".into()));
        assert!(store.pending_issuances().is_empty());
        assert_eq!(store.count_credentials(), 0);
    }

    #[tokio::test]
    async fn test_blank_fields_fail_before_network() {
        let mut server = Server::new_async().await;
        let issue = server.mock("POST", "/credentials").expect(0).create_async().await;

        let store = store(&server);
        for (name, claim, holder) in [("", "c", "h"), ("A", "  ", "h"), ("A", "c", "\t")] {
            let err = store.issue_credential(name, claim, holder).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert_eq!(store.count_credentials(), 0);
        issue.assert_async().await;
    }

    #[tokio::test]
    async fn test_duplicate_issuance_rejected_without_mutation() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/credentials")
            .with_status(201)
            .with_body(record_json("A", "h", "a.vc.sig"))
            .create_async()
            .await;

        let store = store(&server);
        store.issue_credential("A", "c", "h").await.unwrap();
        first.remove_async().await;

        server
            .mock("POST", "/credentials")
            .with_status(409)
            .with_body(r#"{"message":"このCredential Nameは既に使用されています。"}"#)
            .create_async()
            .await;

        let err = store.issue_credential("A", "other", "h").await.unwrap_err();
        assert!(matches!(err, Error::IssuanceRejected(_)));
        let cached = store.credentials();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].claim, "claim of A");
    }

    #[tokio::test]
    async fn test_refresh_failure_serves_cache() {
        let mut server = Server::new_async().await;
        let ok = server
            .mock("GET", "/credentials")
            .with_status(200)
            .with_body(format!("[{}]", record_json("A", "h", "a.vc.sig")))
            .create_async()
            .await;

        let store = store(&server);
        let listing = store.list_credentials().await;
        assert!(listing.warning.is_none());
        assert_eq!(listing.credentials.len(), 1);
        ok.remove_async().await;

        server
            .mock("GET", "/credentials")
            .with_status(503)
            .create_async()
            .await;

        let listing = store.list_credentials().await;
        assert!(matches!(listing.warning, Some(Error::FetchFailed(_))));
        assert_eq!(listing.credentials.len(), 1);
        assert_eq!(listing.credentials[0].name, "A");
    }

    #[tokio::test]
    async fn test_initial_load_failure_is_empty_with_warning() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/credentials")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let listing = store(&server).list_credentials().await;
        assert!(listing.credentials.is_empty());
        assert!(matches!(listing.warning, Some(Error::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_keeps_local_only_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/credentials")
            .with_status(200)
            .with_body(format!(
                "[{},{}]",
                record_json("A", "h", "a.vc.sig"),
                record_json("B", "h", "")
            ))
            .create_async()
            .await;

        let store = store(&server);
        store.insert_for_test(credential("B", "h", Payload::Confirmed("b.vc.sig".into())));
        store.insert_for_test(credential("Z", "h", Payload::Confirmed("z.vc.sig".into())));

        let names: Vec<_> = store
            .list_credentials()
            .await
            .credentials
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["A", "B", "Z"]);
        assert_eq!(store.confirmed_payload("B").as_deref(), Some("b.vc.sig"));
    }

    #[test]
    fn test_pending_credential_is_not_confirmed() {
        let context = Context::for_authority("http://localhost:8080").unwrap();
        let store = CredentialStore::new(context);
        store.insert_for_test(credential("draft", "h", Payload::Pending));

        assert_eq!(store.count_credentials(), 1);
        assert!(!store.contains_confirmed("draft"));
        assert!(store.confirmed_payload("draft").is_none());
        assert!(store.get_credential("Draft").is_none());
    }
}
