// src/services/lifecycle.rs
//! Lifecycle controller: the operation surface used by the front end.
//!
//! Sequences issue → list → select → bundle → verify over the three
//! components and turns every failure into a logged, user-facing message.
//! It keeps no state of its own beyond the components it owns.
//!
//! Concurrency policy:
//! - issuances are independent; two submitted back to back both go out and
//!   are appended in the order they resolve
//! - verification is single-flight per subject (see
//!   [`VerificationCoordinator`])
//! - presentation names are reserved while their generation is in flight

use std::sync::Arc;

use log::warn;

use crate::context::Context;
use crate::error::Result;
use crate::models::credential::Credential;
use crate::models::presentation::Presentation;
use crate::models::verification::{SubjectKind, VerificationRecord, VerificationStatus};
use crate::services::verifier::VerificationCoordinator;
use crate::wallet::credential_storage::{CredentialListing, CredentialStore};
use crate::wallet::presentation_builder::PresentationBuilder;

/// Top-level orchestrator over the store, builder and coordinator.
pub struct LifecycleController {
    store: Arc<CredentialStore>,
    builder: Arc<PresentationBuilder>,
    coordinator: VerificationCoordinator,
}

impl LifecycleController {
    /// Wires every component to the shared `context`.
    ///
    /// # Arguments
    /// * `context` - Settings and authority client shared by all components
    pub fn new(context: Arc<Context>) -> Self {
        let store = Arc::new(CredentialStore::new(context.clone()));
        let builder = Arc::new(PresentationBuilder::new(context.clone(), store.clone()));
        let coordinator = VerificationCoordinator::new(context, store.clone(), builder.clone());
        Self {
            store,
            builder,
            coordinator,
        }
    }

    // Issuer

    /// Refreshes from the authority, falling back to the cached view.
    ///
    /// # Returns
    /// The merged credential view, with a warning attached when the
    /// authority could not be reached
    pub async fn list_credentials(&self) -> CredentialListing {
        self.store.list_credentials().await
    }

    /// Cached view without contacting the authority.
    pub fn cached_credentials(&self) -> Vec<Credential> {
        self.store.credentials()
    }

    /// Names of issuances still waiting on the authority.
    pub fn pending_issuances(&self) -> Vec<String> {
        self.store.pending_issuances()
    }

    /// Issues a credential through the authority.
    ///
    /// # Arguments
    /// * `name` - Credential name, unique per authority
    /// * `claim` - Claim text to be signed
    /// * `holder` - Holder the credential is issued to
    ///
    /// # Returns
    /// The confirmed credential, or the logged failure
    pub async fn issue_credential(&self, name: &str, claim: &str, holder: &str) -> Result<Credential> {
        report("issue credential", self.store.issue_credential(name, claim, holder).await)
    }

    // Holder

    /// Adds or removes `name` from the selection.
    ///
    /// # Returns
    /// `true` if the name is selected afterwards
    pub fn toggle_selection(&self, name: &str) -> Result<bool> {
        report("toggle selection", self.builder.toggle_selection(name))
    }

    /// Selected credential names in selection order.
    pub fn selection(&self) -> Vec<String> {
        self.builder.selection()
    }

    /// Credentials held by `holder`, compared case-insensitively.
    pub fn filter_by_holder(&self, holder: &str) -> Vec<Credential> {
        self.builder.filter_by_holder(holder)
    }

    /// Bundles the current selection into a presentation named `name`.
    ///
    /// # Arguments
    /// * `name` - Presentation name, unique among presentations
    pub async fn build_presentation(&self, name: &str) -> Result<Presentation> {
        report("build presentation", self.builder.build_presentation(name).await)
    }

    pub fn presentations(&self) -> Vec<Presentation> {
        self.builder.presentations()
    }

    // Verifier

    /// Verifies the confirmed credential named `name`.
    ///
    /// # Returns
    /// The verification record; an `Invalid` outcome is not an error
    pub async fn verify_credential(&self, name: &str) -> Result<VerificationRecord> {
        report("verify credential", self.coordinator.verify_credential(name).await)
    }

    /// Verifies the presentation named `name`.
    pub async fn verify_presentation(&self, name: &str) -> Result<VerificationRecord> {
        report("verify presentation", self.coordinator.verify_presentation(name).await)
    }

    /// Current state of one subject's verification.
    pub fn verification_status(&self, kind: SubjectKind, name: &str) -> VerificationStatus {
        self.coordinator.status(kind, name)
    }
}

fn report<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!("{operation} failed ({:?}): {err}", err.kind());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::verification::Outcome;
    use crate::wallet::credential_storage::tests::record_json;
    use mockito::{Server, ServerGuard};

    async fn authority() -> ServerGuard {
        let mut server = Server::new_async().await;
        for (name, holder) in [("A", "Alice"), ("B", "alice")] {
            server
                .mock("POST", "/credentials")
                .match_body(mockito::Matcher::PartialJson(serde_json::json!({ "credential_name": name })))
                .with_status(201)
                .with_body(record_json(name, holder, &format!("{name}.vc.sig")))
                .create_async()
                .await;
        }
        server
            .mock("POST", "/generate-vp")
            .with_status(201)
            .with_body(r#"{"vp":"p1.vp.sig"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/verify-vp")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "vp": "p1.vp.sig" })))
            .with_status(200)
            .with_body(r#"{"message":"VPは有効です (VP is valid)"}"#)
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_issue_select_bundle_verify() {
        let server = authority().await;
        let controller = LifecycleController::new(Context::for_authority(&server.url()).unwrap());

        let (a, b) = tokio::join!(
            controller.issue_credential("A", "c", "Alice"),
            controller.issue_credential("B", "c", "alice")
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(controller.cached_credentials().len(), 2);
        assert_eq!(controller.filter_by_holder("ALICE").len(), 2);

        controller.toggle_selection("B").unwrap();
        controller.toggle_selection("A").unwrap();
        let presentation = controller.build_presentation("P1").await.unwrap();
        assert_eq!(presentation.included_credential_names, ["B", "A"]);
        assert!(controller.selection().is_empty());

        let record = controller.verify_presentation("P1").await.unwrap();
        assert_eq!(record.outcome, Outcome::Valid);
        assert_eq!(record.subject_kind, SubjectKind::Presentation);
        assert_eq!(
            controller.verification_status(SubjectKind::Presentation, "P1"),
            VerificationStatus::Completed(record)
        );
    }

    #[tokio::test]
    async fn test_failures_surface_as_messages() {
        let server = authority().await;
        let controller = LifecycleController::new(Context::for_authority(&server.url()).unwrap());

        let err = controller.build_presentation("P1").await.unwrap_err();
        assert_eq!(err, Error::Validation("select at least one credential".into()));
        assert_eq!(
            controller.issue_credential("A", "", "h").await.unwrap_err().to_string(),
            "claim must not be blank"
        );
        assert!(matches!(
            controller.verify_credential("A").await,
            Err(Error::NotFound(_))
        ));
    }
}
