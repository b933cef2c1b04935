// src/services/verifier.rs
//! Verification coordinator for credentials and presentations.
//!
//! Each subject (kind + name) runs its own small state machine:
//!
//! ```text
//! Idle -> Verifying -> Completed(Valid | Invalid)
//!            ^                  |
//!            +------------------+  (verify again)
//! ```
//!
//! At most one request per subject is in flight. A verify call that finds
//! its subject already `Verifying` joins the pending request and receives
//! the same record instead of sending a duplicate. Requests run on their
//! own task, so a caller that goes away does not leave the subject stuck,
//! and the client's timeout always ends the machine in a terminal state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};

use crate::authority::client::{AuthorityClient, Verdict};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::verification::{
    SubjectKey, SubjectKind, VerificationRecord, VerificationStatus,
};
use crate::wallet::credential_storage::CredentialStore;
use crate::wallet::presentation_builder::PresentationBuilder;

type PendingVerification = Shared<BoxFuture<'static, VerificationRecord>>;

enum Slot {
    Verifying {
        generation: u64,
        pending: PendingVerification,
    },
    Completed(VerificationRecord),
}

#[derive(Default)]
struct SlotTable {
    slots: HashMap<SubjectKey, Slot>,
    next_generation: u64,
}

type Slots = Arc<Mutex<SlotTable>>;

fn lock(slots: &Slots) -> MutexGuard<'_, SlotTable> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives verify requests and records their outcomes per subject.
pub struct VerificationCoordinator {
    context: Arc<Context>,
    store: Arc<CredentialStore>,
    builder: Arc<PresentationBuilder>,
    slots: Slots,
}

impl VerificationCoordinator {
    pub fn new(
        context: Arc<Context>,
        store: Arc<CredentialStore>,
        builder: Arc<PresentationBuilder>,
    ) -> Self {
        Self {
            context,
            store,
            builder,
            slots: Slots::default(),
        }
    }

    /// Verifies the confirmed credential named `name`.
    ///
    /// A rejection by the authority is a normal `Invalid` record, not an
    /// error.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no confirmed credential has that name.
    pub async fn verify_credential(&self, name: &str) -> Result<VerificationRecord> {
        self.verify(SubjectKey::new(SubjectKind::Credential, name)).await
    }

    /// Verifies the presentation named `name`.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no presentation has that name.
    pub async fn verify_presentation(&self, name: &str) -> Result<VerificationRecord> {
        self.verify(SubjectKey::new(SubjectKind::Presentation, name)).await
    }

    /// Snapshot of the state machine for one subject.
    pub fn status(&self, kind: SubjectKind, name: &str) -> VerificationStatus {
        match lock(&self.slots).slots.get(&SubjectKey::new(kind, name)) {
            None => VerificationStatus::Idle,
            Some(Slot::Verifying { .. }) => VerificationStatus::Verifying,
            Some(Slot::Completed(record)) => VerificationStatus::Completed(record.clone()),
        }
    }

    async fn verify(&self, key: SubjectKey) -> Result<VerificationRecord> {
        let pending = {
            let mut table = lock(&self.slots);
            match table.slots.get(&key) {
                Some(Slot::Verifying { pending, .. }) => {
                    debug!("joining in-flight verification of {key}");
                    pending.clone()
                }
                _ => {
                    let encoded = self
                        .resolve(&key)
                        .ok_or_else(|| Error::NotFound(format!("no confirmed {key}")))?;
                    let generation = table.next_generation;
                    table.next_generation += 1;

                    let pending = dispatch(
                        self.context.authority.clone(),
                        self.slots.clone(),
                        key.clone(),
                        generation,
                        encoded,
                    );
                    table.slots.insert(
                        key,
                        Slot::Verifying {
                            generation,
                            pending: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };

        Ok(pending.await)
    }

    fn resolve(&self, key: &SubjectKey) -> Option<String> {
        match key.kind {
            SubjectKind::Credential => self.store.confirmed_payload(&key.name),
            SubjectKind::Presentation => self.builder.confirmed_payload(&key.name),
        }
    }
}

/// Spawns the verify request and returns a handle every caller can await.
///
/// The spawned task moves the subject to `Completed` unless a newer
/// request has superseded it in the meantime.
fn dispatch(
    authority: AuthorityClient,
    slots: Slots,
    key: SubjectKey,
    generation: u64,
    encoded: String,
) -> PendingVerification {
    let task_key = key.clone();
    let task = tokio::spawn(async move {
        let key = task_key;
        debug!("verifying {key}");
        let record = match authority.verify(key.kind, &encoded).await {
            Ok(Verdict { accepted: true, message }) => VerificationRecord::valid(&key, message),
            Ok(Verdict { accepted: false, message }) => VerificationRecord::invalid(&key, message),
            Err(err) => {
                warn!("verification of {key} did not complete: {err}");
                VerificationRecord::invalid(&key, err.to_string())
            }
        };
        if record.outcome.is_valid() {
            info!("{key} verified");
        } else {
            info!("{key} rejected: {}", record.message);
        }

        let mut table = lock(&slots);
        let current = matches!(
            table.slots.get(&key),
            Some(Slot::Verifying { generation: g, .. }) if *g == generation
        );
        if current {
            table.slots.insert(key, Slot::Completed(record.clone()));
        }
        record
    });

    async move {
        task.await
            .unwrap_or_else(|e| VerificationRecord::invalid(&key, format!("verification task failed: {e}")))
    }
    .boxed()
    .shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::Payload;
    use crate::models::verification::Outcome;
    use crate::wallet::credential_storage::tests::credential;
    use crate::authority::client::tests::silent_authority;
    use mockito::Server;
    use std::time::Duration;

    fn coordinator(url: &str) -> VerificationCoordinator {
        coordinator_with(Context::for_authority(url).unwrap())
    }

    fn coordinator_with(context: Arc<Context>) -> VerificationCoordinator {
        let store = Arc::new(CredentialStore::new(context.clone()));
        store.insert_for_test(credential("A", "h", Payload::Confirmed("a.vc.sig".into())));
        store.insert_for_test(credential("draft", "h", Payload::Pending));
        let builder = Arc::new(PresentationBuilder::new(context.clone(), store.clone()));
        VerificationCoordinator::new(context, store, builder)
    }

    #[tokio::test]
    async fn test_valid_credential() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/verify")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "vc": "a.vc.sig" })))
            .with_status(200)
            .with_body(r#"{"message":"VCは有効です (VC is valid)"}"#)
            .create_async()
            .await;

        let coordinator = coordinator(&server.url());
        assert_eq!(coordinator.status(SubjectKind::Credential, "A"), VerificationStatus::Idle);

        let record = coordinator.verify_credential("A").await.unwrap();
        assert_eq!(record.outcome, Outcome::Valid);
        assert_eq!(record.message, "VCは有効です (VC is valid)");
        assert_eq!(
            coordinator.status(SubjectKind::Credential, "A"),
            VerificationStatus::Completed(record)
        );
    }

    #[tokio::test]
    async fn test_rejection_is_invalid_outcome() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/verify")
            .with_status(401)
            .with_body(r#"{"message":"VCの署名が無効です (Invalid signature)"}"#)
            .create_async()
            .await;

        let record = coordinator(&server.url()).verify_credential("A").await.unwrap();
        assert_eq!(
            record.outcome,
            Outcome::Invalid("VCの署名が無効です (Invalid signature)".into())
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_request() {
        let mut server = Server::new_async().await;
        let verify = server
            .mock("POST", "/verify")
            .with_status(200)
            .with_body(r#"{"message":"ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let coordinator = coordinator(&server.url());
        let (first, second) = tokio::join!(
            coordinator.verify_credential("A"),
            coordinator.verify_credential("A")
        );

        verify.assert_async().await;
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test]
    async fn test_verify_again_supersedes_record() {
        let mut server = Server::new_async().await;
        let verify = server
            .mock("POST", "/verify")
            .with_status(200)
            .with_body(r#"{"message":"ok"}"#)
            .expect(2)
            .create_async()
            .await;

        let coordinator = coordinator(&server.url());
        let first = coordinator.verify_credential("A").await.unwrap();
        let second = coordinator.verify_credential("A").await.unwrap();

        verify.assert_async().await;
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(
            coordinator.status(SubjectKind::Credential, "A"),
            VerificationStatus::Completed(second)
        );
    }

    #[tokio::test]
    async fn test_unknown_or_pending_subject_not_found() {
        let mut server = Server::new_async().await;
        let verify = server.mock("POST", "/verify").expect(0).create_async().await;
        let verify_vp = server.mock("POST", "/verify-vp").expect(0).create_async().await;

        let coordinator = coordinator(&server.url());
        assert!(matches!(coordinator.verify_credential("ghost").await, Err(Error::NotFound(_))));
        assert!(matches!(coordinator.verify_credential("draft").await, Err(Error::NotFound(_))));
        assert!(matches!(coordinator.verify_presentation("P1").await, Err(Error::NotFound(_))));
        assert_eq!(coordinator.status(SubjectKind::Credential, "ghost"), VerificationStatus::Idle);

        verify.assert_async().await;
        verify_vp.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_invalid() {
        // nothing listens on port 9 (discard) in the test environment
        let coordinator = coordinator("http://127.0.0.1:9");
        let record = coordinator.verify_credential("A").await.unwrap();
        assert!(matches!(record.outcome, Outcome::Invalid(_)));
    }

    #[tokio::test]
    async fn test_silent_authority_ends_in_timeout() {
        let addr = silent_authority().await;
        let coordinator = coordinator_with(Context::with_timeout(
            &format!("http://{addr}"),
            Duration::from_millis(300),
        ));

        let (record, mid_flight) = tokio::join!(coordinator.verify_credential("A"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            coordinator.status(SubjectKind::Credential, "A")
        });

        assert_eq!(mid_flight, VerificationStatus::Verifying);
        let record = record.unwrap();
        assert_eq!(record.outcome, Outcome::Invalid("timeout".into()));
        assert_eq!(record.message, "timeout");
        assert_eq!(
            coordinator.status(SubjectKind::Credential, "A"),
            VerificationStatus::Completed(record)
        );
    }
}
