// src/wallet/presentation_builder.rs
//! Holder-side selection and presentation building.
//!
//! The holder toggles credentials into an ordered selection set and then
//! turns that selection into a named presentation. The selection only ever
//! holds names of confirmed credentials. A successful build removes the
//! bundled names from it; a failed one leaves it as it was so the holder
//! can retry without re-selecting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::credential::{Credential, Payload};
use crate::models::presentation::Presentation;
use crate::wallet::credential_storage::CredentialStore;

#[derive(Default)]
struct BuilderState {
    /// Selected credential names in the order they were selected.
    selection: Vec<String>,
    /// Presentations in creation order.
    presentations: Vec<Presentation>,
    /// Names of presentations currently being generated.
    reserved: Vec<String>,
}

/// Manages the selection set and the list of generated presentations.
pub struct PresentationBuilder {
    context: Arc<Context>,
    store: Arc<CredentialStore>,
    state: Mutex<BuilderState>,
}

impl PresentationBuilder {
    /// Creates a builder with an empty selection.
    ///
    /// # Arguments
    /// * `context` - Shared context holding the authority client
    /// * `store` - Credential store the selection is resolved against
    pub fn new(context: Arc<Context>, store: Arc<CredentialStore>) -> Self {
        Self {
            context,
            store,
            state: Mutex::new(BuilderState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BuilderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `name` to the selection, or removes it if already selected.
    ///
    /// Returns `true` if the name is selected afterwards.
    ///
    /// # Errors
    /// [`Error::Validation`] when adding a name that is not a confirmed
    /// credential. Removal always succeeds.
    pub fn toggle_selection(&self, name: &str) -> Result<bool> {
        // checked before locking: the store has its own lock
        let confirmed = self.store.contains_confirmed(name);

        let mut state = self.state();
        if let Some(i) = state.selection.iter().position(|n| n == name) {
            state.selection.remove(i);
            return Ok(false);
        }
        if !confirmed {
            return Err(Error::validation(format!("no confirmed credential named {name:?}")));
        }
        state.selection.push(name.to_string());
        Ok(true)
    }

    /// Snapshot of the selection in selection order.
    pub fn selection(&self) -> Vec<String> {
        self.state().selection.clone()
    }

    /// Credentials whose holder equals `holder`, ignoring case.
    ///
    /// A blank filter matches nothing. Surrounding whitespace is not
    /// stripped, so `" Alice "` does not match `Alice`.
    pub fn filter_by_holder(&self, holder: &str) -> Vec<Credential> {
        if holder.trim().is_empty() {
            return Vec::new();
        }
        let needle = holder.to_lowercase();
        self.store
            .credentials()
            .into_iter()
            .filter(|c| c.holder.to_lowercase() == needle)
            .collect()
    }

    /// Generates a presentation named `name` from the current selection.
    ///
    /// The presentation lists the selected names in selection order as of
    /// this call.
    ///
    /// # Errors
    /// - [`Error::Validation`] if the name is blank, already used or being
    ///   generated, or if nothing is selected; nothing is sent
    /// - [`Error::UnresolvedCredential`] if a selected credential has no
    ///   confirmed payload; nothing is sent
    /// - [`Error::GenerationRejected`] if the authority declines, fails or
    ///   times out
    pub async fn build_presentation(&self, name: &str) -> Result<Presentation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("presentation name must not be blank"));
        }

        let (included, _reservation) = {
            let mut state = self.state();
            if state.selection.is_empty() {
                return Err(Error::validation("select at least one credential"));
            }
            if state.presentations.iter().any(|p| p.name == name) {
                return Err(Error::validation(format!("presentation {name:?} already exists")));
            }
            if state.reserved.iter().any(|r| r == name) {
                return Err(Error::validation(format!("presentation {name:?} is already being generated")));
            }
            state.reserved.push(name.to_string());
            (state.selection.clone(), Reservation { builder: self, name })
        };

        let vcs = included
            .iter()
            .map(|n| {
                self.store
                    .confirmed_payload(n)
                    .ok_or_else(|| Error::UnresolvedCredential(n.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("generating presentation {name:?} from {} credentials", vcs.len());
        let vp = self.context.authority.generate_presentation(&vcs).await?;

        let presentation = Presentation {
            name: name.to_string(),
            included_credential_names: included,
            payload: Payload::Confirmed(vp),
        };

        let mut state = self.state();
        // toggles made while the request was in flight are kept
        state
            .selection
            .retain(|n| !presentation.included_credential_names.contains(n));
        state.presentations.push(presentation.clone());
        info!(
            "presentation {:?} generated with {:?}",
            presentation.name, presentation.included_credential_names
        );
        Ok(presentation)
    }

    /// Snapshot of every presentation in creation order.
    pub fn presentations(&self) -> Vec<Presentation> {
        self.state().presentations.clone()
    }

    /// Signed token of the presentation named `name`.
    pub fn confirmed_payload(&self, name: &str) -> Option<String> {
        self.state()
            .presentations
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.encoded().map(str::to_string))
    }

    #[cfg(test)]
    pub(crate) fn select_unchecked(&self, name: &str) {
        self.state().selection.push(name.to_string());
    }
}

/// Holds a presentation name while it is being generated.
struct Reservation<'a> {
    builder: &'a PresentationBuilder,
    name: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut state = self.builder.state();
        if let Some(i) = state.reserved.iter().position(|r| r == self.name) {
            state.reserved.remove(i);
        }
    }
}
