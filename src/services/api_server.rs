// src/services/api_server.rs
//! API Server for the credential lifecycle front end
//!
//! This module exposes the lifecycle controller as a JSON API grouped by
//! role. Signing and cryptographic verification stay with the credential
//! authority; these endpoints only drive and report the client-side
//! lifecycle.
//!
//! The API is built using Axum and includes endpoints for:
//! - Issuer: listing and issuing credentials
//! - Holder: filtering credentials, managing the selection, building
//!   presentations
//! - Verifier: verifying credentials and presentations, querying status
//!
//! Failures are returned as `{"message": ...}` with a status code chosen
//! from the error kind.

use crate::error::{Error, ErrorKind};
use crate::models::credential::Credential;
use crate::models::verification::{SubjectKind, VerificationRecord};
use crate::services::lifecycle::LifecycleController;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// API request and response structures

/// Request payload for issuing a credential
#[derive(Serialize, Deserialize)]
struct IssueCredentialRequest {
    name: String,
    claim: String,
    holder: String,
}

/// Query string for filtering credentials by holder
#[derive(Deserialize)]
struct HolderQuery {
    #[serde(default)]
    holder: String,
}

/// Response for a selection toggle
#[derive(Serialize, Deserialize)]
struct ToggleSelectionResponse {
    selected: bool,
    selection: Vec<String>,
}

/// Request payload for building a presentation
#[derive(Serialize, Deserialize)]
struct BuildPresentationRequest {
    name: String,
}

/// Response for issuer listings, including in-flight issuances
#[derive(Serialize)]
struct CredentialListResponse {
    credentials: Vec<Credential>,
    pending: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Error body
#[derive(Serialize, Deserialize)]
struct MessageResponse {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnresolvedCredential => StatusCode::CONFLICT,
            ErrorKind::IssuanceRejected | ErrorKind::GenerationRejected | ErrorKind::FetchFailed => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::Transport => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(MessageResponse { message: self.to_string() })).into_response()
    }
}

/// API server state wrapping the lifecycle controller
#[derive(Clone)]
pub struct ApiServer {
    controller: Arc<LifecycleController>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    pub fn new(controller: LifecycleController) -> Self {
        ApiServer {
            controller: Arc::new(controller),
        }
    }

    /// Builds the router with every role's routes
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/issuer/credentials",
                get(Self::list_credentials_handler).post(Self::issue_credential_handler),
            )
            .route("/holder/credentials", get(Self::holder_credentials_handler))
            .route("/holder/selection", get(Self::selection_handler))
            .route("/holder/selection/:name", post(Self::toggle_selection_handler))
            .route(
                "/holder/presentations",
                get(Self::presentations_handler).post(Self::build_presentation_handler),
            )
            .route("/verifier/credentials/:name", post(Self::verify_credential_handler))
            .route("/verifier/presentations/:name", post(Self::verify_presentation_handler))
            .route("/verifier/status/:kind/:name", get(Self::verification_status_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.controller.clone())
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Errors
    /// Fails if the address cannot be bound or the server stops abnormally.
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server running at http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Issuer Handlers
    // =====================

    /// Lists credentials, refreshing from the authority
    ///
    /// # Endpoint
    /// GET /issuer/credentials
    ///
    /// # Responses
    /// - 200 OK: credentials, in-flight issuance names, and a `warning` when
    ///   the authority could not be reached and the cached view is shown
    async fn list_credentials_handler(State(controller): State<Arc<LifecycleController>>) -> impl IntoResponse {
        let listing = controller.list_credentials().await;
        Json(CredentialListResponse {
            credentials: listing.credentials,
            pending: controller.pending_issuances(),
            warning: listing.warning.map(|w| w.to_string()),
        })
    }

    /// Issues a credential
    ///
    /// # Endpoint
    /// POST /issuer/credentials
    ///
    /// # Responses
    /// - 201 Created: the confirmed credential
    /// - 400 Bad Request: blank field
    /// - 502 Bad Gateway: authority rejected the issuance (message verbatim)
    async fn issue_credential_handler(
        State(controller): State<Arc<LifecycleController>>,
        Json(payload): Json<IssueCredentialRequest>,
    ) -> Result<impl IntoResponse, Error> {
        let credential = controller
            .issue_credential(&payload.name, &payload.claim, &payload.holder)
            .await?;
        Ok((StatusCode::CREATED, Json(credential)))
    }

    // =====================
    // Holder Handlers
    // =====================

    /// Credentials of one holder; an empty filter returns nothing
    ///
    /// # Endpoint
    /// GET /holder/credentials?holder=NAME
    async fn holder_credentials_handler(
        State(controller): State<Arc<LifecycleController>>,
        Query(query): Query<HolderQuery>,
    ) -> impl IntoResponse {
        Json(controller.filter_by_holder(&query.holder))
    }

    async fn selection_handler(State(controller): State<Arc<LifecycleController>>) -> impl IntoResponse {
        Json(controller.selection())
    }

    /// Toggles one credential in the selection
    ///
    /// # Endpoint
    /// POST /holder/selection/:name
    async fn toggle_selection_handler(
        State(controller): State<Arc<LifecycleController>>,
        Path(name): Path<String>,
    ) -> Result<impl IntoResponse, Error> {
        let selected = controller.toggle_selection(&name)?;
        Ok(Json(ToggleSelectionResponse {
            selected,
            selection: controller.selection(),
        }))
    }

    async fn presentations_handler(State(controller): State<Arc<LifecycleController>>) -> impl IntoResponse {
        Json(controller.presentations())
    }

    /// Builds a presentation from the current selection
    ///
    /// # Endpoint
    /// POST /holder/presentations
    ///
    /// # Responses
    /// - 201 Created: the presentation
    /// - 400 Bad Request: empty selection, blank or duplicate name
    /// - 409 Conflict: a selected credential has no confirmed payload
    /// - 502 Bad Gateway: authority rejected the generation
    async fn build_presentation_handler(
        State(controller): State<Arc<LifecycleController>>,
        Json(payload): Json<BuildPresentationRequest>,
    ) -> Result<impl IntoResponse, Error> {
        let presentation = controller.build_presentation(&payload.name).await?;
        Ok((StatusCode::CREATED, Json(presentation)))
    }

    // =====================
    // Verifier Handlers
    // =====================

    /// Verifies a credential; an invalid outcome is still 200 OK
    ///
    /// # Endpoint
    /// POST /verifier/credentials/:name
    async fn verify_credential_handler(
        State(controller): State<Arc<LifecycleController>>,
        Path(name): Path<String>,
    ) -> Result<Json<VerificationRecord>, Error> {
        controller.verify_credential(&name).await.map(Json)
    }

    /// Verifies a presentation; an invalid outcome is still 200 OK
    ///
    /// # Endpoint
    /// POST /verifier/presentations/:name
    async fn verify_presentation_handler(
        State(controller): State<Arc<LifecycleController>>,
        Path(name): Path<String>,
    ) -> Result<Json<VerificationRecord>, Error> {
        controller.verify_presentation(&name).await.map(Json)
    }

    /// Current state of a subject's verification
    ///
    /// # Endpoint
    /// GET /verifier/status/:kind/:name  (`kind` is `credential` or `presentation`)
    async fn verification_status_handler(
        State(controller): State<Arc<LifecycleController>>,
        Path((kind, name)): Path<(String, String)>,
    ) -> Result<impl IntoResponse, Error> {
        let kind: SubjectKind = kind.parse().map_err(Error::Validation)?;
        Ok(Json(controller.verification_status(kind, &name)))
    }
}
