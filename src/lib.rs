// src/lib.rs

//! # VC Portal
//!
//! Client-side lifecycle orchestration for verifiable credentials (VCs) and
//! verifiable presentations (VPs) across three roles: Issuer, Holder and
//! Verifier. Signing and cryptographic verification are delegated to an
//! external credential authority reached over HTTP.
//!
//! ## Architecture Overview
//! 1. **Credential Store** (`wallet::credential_storage`): credentials by name
//! 2. **Presentation Builder** (`wallet::presentation_builder`): selection
//!    set and named presentations
//! 3. **Verification Coordinator** (`services::verifier`): single-flight
//!    verification per subject
//! 4. **Lifecycle Controller** (`services::lifecycle`): the operation surface
//!
//! State is only changed by confirmed authority responses. Issuances that
//! resolve out of order are appended in resolution order.

pub mod authority;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod wallet;

pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use services::lifecycle::LifecycleController;
