// src/wallet/mod.rs
//! Holder-side state: the credential store and the presentation builder.

pub mod credential_storage;
pub mod presentation_builder;
