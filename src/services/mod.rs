// src/services/mod.rs
//! Orchestration and the JSON front end.

pub mod api_server;
pub mod lifecycle;
pub mod verifier;
