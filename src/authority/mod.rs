// src/authority/mod.rs
//! Boundary to the external credential authority service.

pub mod client;
