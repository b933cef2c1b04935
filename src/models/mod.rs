// src/models/mod.rs
//! Data structures shared by the lifecycle components.

pub mod credential;
pub mod presentation;
pub mod verification;
