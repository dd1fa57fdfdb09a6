//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and directory lookups into use-case level APIs.
//! - Keep front ends (CLI, future HTTP) decoupled from storage details.

pub mod reservation_service;
