//! HTTP front end for the provisioning service.
//!
//! ## Structure
//!
//! - [`config`] - CLI and environment configuration.
//! - [`service`] - axum handlers, DTOs and router.
//! - [`telemetry`] - tracing subscriber setup.

pub mod config;
pub mod service;
pub mod telemetry;
