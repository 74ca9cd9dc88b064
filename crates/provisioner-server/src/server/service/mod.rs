//! JSON API over [`provisioner_core::Provisioner`].
//!
//! Handlers translate between HTTP and the core service and never run
//! provisioning work themselves. Intake returns as soon as the request is
//! stored; clients poll the status route until the request is terminal.
//!
//! ## Structure
//!
//! - [`handler`] - route handlers, response mapping and [`handler::router`].

pub mod handler;
