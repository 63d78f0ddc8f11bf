// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Optiverifi Shared Module
//!
//! Typed client for the marketplace backend the dashboard sits in front of.
//!
//! ## Features
//!
//! - **Credential modes**: public calls (no auth header) and authenticated
//!   calls (bearer token taken from the browser's session cookie)
//! - **Envelope handling**: unwraps the backend's `{ success, message, data }`
//!   shape and turns `success: false` into an error
//! - **Auth failures**: 401/403 on authenticated calls surface as a single
//!   error variant so the dashboard can clear the session in one place
//! - **Retries**: idempotent reads are retried on transport errors

pub mod client;
pub mod error;
pub mod models;

pub use client::{AuthenticatedClient, BackendClient, BackendConfig};
pub use error::{BackendError, BackendResult};
pub use models::*;
