// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Optiverifi Dashboard Service
//!
//! Server side of the customer dashboard. Pages call these routes; the
//! routes call the marketplace backend with the browser's session token and
//! add what the dashboard decides locally: fee previews, credit gating,
//! stage display and single-fire payment reconciliation after checkout.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
