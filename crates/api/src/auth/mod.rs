//! Session handling for the dashboard service

pub mod session;

pub use session::{session_guard, Session, LOGIN_PATH, SESSIONLESS_PATHS};
