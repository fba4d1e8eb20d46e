//! Session management module.
//!
//! A single authenticated session lives in the session-scoped storage slot,
//! encoded with the process [`Codec`](crate::security::Codec).

mod store;

pub use store::{Session, SessionConfig, SessionStore};
