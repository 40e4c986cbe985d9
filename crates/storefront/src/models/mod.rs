//! Session-held models for storefront.

pub mod session;

pub use session::{CurrentSession, keys as session_keys};
