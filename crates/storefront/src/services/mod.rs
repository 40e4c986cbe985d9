//! Business logic services for storefront.
//!
//! # Services
//!
//! - `catalog` - Catalog filters and stale-response sequencing
//! - `registration` - Account creation followed by the profile insert
//! - `session_hub` - Session change notifications per sign-in

pub mod catalog;
pub mod registration;
pub mod session_hub;

pub use catalog::{CatalogFilter, QuerySequencer, QueryTicket};
pub use registration::{
    Backoff, RegistrationFlow, RegistrationForm, RegistrationOutcome, ValidationError,
};
pub use session_hub::{SessionEvent, SessionHub, SessionSubscription};
