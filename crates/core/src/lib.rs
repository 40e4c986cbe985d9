//! AZMOTOS Core - Shared domain types.
//!
//! This crate provides the types used across all AZMOTOS components:
//! - `storefront` - Public-facing motorcycle catalog
//! - `cli` - Operator tools for browsing and seeding the catalog
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Catalog
//! items and user profiles are owned by the hosted backend; these types are
//! the shape the rest of the workspace reads and writes them in.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, prices, brands, motorcycles, and profiles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
