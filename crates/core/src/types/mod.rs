//! Core types for AZMOTOS.
//!
//! This module provides type-safe wrappers for the catalog and account domain.

pub mod brand;
pub mod email;
pub mod id;
pub mod motorcycle;
pub mod price;
pub mod profile;

pub use brand::{Brand, BrandFilter, UnknownBrand};
pub use email::{Email, EmailError};
pub use id::*;
pub use motorcycle::{Motorcycle, NewMotorcycle, Specs};
pub use price::{CurrencyCode, Price};
pub use profile::{NewProfile, Profile};
