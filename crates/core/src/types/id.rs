//! Newtype IDs for type-safe entity references.
//!
//! Every record the storefront reads is keyed by a UUID assigned by the
//! hosted backend. Use the `define_id!` macro to create wrappers that prevent
//! accidentally mixing IDs from different record kinds.

/// Macro to define a type-safe UUID wrapper.
///
/// Creates a newtype wrapper around [`uuid::Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_uuid()`
/// - `Display` and `FromStr` using the hyphenated form
///
/// # Example
///
/// ```rust
/// # use azmotos_core::define_id;
/// define_id!(DealerId);
/// define_id!(OfferId);
///
/// let dealer = DealerId::new(uuid::Uuid::nil());
/// assert_eq!(dealer.to_string(), "00000000-0000-0000-0000-000000000000");
///
/// // These are different types, so this won't compile:
/// // let _: DealerId = OfferId::new(uuid::Uuid::nil());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Record kinds stored in the hosted backend
define_id!(MotorcycleId);
define_id!(UserId);
