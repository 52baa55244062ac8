//! Strongly-typed identifiers used across the domain.
//!
//! Every id is a UUID newtype so a `ReservationId` can never be passed where
//! an `OrderId` is expected. Wire format is the plain UUID string.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Mint a fresh, time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self).map_err(|e| {
                    DomainError::invalid_id(format!(
                        "{}: {e}",
                        stringify!($t)
                    ))
                })
            }
        }
    };
}

uuid_id! {
    /// Identifier of a sellable product.
    ProductId
}

uuid_id! {
    /// Identifier of a customer order.
    OrderId
}

uuid_id! {
    /// Identifier of a stock reservation (time-boxed hold).
    ReservationId
}

uuid_id! {
    /// Identifier of a refund request.
    RefundRequestId
}

uuid_id! {
    /// Identifier of a user (actor identity).
    UserId
}
