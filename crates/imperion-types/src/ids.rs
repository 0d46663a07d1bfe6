//! Type-safe identifier wrappers around [`String`].
//!
//! Identifiers in Imperion are opaque strings minted by different layers:
//! player ids come from the identity store (`player_{ms}_{suffix}`), empire
//! ids from the entity store (`empire_{ms}_{name}`), and room ids from
//! configuration. Wrapping them keeps a player id from ever being passed
//! where an entity id is expected, while serializing as a bare JSON string.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Stable identifier of a player, preserved across reconnects.
    PlayerId
}

define_id! {
    /// Unique identifier of an entity (empire or other map object).
    EntityId
}

define_id! {
    /// Identifier of a room. Each room owns exactly one world.
    RoomId
}
