// SPDX-License-Identifier: MIT OR Apache-2.0
//! UUID-backed identifier newtypes shared by graph entities.

/// Declare a `Copy` identifier wrapping a [`uuid::Uuid`].
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Parse an ID from its hyphenated string form
            pub fn parse(text: &str) -> Option<Self> {
                uuid::Uuid::parse_str(text).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub(crate) use define_id;
