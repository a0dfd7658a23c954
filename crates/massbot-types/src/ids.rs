//! Type-safe scalar wrappers for token identifiers, tiers and masses.
//!
//! The ledger reports all three as 256-bit words. The indexer narrows them
//! to 64-bit unsigned integers at the chain boundary (with a checked
//! conversion), so every value in this crate is already known to fit.

use serde::{Deserialize, Serialize};

/// Generates a transparent newtype wrapper around an unsigned integer.
macro_rules! define_scalar {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw value.
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Return the raw value.
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_scalar! {
    /// Identifier of a token, assigned once at mint and never reused.
    ///
    /// Identifiers start at 1. The raw value 0 is the ledger's "none"
    /// sentinel and never names a real token.
    TokenId(u64)
}

define_scalar! {
    /// Integer class of a token, independent of its mass.
    Tier(u32)
}

define_scalar! {
    /// Mass of a token. Grows only by absorbing other tokens.
    Mass(u64)
}

impl TokenId {
    /// Interpret a raw ledger value, mapping the 0 sentinel to `None`.
    pub const fn from_ledger(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }
}

impl Tier {
    /// Tier recorded for destroyed or never-minted tokens.
    pub const NEUTRAL: Self = Self(0);

    /// Human-readable colour name used in notifications.
    pub fn name(self) -> String {
        match self.0 {
            1 => "white".to_owned(),
            2 => "yellow".to_owned(),
            3 => "blue".to_owned(),
            4 => "red".to_owned(),
            n => format!("tier {n}"),
        }
    }
}

impl Mass {
    /// Mass recorded for destroyed or never-minted tokens.
    pub const ZERO: Self = Self(0);
}
