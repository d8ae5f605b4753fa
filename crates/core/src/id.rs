// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and generation.

use parking_lot::Mutex;
use std::sync::Arc;

/// Define a `String`-backed identifier type.
///
/// Generates constructors, `as_str`/`into_string`, a char-boundary-safe
/// `prefix()` for truncated display, `Display`, `From` conversions, and the
/// `str` comparisons and `Borrow` impl that make map lookups by `&str` work.
///
/// ```ignore
/// string_id! {
///     /// Identifies a widget.
///     pub struct WidgetId;
/// }
/// ```
#[macro_export]
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(value: S) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// The leading `max_chars` characters, never splitting a
            /// multi-byte character.
            pub fn prefix(&self, max_chars: usize) -> &str {
                match self.0.char_indices().nth(max_chars) {
                    Some((boundary, _)) => &self.0[..boundary],
                    None => &self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }
    };
}

/// Mints fresh identifiers.
pub trait IdGen: Clone + Send + Sync {
    fn mint(&self) -> String;
}

/// Production scheme: hyphen-less UUIDv4 hex (32 chars).
#[derive(Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn mint(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic `stem-N` identifiers for tests.
#[derive(Clone)]
pub struct SequentialIdGen {
    stem: String,
    minted: Arc<Mutex<u64>>,
}

impl SequentialIdGen {
    pub fn new(stem: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            minted: Arc::new(Mutex::new(0)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn mint(&self) -> String {
        let mut minted = self.minted.lock();
        *minted += 1;
        format!("{}-{}", self.stem, *minted)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
