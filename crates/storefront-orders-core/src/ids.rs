//! Identifier types for storefront orders.
//!
//! Order and customer identifiers are stored verbatim in spreadsheet cells, so
//! they are string newtypes rather than binary UUIDs. Generated order ids use a
//! ULID so rows appended in sequence also sort chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Prefix applied to generated order identifiers.
pub const ORDER_ID_PREFIX: &str = "ORD-";

/// Macro to define a string-backed identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (validated on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`, `AsRef<str>`
///
/// Parsing trims surrounding whitespace and rejects empty values or values
/// with embedded whitespace, since ids are matched cell-for-cell against the sheet.
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty);
                }
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(IdError::ContainsWhitespace(trimmed.to_string()));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_type!(OrderId, "An order identifier.\n\nAssigned by the order store at creation; a client-supplied id is honored only when it is not already in use.");
string_id_type!(CustomerId, "A customer identifier.\n\nProvided by the authentication layer and used for ownership checks on retries.");

impl OrderId {
    /// Generate a new time-ordered order identifier (`ORD-<ULID>`).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{ORDER_ID_PREFIX}{}", Ulid::new()))
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty or only whitespace.
    #[error("identifier is empty")]
    Empty,

    /// The input contains whitespace after trimming.
    #[error("identifier contains whitespace: {0:?}")]
    ContainsWhitespace(String),
}
