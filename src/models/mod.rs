//! Row types, view models and request payloads.
//!
//! Rows map 1:1 onto the tables in `migrations/`. Views are the enriched shapes the
//! client renders (counts, viewer-specific flags). Request payloads carry their own
//! `validate()` so handlers can reject bad input before touching the repository.

use thiserror::Error;

use crate::error::{AppError, AppResult};

/// Returned when a TEXT column or query parameter holds a value outside an enum's variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed enum whose wire form, TEXT column value and `as_str` are the same
/// literal.
///
/// Generates `as_str`, `FromStr`, `TryFrom<String>` (used by `#[sqlx(try_from = "String")]`)
/// and `Display`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, ts_rs::TS, utoipa::ToSchema,
        )]
        #[ts(export)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant
            ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

pub mod audit;
pub mod challenge;
pub mod club;
pub mod event;
pub mod post;
pub mod upload;
pub mod user;

pub use audit::*;
pub use challenge::*;
pub use club::*;
pub use event::*;
pub use post::*;
pub use upload::*;
pub use user::*;

/// Trims `value` and checks its length in characters.
pub(crate) fn check_text(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}
