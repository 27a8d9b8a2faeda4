//! Type integration with external types
//!
//! Implementation [`Decode`][d] for external types.
//!
//! Available for:
//!
//! - [`serde`]'s [`Deserialize`][sd] via [`Json`], requires `json` feature
//! - [`time`][::time]'s [`OffsetDateTime`][to], [`PrimitiveDateTime`][tp], requires `time` feature
//!
//! [d]: crate::Decode
//! [sd]: serde::Deserialize
//! [to]: ::time::OffsetDateTime
//! [tp]: ::time::PrimitiveDateTime

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

#[cfg(feature = "time")]
mod time;
