//! Parsed queries and their cache.
//!
//! A [`QueryHandle`] is parsed once from its [`CacheKey`] and then reused
//! by every statement executing the same text. The [`QueryCache`] lends a
//! handle to one statement at a time.
mod name;
mod handle;
mod cache;

pub use name::{Id, NameGenerator, PortalName, StatementName};
pub use handle::{CacheKey, ParseContext, QueryHandle};
pub use cache::QueryCache;
