//! Client-side cache of server responses.
//!
//! This module provides a keyed, in-memory cache that:
//! - Serves an entry without a network call while it is fresh
//! - Coalesces concurrent fetches of the same key into one request
//! - Lets mutations invalidate an entry so the next read refetches
//!
//! Entries are never reconciled with any other client-side copy of the data.

mod layer;
mod policy;
mod traits;

pub use layer::QueryCache;
pub use policy::QueryPolicy;
pub use traits::{CacheResult, CacheSource};
