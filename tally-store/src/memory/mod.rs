//! In-memory document store backend
//!
//! The system's storage engine and its own test double: one evaluator
//! answers both translated queries and aggregation pipelines.

mod collection;
mod filter;
mod pipeline;
mod store;

pub use collection::MemoryCollection;
pub use store::MemoryStore;

pub(crate) use filter::matches_filter;
