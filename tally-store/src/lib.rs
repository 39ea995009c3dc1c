//! Tally Store - Document Store Boundary
//!
//! The query translator, the async collection/store traits the rest of the
//! workspace programs against, and the in-memory backend implementing them:
//! filter evaluation, JSON value ordering, and the aggregation dialect the
//! analyses push down.

pub mod collection;
pub mod memory;
pub mod query;
pub mod value;

pub use collection::{DocumentCollection, DocumentStore};
pub use memory::{MemoryCollection, MemoryStore};
pub use query::{QueryTranslator, TranslatedQuery};
pub use value::{compare_values, values_equal};
