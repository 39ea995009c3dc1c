//! Tally Core - Query and Analysis Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! the declarative filter/sort model, search criteria, analysis request
//! and response shapes, and the error taxonomy. No I/O lives here.

pub mod criteria;
pub mod document;
pub mod error;
pub mod filter;
pub mod num;
pub mod sort;
pub mod time;

pub use criteria::{AnalysisRequest, AnalysisResponse, QueryRequest, SearchCriteria, MAX_LIMIT};
pub use document::{lookup_path, lookup_value, Document, ID_FIELD};
pub use error::{AnalysisError, QueryError, StoreError, TallyError, TallyResult};
pub use filter::{FilterCondition, FilterOperator, OrGroup};
pub use sort::{SortDirection, SortKey};
pub use time::parse_datetime;
