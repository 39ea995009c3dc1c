//! Built-in analyses

mod group_and_aggregate;
mod sales_by_region;
mod user_activity;

pub use group_and_aggregate::GroupAndAggregate;
pub use sales_by_region::SalesByRegion;
pub use user_activity::UserActivitySummary;
