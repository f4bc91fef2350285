mod aggregate;
mod aggregate_pushdown;
mod child;
mod context;
mod group_by;
mod grouping_sets;
mod null_override;
mod time_format;

pub use aggregate_pushdown::{AggregatePushdown, apply_aggregate_pushdown};
pub use child::{ChildPushdown, PushedChild, ScanPushdown};
