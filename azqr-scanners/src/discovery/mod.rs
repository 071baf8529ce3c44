//! Subscription and resource discovery

pub mod resources;
pub mod subscriptions;

pub use resources::{
    EXCEL_MAX_ROWS, TypeCount, count_by_subscription, count_by_type, list_private_endpoint_targets,
    list_resources, query_type_counts, to_report_counts,
};
pub use subscriptions::SubscriptionDiscovery;
