//! Declarative graph recommendations
//!
//! Recommendations are KQL queries tagged with metadata. The bundled catalog
//! is compiled into the binary; plugins add more at runtime through
//! [`GraphScanner::register_external_query`].

mod catalog;
mod scanner;

pub use catalog::{
    RecommendationCatalog, SOURCE_AOR, SOURCE_APRL, builtin_recommendations, insert_recommendation,
    is_unvalidatable_query, parse_recommendations,
};
pub use scanner::{DEFAULT_QUERY_CONCURRENCY, GraphScanner};
