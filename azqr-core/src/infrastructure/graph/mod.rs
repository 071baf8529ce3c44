//! Azure Resource Graph access

mod client;

pub use client::{
    GRAPH_API_VERSION, GraphQuery, GraphQueryClient, GraphResult, GraphRow, QuotaState,
    parse_quota_headers,
};
