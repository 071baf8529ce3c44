//! Rate limiting for Azure management APIs
//!
//! One token bucket per upstream API family. Every HTTP attempt made through
//! [`crate::infrastructure::http::HttpClient`] acquires a permit from the bucket
//! selected by [`ThrottlingPolicy`].

mod limiter;
mod policy;

pub use limiter::TokenBucketLimiter;
pub use policy::{
    ARM_BURST, ARM_RATE, ApiFamily, COST_BURST, COST_RATE, GRAPH_BURST, GRAPH_RATE,
    ThrottlingPolicy, arm_limiter, cost_limiter, graph_limiter,
};

/// Error returned while waiting for a permit
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThrottlingError {
    #[error("{limiter} limiter wait cancelled")]
    Cancelled { limiter: &'static str },
}
