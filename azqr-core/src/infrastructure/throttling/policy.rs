use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{ThrottlingError, TokenBucketLimiter};

/// ARM steady rate (permits per second)
pub const ARM_RATE: f64 = 3.0;
pub const ARM_BURST: u32 = 100;
/// Resource Graph and retail prices steady rate
pub const GRAPH_RATE: f64 = 2.0;
pub const GRAPH_BURST: u32 = 10;
/// Cost Management is billed in query processing units: 12 QPU per 10 seconds
pub const COST_RATE: f64 = 0.2;
pub const COST_BURST: u32 = 1;

static ARM_LIMITER: Lazy<Arc<TokenBucketLimiter>> =
    Lazy::new(|| Arc::new(TokenBucketLimiter::new("arm", ARM_RATE, ARM_BURST)));
static GRAPH_LIMITER: Lazy<Arc<TokenBucketLimiter>> =
    Lazy::new(|| Arc::new(TokenBucketLimiter::new("graph", GRAPH_RATE, GRAPH_BURST)));
static COST_LIMITER: Lazy<Arc<TokenBucketLimiter>> =
    Lazy::new(|| Arc::new(TokenBucketLimiter::new("cost", COST_RATE, COST_BURST)));

/// Process-wide ARM limiter
pub fn arm_limiter() -> Arc<TokenBucketLimiter> {
    ARM_LIMITER.clone()
}

/// Process-wide Resource Graph limiter
pub fn graph_limiter() -> Arc<TokenBucketLimiter> {
    GRAPH_LIMITER.clone()
}

/// Process-wide Cost Management limiter
pub fn cost_limiter() -> Arc<TokenBucketLimiter> {
    COST_LIMITER.clone()
}

/// Upstream API family a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    Arm,
    Graph,
    Cost,
}

impl ApiFamily {
    /// Classify a request URL
    pub fn for_url(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if path.contains("microsoft.resourcegraph/resources") {
            return ApiFamily::Graph;
        }
        if path.contains("microsoft.costmanagement/query") {
            return ApiFamily::Cost;
        }
        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case("prices.azure.com") => ApiFamily::Graph,
            _ => ApiFamily::Arm,
        }
    }
}

impl std::fmt::Display for ApiFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFamily::Arm => write!(f, "arm"),
            ApiFamily::Graph => write!(f, "graph"),
            ApiFamily::Cost => write!(f, "cost"),
        }
    }
}

/// Picks the limiter for each outgoing request
#[derive(Debug, Clone)]
pub struct ThrottlingPolicy {
    arm: Arc<TokenBucketLimiter>,
    graph: Arc<TokenBucketLimiter>,
    cost: Arc<TokenBucketLimiter>,
}

impl ThrottlingPolicy {
    pub fn new(
        arm: Arc<TokenBucketLimiter>,
        graph: Arc<TokenBucketLimiter>,
        cost: Arc<TokenBucketLimiter>,
    ) -> Self {
        Self { arm, graph, cost }
    }

    /// Policy backed by the process-wide limiters
    pub fn global() -> Self {
        Self::new(arm_limiter(), graph_limiter(), cost_limiter())
    }

    pub fn limiter(&self, family: ApiFamily) -> &TokenBucketLimiter {
        match family {
            ApiFamily::Arm => &self.arm,
            ApiFamily::Graph => &self.graph,
            ApiFamily::Cost => &self.cost,
        }
    }

    /// Wait for a permit on the limiter matching `url`
    pub async fn acquire(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<ApiFamily, ThrottlingError> {
        let family = ApiFamily::for_url(url);
        debug!(family = %family, "Applying throttling limiter");
        self.limiter(family).wait(cancel).await?;
        Ok(family)
    }
}

impl Default for ThrottlingPolicy {
    fn default() -> Self {
        Self::global()
    }
}
