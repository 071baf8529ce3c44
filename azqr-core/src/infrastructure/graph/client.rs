use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::infrastructure::client_options::ClientOptions;
use crate::infrastructure::credential::SharedCredential;
use crate::infrastructure::http::{ClientError, HttpClient};

pub const GRAPH_API_VERSION: &str = "2021-03-01";

/// One row of an `objectArray` result
pub type GraphRow = Map<String, Value>;

/// Rows returned by a query across every batch and page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphResult {
    pub data: Vec<GraphRow>,
}

impl GraphResult {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Query seam used by scanners and stages
#[async_trait]
pub trait GraphQuery: Send + Sync {
    async fn query(
        &self,
        query: &str,
        subscriptions: &[String],
        cancel: &CancellationToken,
    ) -> Result<GraphResult, ClientError>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    subscriptions: &'a [String],
    query: &'a str,
    options: QueryRequestOptions<'a>,
}

#[derive(Debug, Serialize)]
struct QueryRequestOptions<'a> {
    #[serde(rename = "resultFormat")]
    result_format: &'static str,
    #[serde(rename = "$top")]
    top: u32,
    #[serde(rename = "$skipToken", skip_serializing_if = "Option::is_none")]
    skip_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<GraphRow>,
    #[serde(rename = "$skipToken", alias = "skipToken", default)]
    skip_token: Option<String>,
}

/// Per-user quota reported by Resource Graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub remaining: Option<u32>,
    pub resets_after: Option<Duration>,
}

impl QuotaState {
    /// How long to pause before the next request, if the quota is spent
    pub fn pause(&self) -> Option<Duration> {
        match (self.remaining, self.resets_after) {
            (Some(0), Some(wait)) => Some(wait),
            _ => None,
        }
    }
}

/// Read `x-ms-user-quota-remaining` and `x-ms-user-quota-resets-after` (`hh:mm:ss`)
pub fn parse_quota_headers(headers: &HeaderMap) -> QuotaState {
    let remaining = headers
        .get("x-ms-user-quota-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok());

    let resets_after = headers
        .get("x-ms-user-quota-resets-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timespan);

    QuotaState {
        remaining,
        resets_after,
    }
}

fn parse_timespan(raw: &str) -> Option<Duration> {
    let mut parts = raw.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs(hours * 3_600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

/// Resource Graph client with subscription batching, paging and quota handling
#[derive(Debug, Clone)]
pub struct GraphQueryClient {
    http: HttpClient,
    endpoint: String,
    batch_size: usize,
    page_size: u32,
}

impl GraphQueryClient {
    pub fn new(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
        scan: &ScanConfig,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(options, credential)?,
            endpoint: format!(
                "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
                options.resource_manager_endpoint(),
                GRAPH_API_VERSION
            ),
            batch_size: scan.graph_batch_size.clamp(1, 1_000),
            page_size: scan.graph_page_size.clamp(1, 1_000),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query_batch(
        &self,
        query: &str,
        subscriptions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<GraphRow>, ClientError> {
        let mut rows = Vec::new();
        let mut skip_token: Option<String> = None;

        loop {
            let request = QueryRequest {
                subscriptions,
                query,
                options: QueryRequestOptions {
                    result_format: "objectArray",
                    top: self.page_size,
                    skip_token: skip_token.as_deref(),
                },
            };
            let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode {
                url: self.endpoint.clone(),
                message: e.to_string(),
            })?;

            let response = self
                .http
                .post_with_headers(&self.endpoint, &body, &[], cancel)
                .await?;
            let quota = parse_quota_headers(&response.headers);
            let page: QueryResponse = response.json(&self.endpoint)?;

            debug!(
                rows = page.data.len(),
                quota_remaining = ?quota.remaining,
                "Graph page received"
            );
            rows.extend(page.data);

            if let Some(wait) = quota.pause() {
                debug!(wait_secs = wait.as_secs(), "Graph quota exhausted, pausing");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            match page.skip_token {
                Some(token) if !token.is_empty() => skip_token = Some(token),
                _ => break,
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl GraphQuery for GraphQueryClient {
    async fn query(
        &self,
        query: &str,
        subscriptions: &[String],
        cancel: &CancellationToken,
    ) -> Result<GraphResult, ClientError> {
        let mut result = GraphResult::default();

        for batch in subscriptions.chunks(self.batch_size) {
            match self.query_batch(query, batch, cancel).await {
                Ok(rows) => result.data.extend(rows),
                Err(err) if err.is_skippable() && batch.len() > 1 => {
                    debug!(error = %err, "Batch rejected, retrying subscriptions one by one");
                    for subscription in batch {
                        match self
                            .query_batch(query, std::slice::from_ref(subscription), cancel)
                            .await
                        {
                            Ok(rows) => result.data.extend(rows),
                            Err(err) if err.is_skippable() => {
                                warn!(subscription = %subscription, error = %err, "Skipping subscription");
                            }
                            Err(err) => return Err(err),
                        }
                    }
                }
                Err(err) if err.is_skippable() => {
                    warn!(subscriptions = ?batch, error = %err, "Skipping subscription");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(result)
    }
}
