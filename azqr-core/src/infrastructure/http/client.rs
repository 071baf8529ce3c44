use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::auth::BearerTokenPolicy;
use super::error::{ClientError, HttpError};
use super::retry::{RetryOptions, parse_retry_after};
use crate::infrastructure::client_options::ClientOptions;
use crate::infrastructure::cloud::CloudKind;
use crate::infrastructure::credential::SharedCredential;
use crate::infrastructure::throttling::ThrottlingPolicy;

/// Raw response of a successful request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Authenticated, throttled and retried HTTP client.
///
/// Every attempt acquires a permit from the throttling policy before it is
/// sent, so retries are rate limited as well.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    retry: RetryOptions,
    throttling: ThrottlingPolicy,
    auth: Option<Arc<BearerTokenPolicy>>,
    operation_timeout: Duration,
}

impl HttpClient {
    /// Client using the default retry budget
    pub fn new(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
    ) -> Result<Self, ClientError> {
        Self::build(options, credential, options.retry.clone())
    }

    /// Client using the long-running retry budget
    pub fn long_running(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
    ) -> Result<Self, ClientError> {
        Self::build(options, credential, options.long_running_retry.clone())
    }

    fn build(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
        retry: RetryOptions,
    ) -> Result<Self, ClientError> {
        let inner = Client::builder()
            .timeout(retry.transport_timeout())
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        let scope = match &options.cloud.resource_manager_audience {
            Some(audience) if options.cloud.kind == CloudKind::Custom => {
                format!("{}/.default", audience.trim_end_matches('/'))
            }
            _ => options.cloud.default_scope(),
        };
        let auth = credential.map(|c| Arc::new(BearerTokenPolicy::new(c, vec![scope])));

        Ok(Self {
            inner,
            operation_timeout: retry.try_timeout * 10,
            retry,
            throttling: options.throttling.clone(),
            auth,
        })
    }

    pub fn retry_options(&self) -> &RetryOptions {
        &self.retry
    }

    pub async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        self.execute(Method::GET, url, None, &[], cancel).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        self.post_with_headers(url, body, &[], cancel).await
    }

    /// POST with extra request headers; the response headers are always returned
    pub async fn post_with_headers(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        let payload = serde_json::to_vec(body).map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.execute(Method::POST, url, Some(payload), headers, cancel)
            .await
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError> {
        self.get(url, cancel).await?.json(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        let parsed = Url::parse(url).map_err(|e| ClientError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match tokio::time::timeout(
            self.operation_timeout,
            self.execute_with_retry(method, parsed, body, headers, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                url: url.to_string(),
                seconds: self.operation_timeout.as_secs(),
            }),
        }
    }

    async fn execute_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        let mut attempt: u32 = 0;

        loop {
            self.throttling.acquire(&url, cancel).await?;

            let mut request = self.inner.request(method.clone(), url.clone());
            if let Some(auth) = &self.auth {
                let token = tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    token = auth.token() => token?,
                };
                request = request.bearer_auth(token);
            }
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            if let Some(payload) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.clone());
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = tokio::time::timeout(self.retry.try_timeout, self.send(request, &url)) => outcome,
            };

            let retry_after = match outcome {
                Ok(Ok(response)) if (200..300).contains(&response.status) => {
                    return Ok(response);
                }
                Ok(Ok(response)) => {
                    let retry_after = parse_retry_after(&response.headers);
                    let retryable =
                        self.retry.is_retryable_status(response.status) || retry_after.is_some();
                    if !retryable || attempt >= self.retry.max_retries {
                        return Err(HttpError {
                            status: response.status,
                            body: String::from_utf8_lossy(&response.body).into_owned(),
                            url: url.to_string(),
                        }
                        .into());
                    }
                    debug!(
                        status = response.status,
                        attempt = attempt + 1,
                        url = %url,
                        "Retryable response"
                    );
                    retry_after
                }
                Ok(Err(err)) => {
                    if attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    debug!(error = %err, attempt = attempt + 1, "Transport error, retrying");
                    None
                }
                Err(_) => {
                    if attempt >= self.retry.max_retries {
                        return Err(ClientError::Timeout {
                            url: url.to_string(),
                            seconds: self.retry.try_timeout.as_secs(),
                        });
                    }
                    debug!(attempt = attempt + 1, url = %url, "Attempt timed out, retrying");
                    None
                }
            };

            let delay = self.retry.delay_for(attempt, retry_after);
            warn!(
                url = %url,
                attempt = attempt + 1,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Backing off before retry"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<HttpResponse, ClientError> {
        let transport = |e: reqwest::Error| ClientError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
