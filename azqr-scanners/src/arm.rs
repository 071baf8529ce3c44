//! Resource Manager client bound to one subscription
//!
//! List operations follow `nextLink` until the collection is exhausted.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use azqr_core::domain::scanner::{ScanError, ScannerConfig};
use azqr_core::infrastructure::http::{ClientError, HttpClient};

/// One page of an ARM collection
#[derive(Debug, Deserialize)]
pub struct ArmPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

/// Follow `nextLink` from `url` and gather every item
pub async fn collect_pages<T: DeserializeOwned>(
    http: &HttpClient,
    url: String,
    cancel: &CancellationToken,
) -> Result<Vec<T>, ClientError> {
    let mut items = Vec::new();
    let mut next = Some(url);

    while let Some(url) = next.take() {
        let page: ArmPage<T> = http.get_json(&url, cancel).await?;
        debug!(items = page.value.len(), url = %url, "ARM page received");
        items.extend(page.value);
        next = page.next_link.filter(|link| !link.is_empty());
    }

    Ok(items)
}

#[derive(Debug, Clone)]
pub struct ArmClient {
    http: HttpClient,
    endpoint: String,
    subscription_id: String,
    cancel: CancellationToken,
}

impl ArmClient {
    /// Long-running client for service scans
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        Ok(Self {
            http: HttpClient::long_running(&config.client_options, config.credential.clone())?,
            endpoint: config.client_options.resource_manager_endpoint().to_string(),
            subscription_id: config.subscription_id.clone(),
            cancel: config.cancel.clone(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `{endpoint}/subscriptions/{id}/providers/{provider_path}?api-version={v}`
    pub fn provider_url(&self, provider_path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/providers/{}?api-version={}",
            self.endpoint,
            self.subscription_id,
            provider_path.trim_start_matches('/'),
            api_version
        )
    }

    /// `{endpoint}{resource_path}?api-version={v}` for a path starting with `/`
    pub fn resource_url(&self, resource_path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, resource_path, api_version)
    }

    /// Every item of a provider collection in the subscription
    pub async fn list<T: DeserializeOwned>(
        &self,
        provider_path: &str,
        api_version: &str,
    ) -> Result<Vec<T>, ClientError> {
        self.list_url(self.provider_url(provider_path, api_version))
            .await
    }

    /// Every item of a collection starting at `url`
    pub async fn list_url<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, ClientError> {
        collect_pages(&self.http, url, &self.cancel).await
    }

    /// Single resource
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource_path: &str,
        api_version: &str,
    ) -> Result<T, ClientError> {
        self.http
            .get_json(&self.resource_url(resource_path, api_version), &self.cancel)
            .await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, ClientError> {
        self.http.post(url, body, &self.cancel).await?.json(url)
    }
}
