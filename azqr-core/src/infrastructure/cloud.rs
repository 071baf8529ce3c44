//! Azure cloud selection
//!
//! Resolution order:
//! 1. `AZURE_AUTHORITY_HOST` and `AZURE_RESOURCE_MANAGER_ENDPOINT` both set: custom cloud,
//!    optionally with `AZURE_RESOURCE_MANAGER_AUDIENCE`
//! 2. `AZURE_CLOUD` naming a known cloud
//! 3. Public cloud (also used for unknown names)

use serde::{Deserialize, Serialize};

pub const AZURE_CLOUD: &str = "AZURE_CLOUD";
pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
pub const AZURE_RESOURCE_MANAGER_ENDPOINT: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";
pub const AZURE_RESOURCE_MANAGER_AUDIENCE: &str = "AZURE_RESOURCE_MANAGER_AUDIENCE";

/// Which cloud a configuration was resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudKind {
    Public,
    Government,
    China,
    Custom,
}

/// Authority host plus the Resource Manager service endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfiguration {
    pub kind: CloudKind,
    pub authority_host: String,
    pub resource_manager_endpoint: String,
    pub resource_manager_audience: Option<String>,
}

impl CloudConfiguration {
    pub fn public() -> Self {
        Self {
            kind: CloudKind::Public,
            authority_host: "https://login.microsoftonline.com/".to_string(),
            resource_manager_endpoint: "https://management.azure.com/".to_string(),
            resource_manager_audience: Some("https://management.core.windows.net/".to_string()),
        }
    }

    pub fn government() -> Self {
        Self {
            kind: CloudKind::Government,
            authority_host: "https://login.microsoftonline.us/".to_string(),
            resource_manager_endpoint: "https://management.usgovcloudapi.net".to_string(),
            resource_manager_audience: Some(
                "https://management.core.usgovcloudapi.net".to_string(),
            ),
        }
    }

    pub fn china() -> Self {
        Self {
            kind: CloudKind::China,
            authority_host: "https://login.chinacloudapi.cn/".to_string(),
            resource_manager_endpoint: "https://management.chinacloudapi.cn".to_string(),
            resource_manager_audience: Some("https://management.core.chinacloudapi.cn".to_string()),
        }
    }

    /// Custom cloud, typically an Azure Stack or sovereign deployment
    pub fn custom(
        authority_host: impl Into<String>,
        resource_manager_endpoint: impl Into<String>,
        resource_manager_audience: Option<String>,
    ) -> Self {
        Self {
            kind: CloudKind::Custom,
            authority_host: authority_host.into(),
            resource_manager_endpoint: resource_manager_endpoint.into(),
            resource_manager_audience,
        }
    }

    /// Map an `AZURE_CLOUD` value to a named cloud. Unknown names resolve to public.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "azuregovernment" | "azureusgovernment" | "usgovernment" => Self::government(),
            "azurechina" | "china" => Self::china(),
            _ => Self::public(),
        }
    }

    /// Resolve from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let (Some(authority), Some(endpoint)) = (
            get(AZURE_AUTHORITY_HOST),
            get(AZURE_RESOURCE_MANAGER_ENDPOINT),
        ) {
            return Self::custom(authority, endpoint, get(AZURE_RESOURCE_MANAGER_AUDIENCE));
        }

        Self::from_name(&get(AZURE_CLOUD).unwrap_or_default())
    }

    /// Resolve from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resource Manager endpoint without a trailing slash
    pub fn resource_manager_endpoint(&self) -> &str {
        self.resource_manager_endpoint.trim_end_matches('/')
    }

    /// Default token scope for Resource Manager calls
    pub fn default_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_endpoint())
    }
}

impl Default for CloudConfiguration {
    fn default() -> Self {
        Self::public()
    }
}

/// Cloud configuration for this process
pub fn get_cloud_configuration() -> CloudConfiguration {
    CloudConfiguration::from_env()
}

/// Resource Manager endpoint for this process, trailing slash stripped
pub fn get_resource_manager_endpoint() -> String {
    get_cloud_configuration().resource_manager_endpoint().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_custom_requires_both_endpoints() {
        let config = CloudConfiguration::from_lookup(lookup(&[(
            AZURE_AUTHORITY_HOST,
            "https://login.example.test/",
        )]));
        assert_eq!(config.kind, CloudKind::Public);

        let config = CloudConfiguration::from_lookup(lookup(&[
            (AZURE_AUTHORITY_HOST, "https://login.example.test/"),
            (AZURE_RESOURCE_MANAGER_ENDPOINT, "https://arm.example.test/"),
        ]));
        assert_eq!(config.kind, CloudKind::Custom);
        assert_eq!(config.resource_manager_audience, None);
        assert_eq!(config.resource_manager_endpoint(), "https://arm.example.test");
    }

    #[test]
    fn test_custom_takes_precedence_over_cloud_name() {
        let config = CloudConfiguration::from_lookup(lookup(&[
            (AZURE_CLOUD, "AzureChina"),
            (AZURE_AUTHORITY_HOST, "https://login.example.test/"),
            (AZURE_RESOURCE_MANAGER_ENDPOINT, "https://arm.example.test"),
            (AZURE_RESOURCE_MANAGER_AUDIENCE, "https://audience.example.test"),
        ]));
        assert_eq!(config.kind, CloudKind::Custom);
        assert_eq!(
            config.resource_manager_audience.as_deref(),
            Some("https://audience.example.test")
        );
    }

    #[test]
    fn test_default_scope() {
        assert_eq!(
            CloudConfiguration::public().default_scope(),
            "https://management.azure.com/.default"
        );
    }
}
