//! Infrastructure layer - integrations with Azure management APIs

pub mod client_options;
pub mod cloud;
pub mod credential;
pub mod graph;
pub mod http;
pub mod throttling;

pub use client_options::ClientOptions;
pub use cloud::{CloudConfiguration, CloudKind, get_cloud_configuration, get_resource_manager_endpoint};
pub use credential::{
    AccessToken, AzureCliCredential, CredentialError, SharedCredential, StaticTokenCredential,
    TokenCredential,
};
pub use graph::{GraphQuery, GraphQueryClient, GraphResult};
pub use http::{ClientError, HttpClient, HttpError, HttpResponse, RetryOptions};
