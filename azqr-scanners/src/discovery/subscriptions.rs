//! Subscriptions visible to the credential, directly or through management groups

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use azqr_core::domain::{Filters, mask_subscription_id};
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::credential::SharedCredential;
use azqr_core::infrastructure::http::{ClientError, HttpClient};

use crate::arm::collect_pages;

pub const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
pub const MANAGEMENT_GROUPS_API_VERSION: &str = "2023-04-01";
const MANAGEMENT_GROUP_TYPE: &str = "Microsoft.Management/managementGroups";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    subscription_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct GroupSubscription {
    name: String,
    #[serde(default)]
    properties: GroupSubscriptionProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GroupSubscriptionProperties {
    display_name: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct Descendant {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Disabled and deleted subscriptions are never scanned
fn is_active(state: &str) -> bool {
    !state.eq_ignore_ascii_case("Disabled") && !state.eq_ignore_ascii_case("Deleted")
}

pub struct SubscriptionDiscovery {
    http: HttpClient,
    endpoint: String,
}

impl SubscriptionDiscovery {
    pub fn new(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(options, credential)?,
            endpoint: options.resource_manager_endpoint().to_string(),
        })
    }

    /// Active subscriptions, restricted to `requested` when it is non-empty,
    /// minus the excluded ones. Keyed by id, valued by display name.
    pub async fn list_subscriptions(
        &self,
        requested: &[String],
        filters: &Filters,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            self.endpoint, SUBSCRIPTIONS_API_VERSION
        );
        let subscriptions: Vec<Subscription> = collect_pages(&self.http, url, cancel).await?;
        let requested: BTreeSet<String> = requested.iter().map(|s| s.to_lowercase()).collect();

        let mut result = BTreeMap::new();
        for subscription in subscriptions.into_iter().filter(|s| is_active(&s.state)) {
            let id = subscription.subscription_id;
            if !requested.is_empty() && !requested.contains(&id.to_lowercase()) {
                continue;
            }
            if filters.is_subscription_excluded(&id) {
                info!("Skipping subscriptions/{}", mask_subscription_id(&id));
                continue;
            }
            result.insert(id, subscription.display_name);
        }

        debug!(count = result.len(), "Subscriptions discovered");
        Ok(result)
    }

    /// Active subscriptions under the groups and all their descendant groups
    pub async fn list_management_group_subscriptions(
        &self,
        groups: &[String],
        filters: &Filters,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        let mut result = BTreeMap::new();
        let mut visited = BTreeSet::new();
        let mut pending: VecDeque<String> = groups.iter().cloned().collect();

        while let Some(group) = pending.pop_front() {
            if !visited.insert(group.to_lowercase()) {
                continue;
            }

            let url = format!(
                "{}/providers/Microsoft.Management/managementGroups/{}/subscriptions?api-version={}",
                self.endpoint, group, MANAGEMENT_GROUPS_API_VERSION
            );
            let subscriptions: Vec<GroupSubscription> =
                collect_pages(&self.http, url, cancel).await?;

            for subscription in subscriptions
                .into_iter()
                .filter(|s| is_active(&s.properties.state))
            {
                if filters.is_subscription_excluded(&subscription.name) {
                    info!("Skipping subscriptions/{}", mask_subscription_id(&subscription.name));
                    continue;
                }
                result.insert(subscription.name, subscription.properties.display_name);
            }

            let url = format!(
                "{}/providers/Microsoft.Management/managementGroups/{}/descendants?api-version={}",
                self.endpoint, group, MANAGEMENT_GROUPS_API_VERSION
            );
            let descendants: Vec<Descendant> = collect_pages(&self.http, url, cancel).await?;
            pending.extend(
                descendants
                    .into_iter()
                    .filter(|d| d.kind.eq_ignore_ascii_case(MANAGEMENT_GROUP_TYPE))
                    .map(|d| d.name),
            );
        }

        debug!(
            groups = visited.len(),
            count = result.len(),
            "Management group subscriptions discovered"
        );
        Ok(result)
    }
}
