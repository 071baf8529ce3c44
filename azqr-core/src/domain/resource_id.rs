//! Helpers for ARM resource ids
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}`
//! splits on `/` into `["", "subscriptions", sub, "resourceGroups", rg,
//! "providers", namespace, type, name, ...]`.

/// Subscription id segment, empty when the id is too short
pub fn subscription_from_resource_id(resource_id: &str) -> String {
    segment(resource_id, 2)
}

/// Resource group name segment
pub fn resource_group_from_resource_id(resource_id: &str) -> String {
    segment(resource_id, 4)
}

/// `/subscriptions/{sub}/resourceGroups/{rg}` prefix
pub fn resource_group_id_from_resource_id(resource_id: &str) -> String {
    let parts: Vec<&str> = resource_id.split('/').collect();
    if parts.len() < 5 {
        return String::new();
    }
    parts[..5].join("/")
}

/// `{namespace}/{type}` of a top-level resource
pub fn resource_type_from_resource_id(resource_id: &str) -> String {
    let parts: Vec<&str> = resource_id.split('/').collect();
    if parts.len() < 8 {
        return String::new();
    }
    format!("{}/{}", parts[6], parts[7])
}

/// Last path segment
pub fn resource_name_from_resource_id(resource_id: &str) -> String {
    resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Build a lowercase resource id from its parts
pub fn build_resource_id(
    subscription_id: &str,
    resource_group: &str,
    resource_type: &str,
    name: &str,
) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
        subscription_id, resource_group, resource_type, name
    )
    .to_lowercase()
}

const MASK_PREFIX: &str = "xxxxxxxx-xxxx-xxxx-xxxx-";

/// Replace everything but the last 12 characters of a subscription id
pub fn mask_subscription_id(subscription_id: &str) -> String {
    let chars: Vec<char> = subscription_id.chars().collect();
    if chars.len() <= 12 {
        return subscription_id.to_string();
    }
    let tail: String = chars[chars.len() - 12..].iter().collect();
    format!("{}{}", MASK_PREFIX, tail)
}

/// Mask the subscription segment inside a resource id
pub fn mask_subscription_id_in_resource_id(resource_id: &str) -> String {
    let subscription = subscription_from_resource_id(resource_id);
    if subscription.is_empty() {
        return resource_id.to_string();
    }
    resource_id.replacen(&subscription, &mask_subscription_id(&subscription), 1)
}

fn segment(resource_id: &str, index: usize) -> String {
    resource_id
        .split('/')
        .nth(index)
        .unwrap_or_default()
        .to_string()
}
