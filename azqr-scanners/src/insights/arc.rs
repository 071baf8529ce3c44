//! SQL Server instances enabled by Azure Arc

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use azqr_core::domain::{ArcSqlResult, Filters};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use crate::rows::{field, subscription_ids};

const ARC_SQL_QUERY: &str = r#"resources
    | where type =~ "Microsoft.AzureArcData/sqlServerInstances"
    | extend SQLInstance = id, AzureArcServer = tolower(tostring(properties.containerResourceId))
    | extend version = tostring(properties.version)
    | extend edition = tostring(properties.edition)
    | extend Build = tostring(properties.currentVersion)
    | extend DefenderStatus = tostring(properties.azureDefenderStatus)
    | extend patchLevel = tostring(properties.patchLevel)
    | extend vcores = toint(properties.vCore)
    | join kind=inner (resources
    | where type == 'microsoft.hybridcompute/machines/extensions'
    | where properties.type == "WindowsAgent.SqlServer"
    | order by ['id'] asc
    | extend License = case(properties.settings.LicenseType == "Paid", "SA", properties.settings.LicenseType == "PAYG", "PAYG", "unset")
    | extend Serverid = tolower(tostring(split(id, '/extensions/WindowsAgent.SqlServer')[0]))
    | parse properties with * 'uploadStatus : ' DPSStatus ';' *
    | parse properties with * 'telemetryUploadStatus : ' TELStatusRaw ';' *
    | extend DPSStatus = iff(DPSStatus == "", "No Data", DPSStatus)
    | extend TELStatuslogs = (parse_json(replace('.\"', '\"', TELStatusRaw))).logs
    | extend TELStatus = iff(TELStatuslogs.status == "OK", "__", iff(TELStatuslogs.message == "", "No Data", TELStatuslogs.message))
    ) on $left.AzureArcServer == $right.Serverid
    | join kind=inner (resources
    | where type == "microsoft.hybridcompute/machines"
    | extend status = tostring(properties.status)
    | project id = tolower(id), status) on $left.AzureArcServer == $right.id
    | project subscriptionId, status, AzureArcServer, SQLInstance, resourceGroup, version, Build,
        patchLevel, edition, vcores, License, DPSStatus, TELStatus, DefenderStatus"#;

/// Arc-enabled SQL instances with their host machine status
pub async fn list_arc_sql(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    filters: &Filters,
    cancel: &CancellationToken,
) -> Result<Vec<ArcSqlResult>, ClientError> {
    info!("Scanning Arc-enabled SQL Servers");
    let result = graph
        .query(ARC_SQL_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    let instances: Vec<ArcSqlResult> = result
        .data
        .iter()
        .filter(|row| !filters.is_subscription_excluded(&field(row, "subscriptionId")))
        .filter(|row| !filters.is_service_excluded(&field(row, "SQLInstance")))
        .map(|row| {
            let subscription_id = field(row, "subscriptionId");
            ArcSqlResult {
                subscription_name: subscriptions
                    .get(&subscription_id)
                    .cloned()
                    .unwrap_or_default(),
                subscription_id,
                status: field(row, "status"),
                azure_arc_server: field(row, "AzureArcServer"),
                sql_instance: field(row, "SQLInstance"),
                resource_group: field(row, "resourceGroup"),
                version: field(row, "version"),
                build: field(row, "Build"),
                patch_level: field(row, "patchLevel"),
                edition: field(row, "edition"),
                vcores: field(row, "vcores"),
                license: field(row, "License"),
                dpsa_status: field(row, "DPSStatus"),
                telemetry_status: field(row, "TELStatus"),
                defender_status: field(row, "DefenderStatus"),
            }
        })
        .collect();

    debug!(count = instances.len(), "Arc SQL instances collected");
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::testing::{StaticGraph, filters_for};
    use azqr_core::domain::FilterSpec;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscription_name_comes_from_discovery() {
        let graph = StaticGraph::new(vec![json!({
            "subscriptionId": "s1",
            "status": "Connected",
            "SQLInstance": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.AzureArcData/sqlServerInstances/srv01",
            "vcores": 8,
            "License": "PAYG"
        })]);
        let filters = filters_for(&["Microsoft.AzureArcData/sqlServerInstances"], FilterSpec::default());
        let subscriptions = BTreeMap::from([("s1".to_string(), "Alpha".to_string())]);

        let instances = list_arc_sql(&graph, &subscriptions, &filters, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].subscription_name, "Alpha");
        assert_eq!(instances[0].vcores, "8");
        assert_eq!(instances[0].status, "Connected");
    }
}
