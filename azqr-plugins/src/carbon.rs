//! Carbon emissions by resource type
//!
//! Asks the carbon optimization API for the latest month with data, then
//! requests an item details report per batch of 100 subscriptions and sums
//! the emissions of each resource type across batches.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use azqr_core::domain::Filters;
use azqr_core::infrastructure::http::{ClientError, HttpClient};

use crate::errors::PluginError;
use crate::internal::{InternalPluginScanner, PluginScanRequest};
use crate::types::{ColumnMetadata, ExternalPluginOutput, FilterType, PluginMetadata, PluginType};

pub const CARBON_PLUGIN_NAME: &str = "carbon-emissions";
pub const CARBON_API_VERSION: &str = "2025-04-01";
pub const CARBON_SHEET_NAME: &str = "Carbon Emissions";
const SUBSCRIPTION_BATCH_SIZE: usize = 100;
const PAGE_SIZE: u32 = 1_000;
const UNIT: &str = "kgCO2e";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailableDateRange {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmissionReport {
    #[serde(default)]
    value: Vec<EmissionItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmissionItem {
    data_type: Option<String>,
    item_name: Option<String>,
    latest_month_emissions: Option<f64>,
    previous_month_emissions: Option<f64>,
    monthly_emissions_change_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Aggregated {
    latest_month: f64,
    previous_month: f64,
    monthly_change_value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EmissionsScanner;

impl EmissionsScanner {
    pub fn new() -> Self {
        Self
    }

    async fn available_month(
        &self,
        http: &HttpClient,
        endpoint: &str,
        request: &PluginScanRequest,
    ) -> Result<NaiveDate, PluginError> {
        let url = format!(
            "{}/providers/Microsoft.Carbon/queryCarbonEmissionDataAvailableDateRange?api-version={}",
            endpoint, CARBON_API_VERSION
        );
        let range: AvailableDateRange = http.post(&url, &json!({}), &request.cancel).await?.json(&url)?;

        let (Some(start), Some(end)) = (range.start_date, range.end_date) else {
            return Err(PluginError::Scan(
                "available date range response missing start or end date".to_string(),
            ));
        };
        let start = parse_date(&start)?;
        let end = parse_date(&end)?;
        debug!(start = %start, end = %end, "Carbon emissions available range");

        Ok(end)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, PluginError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| PluginError::Scan(format!("failed to parse date {raw:?}: {e}")))
}

fn report_body(subscriptions: &[String], month: NaiveDate) -> serde_json::Value {
    let month = month.format(DATE_FORMAT).to_string();
    json!({
        "reportType": "ItemDetailsReport",
        "subscriptionList": subscriptions,
        "carbonScopeList": ["Scope1", "Scope2", "Scope3"],
        "dateRange": { "start": month, "end": month },
        "categoryType": "ResourceType",
        "orderBy": "LatestMonthEmissions",
        "sortDirection": "Desc",
        "pageSize": PAGE_SIZE,
    })
}

fn aggregate(items: Vec<EmissionItem>, filters: &Filters, totals: &mut BTreeMap<String, Aggregated>) {
    for item in items {
        if item
            .data_type
            .as_deref()
            .is_some_and(|t| t != "ItemDetailsData")
        {
            continue;
        }
        let (Some(resource_type), Some(latest)) = (item.item_name, item.latest_month_emissions) else {
            continue;
        };
        if filters.is_resource_type_excluded(&resource_type) {
            continue;
        }

        let entry = totals.entry(resource_type).or_default();
        entry.latest_month += latest;
        entry.previous_month += item.previous_month_emissions.unwrap_or_default();
        entry.monthly_change_value += item.monthly_emissions_change_value.unwrap_or_default();
    }
}

fn format_row(month: &str, resource_type: &str, totals: &Aggregated) -> Vec<String> {
    let previous = if totals.previous_month > 0.0 {
        format!("{:.2}", totals.previous_month)
    } else {
        String::new()
    };
    let ratio = if totals.previous_month != 0.0 {
        let change = (totals.latest_month - totals.previous_month) / totals.previous_month;
        format!("{:.2}%", change * 100.0)
    } else {
        String::new()
    };
    let change_value = if totals.monthly_change_value != 0.0 {
        format!("{:.2}", totals.monthly_change_value)
    } else {
        String::new()
    };

    vec![
        month.to_string(),
        month.to_string(),
        resource_type.to_string(),
        format!("{:.2}", totals.latest_month),
        previous,
        ratio,
        change_value,
        UNIT.to_string(),
    ]
}

#[async_trait]
impl InternalPluginScanner for EmissionsScanner {
    async fn scan(&self, request: &PluginScanRequest) -> Result<ExternalPluginOutput, PluginError> {
        info!("Scanning carbon emissions across subscriptions");

        let http = HttpClient::new(&request.client_options, request.credential.clone())?;
        let endpoint = request.client_options.resource_manager_endpoint().to_string();
        let month = self.available_month(&http, &endpoint, request).await?;
        info!(month = %month, "Carbon emissions month selected");

        let url = format!(
            "{}/providers/Microsoft.Carbon/carbonEmissionReports?api-version={}",
            endpoint, CARBON_API_VERSION
        );
        let subscriptions: Vec<String> = request.subscriptions.keys().cloned().collect();
        let mut totals = BTreeMap::new();

        for (index, batch) in subscriptions.chunks(SUBSCRIPTION_BATCH_SIZE).enumerate() {
            if request.cancel.is_cancelled() {
                return Err(ClientError::Cancelled.into());
            }
            let first = index * SUBSCRIPTION_BATCH_SIZE + 1;
            let last = first + batch.len() - 1;
            info!(first, last, total = subscriptions.len(), "Processing carbon emissions batch");

            let report = match http.post(&url, &report_body(batch, month), &request.cancel).await {
                Ok(response) => response.json::<EmissionReport>(&url),
                Err(err) => Err(err),
            };
            match report {
                Ok(report) => {
                    debug!(items = report.value.len(), "Carbon emission items received");
                    aggregate(report.value, &request.filters, &mut totals);
                }
                Err(err) if err.is_cancelled() => return Err(err.into()),
                Err(err) => {
                    info!(first, last, error = %err, "Carbon emissions data not available for batch");
                }
            }
        }

        let month = month.format(DATE_FORMAT).to_string();
        let mut table = vec![header_row()];
        table.extend(
            totals
                .iter()
                .map(|(resource_type, t)| format_row(&month, resource_type, t)),
        );
        info!(resource_types = totals.len(), "Carbon emissions scan completed");

        Ok(ExternalPluginOutput {
            metadata: self.metadata(),
            sheet_name: CARBON_SHEET_NAME.to_string(),
            description: "Analysis of carbon emissions by Azure resource type for the previous month"
                .to_string(),
            table,
            error: None,
        })
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: CARBON_PLUGIN_NAME.to_string(),
            version: "1.0.0".to_string(),
            description: "Analyzes carbon emissions by Azure resource type".to_string(),
            author: "Azure Quick Review Team".to_string(),
            license: "MIT".to_string(),
            plugin_type: PluginType::Internal,
            command_path: None,
            column_metadata: columns(),
        }
    }
}

fn columns() -> Vec<ColumnMetadata> {
    vec![
        ColumnMetadata::new("Period From", "periodFrom", FilterType::Search),
        ColumnMetadata::new("Period To", "periodTo", FilterType::Search),
        ColumnMetadata::new("Resource Type", "resourceType", FilterType::Dropdown),
        ColumnMetadata::new("Latest Month Emissions", "latestMonthEmissions", FilterType::None),
        ColumnMetadata::new("Previous Month Emissions", "previousMonthEmissions", FilterType::None),
        ColumnMetadata::new(
            "Month-over-Month Change Ratio",
            "monthOverMonthChangeRatio",
            FilterType::None,
        ),
        ColumnMetadata::new("Monthly Change Value", "monthlyChangeValue", FilterType::None),
        ColumnMetadata::new("Unit", "unit", FilterType::None),
    ]
}

fn header_row() -> Vec<String> {
    columns().into_iter().map(|c| c.name).collect()
}
