//! Actual cost per service through the Cost Management query API

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use azqr_core::domain::{
    CostResult, CostResultItem, ScanError, ScannerConfig, mask_subscription_id,
};

use crate::arm::ArmClient;
use crate::rows::render;

pub const COST_API_VERSION: &str = "2023-03-01";

/// Date range a cost query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl CostPeriod {
    /// From the first day of the month three months back, up to `now`
    pub fn last_three_months(now: DateTime<Utc>) -> Self {
        Self {
            from: month_start(now.date_naive(), 3),
            to: now,
        }
    }

    /// The whole previous calendar month
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        Self {
            from: month_start(now.date_naive(), 1),
            to: month_start(now.date_naive(), 0) - Duration::seconds(1),
        }
    }

    pub fn for_option(previous_month: bool, now: DateTime<Utc>) -> Self {
        if previous_month {
            Self::previous_month(now)
        } else {
            Self::last_three_months(now)
        }
    }
}

fn month_start(date: NaiveDate, months_back: u32) -> DateTime<Utc> {
    date.with_day(1)
        .and_then(|d| d.checked_sub_months(Months::new(months_back)))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or_default()
}

fn query_body(period: &CostPeriod) -> Value {
    json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": {
            "from": period.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            "to": period.to.to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        "dataset": {
            "granularity": "None",
            "aggregation": {
                "totalCost": {"name": "Cost", "function": "Sum"}
            },
            "grouping": [
                {"type": "Dimension", "name": "ServiceName"}
            ]
        }
    })
}

#[derive(Debug, Default, Deserialize)]
struct QueryResult {
    #[serde(default)]
    properties: QueryProperties,
}

#[derive(Debug, Default, Deserialize)]
struct QueryProperties {
    /// `[cost, service name, currency]`
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Cost query for one subscription. Each worker owns its own instance.
#[derive(Debug, Clone)]
pub struct CostScanner {
    client: ArmClient,
    subscription_name: String,
}

impl CostScanner {
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        Ok(Self {
            client: ArmClient::new(config)?,
            subscription_name: config.subscription_name.clone(),
        })
    }

    pub async fn query_costs(&self, period: CostPeriod) -> Result<CostResult, ScanError> {
        let subscription_id = self.client.subscription_id();
        info!(
            subscription = %mask_subscription_id(subscription_id),
            "Scanning subscription for Costs"
        );

        let url = self
            .client
            .provider_url("Microsoft.CostManagement/query", COST_API_VERSION);
        let result: QueryResult = self.client.post(&url, &query_body(&period)).await?;

        let items: Vec<CostResultItem> = result
            .properties
            .rows
            .iter()
            .map(|row| CostResultItem {
                subscription_id: subscription_id.to_string(),
                subscription_name: self.subscription_name.clone(),
                service_name: render(row.get(1)),
                value: render(row.get(0)),
                currency: render(row.get(2)),
            })
            .collect();

        debug!(items = items.len(), "Cost rows received");
        Ok(CostResult {
            from: period.from,
            to: period.to,
            items,
        })
    }
}
