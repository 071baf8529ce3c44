//! Report container filled in by the pipeline stages

use serde::{Deserialize, Serialize};

use azqr_core::domain::{
    AdvisorResult, AprlRecommendation, AprlResult, ArcSqlResult, AzqrServiceResult,
    AzurePolicyResult, CostResult, DefenderRecommendation, DefenderResult, Resource,
    ResourceTypeCount,
};
use azqr_plugins::{ColumnMetadata, ExternalPluginOutput};
use azqr_scanners::graph::{RecommendationCatalog, insert_recommendation};

/// Table produced by one plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginResult {
    pub plugin_name: String,
    pub sheet_name: String,
    pub description: String,
    pub column_metadata: Vec<ColumnMetadata>,
    /// Header row first
    pub table: Vec<Vec<String>>,
}

impl From<ExternalPluginOutput> for PluginResult {
    fn from(output: ExternalPluginOutput) -> Self {
        Self {
            plugin_name: output.metadata.name,
            sheet_name: output.sheet_name,
            description: output.description,
            column_metadata: output.metadata.column_metadata,
            table: output.table,
        }
    }
}

/// Everything a renderer needs to produce the report
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportData {
    pub output_name: String,
    pub mask: bool,
    /// Lowercase resource type, then recommendation id
    pub recommendations: RecommendationCatalog,
    pub graph: Vec<AprlResult>,
    pub azqr: Vec<AzqrServiceResult>,
    pub resources: Vec<Resource>,
    pub excluded_resources: Vec<Resource>,
    pub resource_type_count: Vec<ResourceTypeCount>,
    pub advisor: Vec<AdvisorResult>,
    pub defender: Vec<DefenderResult>,
    pub defender_recommendations: Vec<DefenderRecommendation>,
    pub policy: Vec<AzurePolicyResult>,
    pub arc_sql: Vec<ArcSqlResult>,
    pub cost: CostResult,
    pub plugin_results: Vec<PluginResult>,
}

impl ReportData {
    pub fn new(output_name: impl Into<String>, mask: bool) -> Self {
        Self {
            output_name: output_name.into(),
            mask,
            ..Self::default()
        }
    }

    /// Catalog entries flattened, ordered by type then id
    pub fn recommendation_list(&self) -> Vec<&AprlRecommendation> {
        self.recommendations.values().flat_map(|r| r.values()).collect()
    }

    pub fn add_recommendation(&mut self, recommendation: AprlRecommendation) {
        insert_recommendation(&mut self.recommendations, recommendation);
    }
}
