//! Scan model shared by scanners, plugins and the pipeline

pub mod errors;
pub mod filters;
pub mod recommendation;
pub mod resource_id;
pub mod results;
pub mod scan_params;
pub mod scanner;
pub mod stage_config;
pub mod stage_options;

pub use errors::{SKIPPABLE_ERROR_CODES, contains_skippable_error, is_skippable_error_code};
pub use filters::{
    ExcludeFilter, FilterError, FilterSpec, Filters, IncludeFilter, load_filters,
    validate_resource_group_id,
};
pub use recommendation::{
    AprlRecommendation, AzqrRecommendation, AzqrResult, LearnMoreLink, RecommendationCategory,
    RecommendationDefinition, RecommendationEngine, RecommendationImpact, RecommendationType,
    RuleSet,
};
pub use resource_id::{
    build_resource_id, mask_subscription_id, mask_subscription_id_in_resource_id,
    resource_group_from_resource_id, resource_group_id_from_resource_id,
    resource_name_from_resource_id, resource_type_from_resource_id, subscription_from_resource_id,
};
pub use results::{
    AdvisorResult, AprlResult, ArcSqlResult, AzqrServiceResult, AzurePolicyResult, CostResult,
    CostResultItem, DefenderRecommendation, DefenderResult, Resource, ResourceInfo,
    ResourceTypeCount,
};
pub use scan_params::{PluginScanArgs, ScanArgs, ScanParams, ScanParamsError};
pub use scanner::{RuleContext, ScanError, Scanner, ScannerConfig, ScannerRegistry};
pub use stage_config::{
    STAGE_ADVISOR, STAGE_ARC, STAGE_COST, STAGE_DEFENDER, STAGE_DEFENDER_RECOMMENDATIONS,
    STAGE_DIAGNOSTICS, STAGE_GRAPH, STAGE_POLICY, STAGE_REGISTRY, StageConfig, StageConfigError,
    StageConfigs, is_valid_stage_name,
};
pub use stage_options::{
    COST_PREVIOUS_MONTH, OptionSpec, OptionType, OptionValue, StageOptionError, StageOptions,
    option_registry, parse_and_validate_stage_params,
};
