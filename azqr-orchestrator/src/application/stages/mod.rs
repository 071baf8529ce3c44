//! Concrete pipeline stages

pub mod cost;
pub mod diagnostics;
pub mod discovery;
pub mod graph;
pub mod initialization;
pub mod insights;
pub mod plugins;
pub mod profiling;
pub mod report;
pub mod service;

pub use cost::CostStage;
pub use diagnostics::DiagnosticsStage;
pub use discovery::{ResourceDiscoveryStage, SubscriptionDiscoveryStage};
pub use graph::GraphScanStage;
pub use initialization::InitializationStage;
pub use insights::{AdvisorStage, ArcSqlStage, DefenderRecommendationsStage, DefenderStage, PolicyStage};
pub use plugins::PluginExecutionStage;
pub use profiling::{ProfilingCleanupStage, ProfilingStage};
pub use report::ReportRenderingStage;
pub use service::ServiceScanStage;
