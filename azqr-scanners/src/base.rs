//! Graph-only scanner
//!
//! Declares resource types so the graph stage picks up their recommendations
//! and the resource-type count can mark them as covered. It has no rules of
//! its own and never calls a service API.

use std::collections::BTreeMap;

use async_trait::async_trait;

use azqr_core::domain::{
    AzqrServiceResult, RecommendationDefinition, RuleContext, ScanError, Scanner, ScannerConfig,
};

#[derive(Debug, Clone)]
pub struct BaseScanner {
    resource_types: Vec<String>,
}

impl BaseScanner {
    pub fn new<I, S>(resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_types: resource_types.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Scanner for BaseScanner {
    fn init(&mut self, _config: &ScannerConfig) -> Result<(), ScanError> {
        Ok(())
    }

    async fn scan(&self, _ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
        Ok(Vec::new())
    }

    fn resource_types(&self) -> Vec<String> {
        self.resource_types.clone()
    }

    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
        BTreeMap::new()
    }

    fn clone_box(&self) -> Box<dyn Scanner> {
        Box::new(self.clone())
    }
}
