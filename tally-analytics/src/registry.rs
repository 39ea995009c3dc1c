//! Analysis registry

use std::collections::BTreeMap;

use crate::analyses::{GroupAndAggregate, SalesByRegion, UserActivitySummary};
use crate::service::AnalysisService;

type Factory = fn() -> Box<dyn AnalysisService>;

/// Name-to-factory table of the analyses a deployment exposes.
#[derive(Debug, Default)]
pub struct AnalysisRegistry {
    factories: BTreeMap<&'static str, Factory>,
}

impl AnalysisRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in analyses.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SalesByRegion::NAME, || Box::new(SalesByRegion));
        registry.register(UserActivitySummary::NAME, || Box::new(UserActivitySummary));
        registry.register(GroupAndAggregate::NAME, || Box::new(GroupAndAggregate));
        registry
    }

    /// Register a factory under a name, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, factory: Factory) {
        self.factories.insert(name, factory);
    }

    /// Instantiate the named analysis.
    pub fn get(&self, name: &str) -> Option<Box<dyn AnalysisService>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn available(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Split requested names into (known, unknown), preserving request order.
    pub fn validate(&self, names: &[String]) -> (Vec<String>, Vec<String>) {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            if self.contains(name) {
                known.push(name.clone());
            } else {
                unknown.push(name.clone());
            }
        }
        (known, unknown)
    }
}

// =============================================================================
// TESTS
// =============================================================================
