//! Engine registry
//!
//! An engine is the pair of strategies that make a job portal harvestable:
//! how to find its advertisements and how to read them. Sources select an
//! engine by name in the configuration.

mod karriere;
mod stepstone;

pub use karriere::{karriere_extractor, KarriereSitemaps};
pub use stepstone::{stepstone_extractor, StepstoneSitemaps};

use crate::extract::Extractor;
use crate::sitemap::LinkEnumerator;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named {LinkEnumerator, Extractor} pair
#[derive(Clone)]
pub struct Engine {
    pub name: String,
    pub enumerator: Arc<dyn LinkEnumerator>,
    pub extractor: Arc<dyn Extractor>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("name", &self.name).finish()
    }
}

/// Maps engine names to their strategies
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Engine>,
}

impl EngineRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `stepstone` and `karriere` engines
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "stepstone",
            Arc::new(StepstoneSitemaps),
            Arc::new(stepstone_extractor()),
        );
        registry.register(
            "karriere",
            Arc::new(KarriereSitemaps),
            Arc::new(karriere_extractor()),
        );
        registry
    }

    /// Registers an engine, replacing any engine of the same name
    pub fn register(
        &mut self,
        name: &str,
        enumerator: Arc<dyn LinkEnumerator>,
        extractor: Arc<dyn Extractor>,
    ) {
        self.engines.insert(
            name.to_string(),
            Engine {
                name: name.to_string(),
                enumerator,
                extractor,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Engine> {
        self.engines.get(name)
    }

    /// Registered engine names in alphabetical order
    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }
}
