//! Per-run planning state: outer-join marker names and cache ids.

use uuid::Uuid;

use crate::config::{MarkerStrategy, PlannerSettings};

/// Generates cache-mark names for outer joins.
///
/// Names never repeat within one generator, so one generator per planning
/// run is enough to keep marks apart.
#[derive(Debug, Clone)]
pub struct MarkerGenerator {
    strategy: MarkerStrategy,
    prefix: String,
    next: u64,
}

impl MarkerGenerator {
    pub fn new(strategy: MarkerStrategy, prefix: impl Into<String>) -> Self {
        Self {
            strategy,
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_name(&mut self) -> String {
        match self.strategy {
            MarkerStrategy::Sequential => {
                self.next += 1;
                format!("{}_{}", self.prefix, self.next)
            }
            MarkerStrategy::Uuid => format!("{}_{}", self.prefix, Uuid::new_v4().simple()),
        }
    }
}

impl Default for MarkerGenerator {
    fn default() -> Self {
        Self::new(MarkerStrategy::Sequential, "OUTER_JOIN")
    }
}

/// Mutable state shared by every table set of one planning run, including
/// the nested sets used for ON conditions and OR branches.
#[derive(Debug, Clone)]
pub struct PlanContext {
    markers: MarkerGenerator,
    next_cache_id: u64,
    cache_or_branches: bool,
}

impl PlanContext {
    pub fn new(settings: &PlannerSettings) -> Self {
        Self {
            markers: MarkerGenerator::new(settings.markers.strategy, settings.markers.prefix.clone()),
            next_cache_id: 0,
            cache_or_branches: settings.planner.cache_or_branches,
        }
    }

    pub fn next_marker(&mut self) -> String {
        let name = self.markers.next_name();
        tracing::trace!(marker = %name, "allocated outer join marker");
        name
    }

    pub fn next_cache_id(&mut self) -> u64 {
        self.next_cache_id += 1;
        self.next_cache_id
    }

    pub fn cache_or_branches(&self) -> bool {
        self.cache_or_branches
    }
}

impl Default for PlanContext {
    fn default() -> Self {
        Self::new(&PlannerSettings::default())
    }
}
