use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::domain::{IterationContext, TerminationRule};
use crate::error::RulesError;

use super::filter::StatusFilterSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleCacheKey {
    pub iteration_id: String,
    pub round_name: String,
}

impl RuleCacheKey {
    #[must_use]
    pub fn for_iteration(iteration: &IterationContext) -> Self {
        Self {
            iteration_id: iteration.iteration_id.clone(),
            round_name: iteration.round_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub filter: StatusFilterSet,
    pub max_error_rate: f64,
    pub grace_period: Duration,
}

/// Parses termination rules once per `(iteration, round)` and hands out the
/// compiled form until the iteration finishes.
#[derive(Debug, Default)]
pub struct RuleService {
    cache: DashMap<RuleCacheKey, Arc<[CompiledRule]>>,
}

impl RuleService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled rules for `key`, compiling and caching on first
    /// use. No-op rules are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when a rule's status filter does not parse.
    pub fn compiled(
        &self,
        key: &RuleCacheKey,
        rules: &[TerminationRule],
    ) -> Result<Arc<[CompiledRule]>, RulesError> {
        if let Some(entry) = self.cache.get(key) {
            return Ok(Arc::clone(entry.value()));
        }
        let entry = self
            .cache
            .entry(key.clone())
            .or_try_insert_with(|| compile(rules).map(Arc::from))?;
        Ok(Arc::clone(entry.value()))
    }

    pub fn evict(&self, key: &RuleCacheKey) -> bool {
        self.cache.remove(key).is_some()
    }

    #[must_use]
    pub fn is_cached(&self, key: &RuleCacheKey) -> bool {
        self.cache.contains_key(key)
    }
}

fn compile(rules: &[TerminationRule]) -> Result<Vec<CompiledRule>, RulesError> {
    rules
        .iter()
        .filter(|rule| !rule.is_noop())
        .map(|rule| {
            Ok(CompiledRule {
                filter: StatusFilterSet::parse(&rule.error_status_codes)?,
                max_error_rate: rule.max_error_rate,
                grace_period: rule.grace_period,
            })
        })
        .collect()
}
