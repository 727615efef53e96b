use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{IterationContext, TerminationRule};
use crate::metrics::{MetricFetcher, MetricName, MetricQuery};

use super::service::{RuleCacheKey, RuleService};

/// Polled once per scheduler cycle.
#[async_trait]
pub trait TerminationCheck: Send + Sync {
    async fn is_termination_required(
        &self,
        iteration: &IterationContext,
        cancel: &CancellationToken,
    ) -> bool;

    /// Called once when the iteration's command completes.
    fn iteration_finished(&self, _iteration: &IterationContext) {}
}

pub struct TerminationChecker {
    rules: RuleService,
    fetcher: Arc<dyn MetricFetcher>,
}

impl TerminationChecker {
    #[must_use]
    pub fn new(fetcher: Arc<dyn MetricFetcher>) -> Self {
        Self {
            rules: RuleService::new(),
            fetcher,
        }
    }

    #[must_use]
    pub const fn rules(&self) -> &RuleService {
        &self.rules
    }
}

#[async_trait]
impl TerminationCheck for TerminationChecker {
    async fn is_termination_required(
        &self,
        iteration: &IterationContext,
        cancel: &CancellationToken,
    ) -> bool {
        if iteration
            .termination_rules
            .iter()
            .all(TerminationRule::is_noop)
        {
            return false;
        }

        let key = RuleCacheKey::for_iteration(iteration);
        let compiled = match self.rules.compiled(&key, &iteration.termination_rules) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!(fqdn = %iteration.fqdn, "Ignoring termination rules: {}", err);
                return false;
            }
        };

        for rule in compiled.iter() {
            let query = MetricQuery::new(&iteration.fqdn, MetricName::ErrorRate)
                .within(rule.grace_period)
                .with_error_filter(&rule.filter);
            match self.fetcher.metric_value(&query, cancel).await {
                Ok(error_rate) if error_rate > rule.max_error_rate => {
                    info!(
                        fqdn = %iteration.fqdn,
                        error_rate,
                        max_error_rate = rule.max_error_rate,
                        grace_period_ms = rule.grace_period.as_millis(),
                        "Termination rule fired."
                    );
                    return true;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(fqdn = %iteration.fqdn, "Failed to fetch error rate: {}", err);
                }
            }
        }
        false
    }

    fn iteration_finished(&self, iteration: &IterationContext) {
        self.rules.evict(&RuleCacheKey::for_iteration(iteration));
    }
}
