use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ValidationError;

use super::iteration::Iteration;

#[derive(Debug, Clone)]
pub struct Round {
    pub name: String,
    pub number_of_clients: usize,
    /// Spacing between client starts.
    pub arrival_delay: Option<Duration>,
    pub iterations: Vec<Arc<Iteration>>,
}

#[derive(Debug, Clone)]
pub struct TestPlan {
    pub name: String,
    pub rounds: Vec<Round>,
}

impl TestPlan {
    /// Checks plan structure. Iteration limits are validated per iteration
    /// when its command is created so one bad iteration does not block the
    /// rest of the plan.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names, empty rounds, zero clients or
    /// duplicate iteration names within a round.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyPlanName);
        }
        if self.rounds.is_empty() {
            return Err(ValidationError::NoRounds {
                plan: self.name.clone(),
            });
        }
        for round in &self.rounds {
            round.validate()?;
        }
        Ok(())
    }

    /// Every iteration whose limits do not fit its mode.
    #[must_use]
    pub fn invalid_iterations(&self) -> Vec<(String, String, ValidationError)> {
        self.rounds
            .iter()
            .flat_map(|round| {
                round.iterations.iter().filter_map(|iteration| {
                    iteration
                        .validate()
                        .err()
                        .map(|err| (round.name.clone(), iteration.name.clone(), err))
                })
            })
            .collect()
    }
}

impl Round {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyRoundName);
        }
        if self.number_of_clients == 0 {
            return Err(ValidationError::ZeroClients {
                round: self.name.clone(),
            });
        }
        if self.iterations.is_empty() {
            return Err(ValidationError::NoIterations {
                round: self.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for iteration in &self.iterations {
            if iteration.name.trim().is_empty() {
                return Err(ValidationError::EmptyIterationName {
                    round: self.name.clone(),
                });
            }
            if !seen.insert(iteration.name.as_str()) {
                return Err(ValidationError::DuplicateIteration {
                    round: self.name.clone(),
                    iteration: iteration.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Fully qualified iteration name used as the metrics key.
#[must_use]
pub fn fqdn(plan: &str, round: &str, iteration: &str) -> String {
    format!("{}.{}.{}", plan, round, iteration)
}
