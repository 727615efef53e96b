use crate::error::RulesError;

use super::expression::{Comparison, MetricExpression};

pub const STATUS_CODE_METRIC: &str = "StatusCode";
/// Applied when an iteration leaves its error status filter unset.
pub const DEFAULT_ERROR_FILTER: &str = "StatusCode >= 400";

const DEFAULT_ERROR_THRESHOLD: f64 = 400.0;

/// A set of `StatusCode` expressions; a status matches when any of them
/// matches.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFilterSet {
    filters: Vec<MetricExpression>,
}

impl StatusFilterSet {
    /// Parses one expression per entry. A bare status code such as `"503"`
    /// is shorthand for `StatusCode = 503`.
    ///
    /// # Errors
    ///
    /// Returns an error when an entry does not parse or does not test
    /// `StatusCode`.
    pub fn parse<S>(expressions: &[S]) -> Result<Self, RulesError>
    where
        S: AsRef<str>,
    {
        let filters = expressions
            .iter()
            .map(|expression| parse_filter(expression.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    #[must_use]
    pub fn default_errors() -> Self {
        Self {
            filters: vec![MetricExpression {
                metric: STATUS_CODE_METRIC.to_owned(),
                operator: Comparison::GreaterOrEqual,
                threshold: DEFAULT_ERROR_THRESHOLD,
                threshold_max: None,
            }],
        }
    }

    #[must_use]
    pub fn matches(&self, status_code: u16) -> bool {
        let value = f64::from(status_code);
        self.filters.iter().any(|filter| filter.matches(value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    #[must_use]
    pub fn expressions(&self) -> &[MetricExpression] {
        &self.filters
    }
}

fn parse_filter(expression: &str) -> Result<MetricExpression, RulesError> {
    if let Ok(code) = expression.trim().parse::<u16>() {
        return Ok(MetricExpression {
            metric: STATUS_CODE_METRIC.to_owned(),
            operator: Comparison::Equal,
            threshold: f64::from(code),
            threshold_max: None,
        });
    }
    let parsed = MetricExpression::parse(expression)?;
    if !parsed.metric.eq_ignore_ascii_case(STATUS_CODE_METRIC) {
        return Err(RulesError::NotAStatusFilter {
            expression: expression.to_owned(),
            metric: parsed.metric,
        });
    }
    Ok(parsed)
}

impl Default for StatusFilterSet {
    fn default() -> Self {
        Self::default_errors()
    }
}
