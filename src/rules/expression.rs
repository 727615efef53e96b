use std::fmt;
use std::str::FromStr;

use crate::error::RulesError;

const BETWEEN: &str = "between";
const AND: &str = "and";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Between,
}

impl Comparison {
    fn parse(token: &str) -> Option<Self> {
        let comparison = match token {
            "=" => Comparison::Equal,
            "!=" => Comparison::NotEqual,
            ">" => Comparison::Greater,
            "<" => Comparison::Less,
            ">=" => Comparison::GreaterOrEqual,
            "<=" => Comparison::LessOrEqual,
            other if other.eq_ignore_ascii_case(BETWEEN) => Comparison::Between,
            _ => return None,
        };
        Some(comparison)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::Greater => ">",
            Comparison::Less => "<",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessOrEqual => "<=",
            Comparison::Between => BETWEEN,
        }
    }
}

/// `<MetricName> <operator> <value> [and <value2>]`.
///
/// `between` is inclusive on both ends and requires the second value; the
/// other operators accept and ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricExpression {
    pub metric: String,
    pub operator: Comparison,
    pub threshold: f64,
    pub threshold_max: Option<f64>,
}

impl MetricExpression {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns an error when the expression is empty, uses an unknown
    /// operator, has a non-numeric threshold, or misuses `and`.
    pub fn parse(expression: &str) -> Result<Self, RulesError> {
        let mut tokens = expression.split_whitespace();
        let metric = tokens.next().ok_or(RulesError::EmptyExpression)?;
        let operator_token = tokens
            .next()
            .ok_or_else(|| RulesError::MissingOperator {
                expression: expression.to_owned(),
            })?;
        let operator =
            Comparison::parse(operator_token).ok_or_else(|| RulesError::UnknownOperator {
                expression: expression.to_owned(),
                operator: operator_token.to_owned(),
            })?;
        let threshold_token = tokens
            .next()
            .ok_or_else(|| RulesError::MissingThreshold {
                expression: expression.to_owned(),
            })?;
        let threshold = parse_threshold(expression, threshold_token)?;

        let threshold_max = match tokens.next() {
            Some(keyword) if keyword.eq_ignore_ascii_case(AND) => {
                let upper = tokens
                    .next()
                    .ok_or_else(|| RulesError::MissingUpperBound {
                        expression: expression.to_owned(),
                    })?;
                let upper = parse_threshold(expression, upper)?;
                (operator == Comparison::Between).then_some(upper)
            }
            Some(_) => {
                return Err(RulesError::TrailingInput {
                    expression: expression.to_owned(),
                });
            }
            None => None,
        };
        if tokens.next().is_some() {
            return Err(RulesError::TrailingInput {
                expression: expression.to_owned(),
            });
        }

        match (operator, threshold_max) {
            (Comparison::Between, None) => {
                return Err(RulesError::MissingUpperBound {
                    expression: expression.to_owned(),
                });
            }
            (Comparison::Between, Some(upper)) if upper < threshold => {
                return Err(RulesError::InvertedRange {
                    expression: expression.to_owned(),
                });
            }
            _ => {}
        }

        Ok(Self {
            metric: metric.to_owned(),
            operator,
            threshold,
            threshold_max,
        })
    }

    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        match self.operator {
            Comparison::Equal => value.total_cmp(&self.threshold).is_eq(),
            Comparison::NotEqual => value.total_cmp(&self.threshold).is_ne(),
            Comparison::Greater => value > self.threshold,
            Comparison::Less => value < self.threshold,
            Comparison::GreaterOrEqual => value >= self.threshold,
            Comparison::LessOrEqual => value <= self.threshold,
            Comparison::Between => {
                let upper = self.threshold_max.unwrap_or(self.threshold);
                value >= self.threshold && value <= upper
            }
        }
    }
}

impl FromStr for MetricExpression {
    type Err = RulesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for MetricExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.metric,
            self.operator.as_str(),
            self.threshold
        )?;
        if let Some(upper) = self.threshold_max {
            write!(f, " {} {}", AND, upper)?;
        }
        Ok(())
    }
}

fn parse_threshold(expression: &str, token: &str) -> Result<f64, RulesError> {
    token
        .parse::<f64>()
        .map_err(|source| RulesError::InvalidThreshold {
            expression: expression.to_owned(),
            value: token.to_owned(),
            source,
        })
}
