use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Expression must not be empty.")]
    EmptyExpression,
    #[error("Expression '{expression}' is missing an operator.")]
    MissingOperator { expression: String },
    #[error("Unknown operator '{operator}' in '{expression}'.")]
    UnknownOperator {
        expression: String,
        operator: String,
    },
    #[error("Expression '{expression}' is missing a threshold.")]
    MissingThreshold { expression: String },
    #[error("Invalid threshold '{value}' in '{expression}': {source}")]
    InvalidThreshold {
        expression: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("'between' in '{expression}' requires '<value> and <value2>'.")]
    MissingUpperBound { expression: String },
    #[error("Lower bound exceeds upper bound in '{expression}'.")]
    InvertedRange { expression: String },
    #[error("Unexpected trailing input in '{expression}'.")]
    TrailingInput { expression: String },
    #[error("Status filter '{expression}' must test StatusCode, not '{metric}'.")]
    NotAStatusFilter { expression: String, metric: String },
    #[error("Unknown metric '{metric}'.")]
    UnknownMetric { metric: String },
}
