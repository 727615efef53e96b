use std::num::FpCategory;
use std::time::Duration;

/// Stops an iteration when the share of responses matching
/// `error_status_codes` within the trailing `grace_period` exceeds
/// `max_error_rate`.
///
/// A rule with no codes, a zero rate and a zero grace period is a no-op and
/// never fires. Any other combination must set all three.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminationRule {
    pub error_status_codes: Vec<String>,
    pub max_error_rate: f64,
    pub grace_period: Duration,
}

impl TerminationRule {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.error_status_codes.is_empty()
            && self.max_error_rate.classify() == FpCategory::Zero
            && self.grace_period.is_zero()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.error_status_codes.is_empty()
            && self.max_error_rate > 0.0
            && !self.grace_period.is_zero()
    }
}
