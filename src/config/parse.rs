use std::time::Duration;

use crate::error::ValidationError;

/// Parses `<digits>[ms|s|m|h]`; a bare number is seconds. Zero is allowed
/// here and rejected by callers that need a positive value.
///
/// # Errors
///
/// Returns an error for empty input, a missing number, an unknown unit or
/// overflow.
pub fn parse_duration_value(value: &str) -> Result<Duration, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::DurationEmpty);
    }

    let digits_len = value
        .chars()
        .take_while(char::is_ascii_digit)
        .fold(0usize, |len, _| len.saturating_add(1));
    if digits_len == 0 {
        return Err(ValidationError::InvalidDurationFormat {
            value: value.to_owned(),
        });
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part
        .parse()
        .map_err(|source| ValidationError::InvalidDurationNumber {
            value: value.to_owned(),
            source,
        })?;

    let unit = if unit_part.is_empty() { "s" } else { unit_part.trim() };
    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(
            number
                .checked_mul(60)
                .ok_or(ValidationError::DurationOverflow)?,
        ),
        "h" => Duration::from_secs(
            number
                .checked_mul(60)
                .and_then(|minutes| minutes.checked_mul(60))
                .ok_or(ValidationError::DurationOverflow)?,
        ),
        _ => {
            return Err(ValidationError::InvalidDurationUnit {
                unit: unit.to_owned(),
            });
        }
    };
    Ok(duration)
}
