use thiserror::Error;

/// Longest sanction the platform accepts: 28 days.
pub const MAX_SANCTION_SECONDS: u64 = 28 * 24 * 60 * 60;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration format `{0}`")]
    InvalidFormat(String),
    #[error("duration of {seconds}s exceeds the {max_seconds}s ceiling")]
    TooLong { seconds: u64, max_seconds: u64 },
}

/// Parse a compact duration token like `30s`, `10m`, `2h` or `1d` into seconds,
/// rejecting anything longer than [`MAX_SANCTION_SECONDS`].
pub fn parse_duration_seconds(raw: &str) -> Result<u64, DurationError> {
    parse_duration_with_ceiling(raw, MAX_SANCTION_SECONDS)
}

/// Same as [`parse_duration_seconds`] with a caller-supplied ceiling.
///
/// The token must be a run of ASCII digits followed by exactly one unit
/// character. Format problems and the ceiling produce different errors so
/// callers can tell the user which one they hit.
pub fn parse_duration_with_ceiling(raw: &str, max_seconds: u64) -> Result<u64, DurationError> {
    let value = raw.trim();
    let invalid = || DurationError::InvalidFormat(value.to_owned());

    let Some(unit) = value.chars().last() else {
        return Err(invalid());
    };
    let multiplier = unit_seconds(unit).ok_or_else(invalid)?;

    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }

    let too_long = |seconds| DurationError::TooLong {
        seconds,
        max_seconds,
    };

    // All digits but no u64 fits: the number is valid, just absurdly large.
    let number = digits.parse::<u64>().map_err(|_| too_long(u64::MAX))?;
    if number == 0 {
        return Err(invalid());
    }

    let seconds = number
        .checked_mul(multiplier)
        .ok_or_else(|| too_long(u64::MAX))?;
    if seconds > max_seconds {
        return Err(too_long(seconds));
    }

    Ok(seconds)
}

fn unit_seconds(unit: char) -> Option<u64> {
    match unit.to_ascii_lowercase() {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        _ => None,
    }
}

/// Parse a user reference: `<@123>`, `<@!123>` or a bare id.
pub fn parse_user_reference(raw: &str) -> Option<u64> {
    let value = raw.trim();
    let inner = match value.strip_prefix("<@") {
        Some(rest) => {
            let rest = rest.strip_suffix('>')?;
            rest.strip_prefix('!').unwrap_or(rest)
        }
        None => value,
    };

    if inner.is_empty() || !inner.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    inner.parse::<u64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::{
        DurationError, MAX_SANCTION_SECONDS, parse_duration_seconds, parse_duration_with_ceiling,
        parse_user_reference,
    };

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration_seconds("45s"), Ok(45));
        assert_eq!(parse_duration_seconds("30m"), Ok(30 * 60));
        assert_eq!(parse_duration_seconds("1h"), Ok(3_600));
        assert_eq!(parse_duration_seconds("2d"), Ok(2 * 86_400));
        assert_eq!(parse_duration_seconds(" 10M "), Ok(600));
    }

    #[test]
    fn rejects_bad_suffix_and_bad_number_as_format_errors() {
        for raw in ["", "h", "10", "10w", "abc", "1.5h", "-1h", "+1h", "1 h", "0m"] {
            assert!(
                matches!(
                    parse_duration_seconds(raw),
                    Err(DurationError::InvalidFormat(_))
                ),
                "{raw:?} should be a format error"
            );
        }
    }

    #[test]
    fn ceiling_is_inclusive_and_distinct() {
        assert_eq!(parse_duration_seconds("28d"), Ok(MAX_SANCTION_SECONDS));
        assert_eq!(
            parse_duration_seconds("29d"),
            Err(DurationError::TooLong {
                seconds: 29 * 86_400,
                max_seconds: MAX_SANCTION_SECONDS,
            })
        );
        assert!(matches!(
            parse_duration_seconds("99999999999999999999999d"),
            Err(DurationError::TooLong { .. })
        ));
        assert!(matches!(
            parse_duration_with_ceiling("61s", 60),
            Err(DurationError::TooLong { seconds: 61, .. })
        ));
    }

    #[test]
    fn parses_user_references() {
        assert_eq!(parse_user_reference("<@123>"), Some(123));
        assert_eq!(parse_user_reference("<@!456>"), Some(456));
        assert_eq!(parse_user_reference("789"), Some(789));
        assert_eq!(parse_user_reference("<@abc>"), None);
        assert_eq!(parse_user_reference("<@123"), None);
        assert_eq!(parse_user_reference("@someone"), None);
        assert_eq!(parse_user_reference("0"), None);
    }
}
