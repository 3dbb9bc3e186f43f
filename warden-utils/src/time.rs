use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// First second of 2015, the epoch Discord snowflakes count from (milliseconds).
const DISCORD_EPOCH_MILLIS: i64 = 1_420_070_400_000;

/// Return the current unix timestamp in seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Creation time encoded in a Discord snowflake, with millisecond precision.
pub fn snowflake_timestamp(id: u64) -> DateTime<Utc> {
    let millis = i64::try_from(id >> 22)
        .unwrap_or(0)
        .saturating_add(DISCORD_EPOCH_MILLIS);
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Convert a unix timestamp in seconds into a UTC datetime.
pub fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::snowflake_timestamp;

    #[test]
    fn decodes_snowflake_milliseconds() {
        // Example snowflake from the Discord API reference.
        let when = snowflake_timestamp(175_928_847_299_117_063);
        assert_eq!(when.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn zero_snowflake_is_the_discord_epoch() {
        assert_eq!(snowflake_timestamp(0).timestamp_millis(), 1_420_070_400_000);
    }
}
