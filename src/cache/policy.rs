use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// TTL applied to intervals missing from the table.
pub const DEFAULT_TTL_SECS: u64 = 300;

const KEY_PREFIX: &str = "prediction";

/// Interval → TTL in seconds. Shorter horizons go stale faster.
const TTL_TABLE: [(&str, u64); 6] = [
    ("1m", 30),
    ("5m", 120),
    ("10m", 240),
    ("15m", 300),
    ("30m", 600),
    ("1h", 900),
];

/// Prediction horizon supported by the serving path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::TenMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::TenMinutes => "10m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        ttl_for(self.as_str())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid interval: must be one of {}",
                    supported_intervals().join(", ")
                )
            })
    }
}

pub fn supported_intervals() -> Vec<&'static str> {
    Interval::ALL.iter().map(Interval::as_str).collect()
}

/// Canonical cache key: `prediction:{lowercase symbol}:{interval}`.
pub fn make_key(symbol: &str, interval: Interval) -> String {
    format!("{KEY_PREFIX}:{}:{}", symbol.to_lowercase(), interval)
}

/// Look up the TTL for an interval label, falling back to [`DEFAULT_TTL_SECS`].
pub fn ttl_for(interval: &str) -> u64 {
    TTL_TABLE
        .iter()
        .find(|(label, _)| *label == interval)
        .map(|(_, ttl)| *ttl)
        .unwrap_or(DEFAULT_TTL_SECS)
}

/// The full interval → TTL table, in horizon order.
pub fn ttl_table() -> impl Iterator<Item = (&'static str, u64)> {
    TTL_TABLE.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key_folds_symbol_case() {
        assert_eq!(
            make_key("AAPL", Interval::FiveMinutes),
            make_key("aapl", Interval::FiveMinutes)
        );
        assert_eq!(
            make_key("AaPl", Interval::FiveMinutes),
            "prediction:aapl:5m"
        );
    }

    #[test]
    fn test_make_key_distinguishes_intervals() {
        assert_ne!(
            make_key("AAPL", Interval::FiveMinutes),
            make_key("AAPL", Interval::OneMinute)
        );
        assert_ne!(
            make_key("AAPL", Interval::OneHour),
            make_key("MSFT", Interval::OneHour)
        );
    }

    #[test]
    fn test_ttl_table_values() {
        assert_eq!(ttl_for("1m"), 30);
        assert_eq!(ttl_for("5m"), 120);
        assert_eq!(ttl_for("10m"), 240);
        assert_eq!(ttl_for("15m"), 300);
        assert_eq!(ttl_for("30m"), 600);
        assert_eq!(ttl_for("1h"), 900);
    }

    #[test]
    fn test_unknown_interval_uses_default_ttl() {
        assert_eq!(ttl_for("unknown"), 300);
        assert_eq!(ttl_for(""), DEFAULT_TTL_SECS);
        assert_eq!(ttl_for("1H"), DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_interval_ttl_matches_table() {
        for (label, ttl) in ttl_table() {
            let interval: Interval = label.parse().unwrap();
            assert_eq!(interval.ttl_secs(), ttl);
        }
    }

    #[test]
    fn test_interval_parse_rejects_unsupported() {
        let err = "2h".parse::<Interval>().unwrap_err();
        assert!(err.contains("1m, 5m, 10m, 15m, 30m, 1h"));
        assert!("5M".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_serde_uses_wire_labels() {
        let json = serde_json::to_string(&Interval::ThirtyMinutes).unwrap();
        assert_eq!(json, "\"30m\"");
        let parsed: Interval = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(parsed, Interval::OneHour);
    }
}
