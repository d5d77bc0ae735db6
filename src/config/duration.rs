//! Duration-string parsing: `"500"` (ms), `"1s"`, `"1m"`.

use crate::error::InvalidConfigKind;

pub fn parse_duration_ms(raw: &str) -> Result<u64, InvalidConfigKind> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InvalidConfigKind::BadDuration(raw.to_string()));
    }

    let (digits, unit) = match raw.strip_suffix("ms") {
        Some(d) => (d, "ms"),
        None => match raw.strip_suffix('s') {
            Some(d) => (d, "s"),
            None => match raw.strip_suffix('m') {
                Some(d) => (d, "m"),
                None => (raw, "ms"),
            },
        },
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| InvalidConfigKind::BadDuration(raw.to_string()))?;

    let ms = match unit {
        "ms" => value,
        "s" => value.checked_mul(1_000),
        "m" => value.checked_mul(60_000),
        _ => unreachable!(),
    }
    .ok_or_else(|| InvalidConfigKind::BadDuration(raw.to_string()))?;

    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_milliseconds() {
        assert_eq!(parse_duration_ms("500").unwrap(), 500);
    }

    #[test]
    fn parses_seconds() {
        assert_eq!(parse_duration_ms("1s").unwrap(), 1_000);
    }

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_duration_ms("soon").is_err());
        assert!(parse_duration_ms("").is_err());
    }
}
