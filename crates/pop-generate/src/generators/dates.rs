use std::sync::OnceLock;

use chrono::{Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use super::DATE_TIME_FORMAT;

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^([+-]?)\s*(\d+)\s*(second|sec|minute|min|hour|day|week|month|year)s?$")
                .ok()
        })
        .as_ref()
}

/// Parse a date argument relative to `now`.
///
/// Accepts `now`, `today`, `yesterday`, `tomorrow`, offsets such as
/// `-30 years` or `+1 day`, and absolute `YYYY-MM-DD[ HH:MM:SS]` values.
pub fn parse_moment(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let raw = raw.trim().to_ascii_lowercase();
    let midnight = now.date().and_time(NaiveTime::MIN);
    match raw.as_str() {
        "now" => return Some(now),
        "today" => return Some(midnight),
        "yesterday" => return midnight.checked_sub_signed(Duration::days(1)),
        "tomorrow" => return midnight.checked_add_signed(Duration::days(1)),
        _ => {}
    }

    if let Some(captures) = relative_pattern().and_then(|pattern| pattern.captures(&raw)) {
        let negative = &captures[1] == "-";
        let amount: i64 = captures[2].parse().ok()?;
        return shift(now, negative, amount, &captures[3]);
    }

    NaiveDateTime::parse_from_str(&raw, DATE_TIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn shift(now: NaiveDateTime, negative: bool, amount: i64, unit: &str) -> Option<NaiveDateTime> {
    let months = match unit {
        "month" => Some(amount),
        "year" => amount.checked_mul(12),
        _ => None,
    };
    if let Some(months) = months {
        let months = Months::new(u32::try_from(months).ok()?);
        return if negative {
            now.checked_sub_months(months)
        } else {
            now.checked_add_months(months)
        };
    }

    let delta = match unit {
        "second" | "sec" => Duration::try_seconds(amount)?,
        "minute" | "min" => Duration::try_minutes(amount)?,
        "hour" => Duration::try_hours(amount)?,
        "day" => Duration::try_days(amount)?,
        "week" => Duration::try_weeks(amount)?,
        _ => return None,
    };
    if negative {
        now.checked_sub_signed(delta)
    } else {
        now.checked_add_signed(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-15 12:30:00", DATE_TIME_FORMAT).expect("now")
    }

    #[test]
    fn keywords_resolve_against_now() {
        assert_eq!(parse_moment("now", now()), Some(now()));
        assert_eq!(
            parse_moment("today", now()).map(|m| m.to_string()),
            Some("2024-06-15 00:00:00".to_string())
        );
        assert_eq!(
            parse_moment("Tomorrow", now()).map(|m| m.to_string()),
            Some("2024-06-16 00:00:00".to_string())
        );
    }

    #[test]
    fn relative_offsets_shift_now() {
        assert_eq!(
            parse_moment("-30 years", now()).map(|m| m.to_string()),
            Some("1994-06-15 12:30:00".to_string())
        );
        assert_eq!(
            parse_moment("+1 month", now()).map(|m| m.to_string()),
            Some("2024-07-15 12:30:00".to_string())
        );
        assert_eq!(
            parse_moment("2 days", now()).map(|m| m.to_string()),
            Some("2024-06-17 12:30:00".to_string())
        );
    }

    #[test]
    fn absolute_dates_parse() {
        assert_eq!(
            parse_moment("2020-01-02", now()).map(|m| m.to_string()),
            Some("2020-01-02 00:00:00".to_string())
        );
        assert_eq!(parse_moment("next fortnight", now()), None);
    }
}
