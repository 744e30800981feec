//! Text cleanup and date parsing shared by every extractor. Everything here is
//! pure and stateless.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

/// Collapse every run of whitespace or control characters into a single space
/// and trim both ends.
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

enum DateRule {
    Calendar(&'static [&'static str]),
    HoursAgo,
    Yesterday,
    Today,
}

// priority order matters: the first pattern that matches and parses wins
static DATE_PATTERNS: Lazy<Vec<(Regex, DateRule)>> = Lazy::new(|| {
    let rules = [
        (r"\d{4}-\d{2}-\d{2}", DateRule::Calendar(&["%Y-%m-%d"])),
        (r"\d{2}/\d{2}/\d{4}", DateRule::Calendar(&["%d/%m/%Y"])),
        (r"[A-Za-z]+ \d{1,2}, \d{4}", DateRule::Calendar(&["%B %d, %Y", "%b %d, %Y"])),
        (r"\d{2}-\d{2}-\d{4}", DateRule::Calendar(&["%d-%m-%Y"])),
        (r"\d{1,2} [A-Za-z]+ \d{4}", DateRule::Calendar(&["%d %B %Y", "%d %b %Y"])),
        (r"(\d{1,2}) hours? ago", DateRule::HoursAgo),
        (r"(\d{1,2}) minutes? ago", DateRule::HoursAgo),
        (r"yesterday", DateRule::Yesterday),
        (r"today", DateRule::Today),
    ];

    rules
        .into_iter()
        .filter_map(|(pattern, rule)| match Regex::new(&format!("(?i){}", pattern)) {
            Ok(regex) => Some((regex, rule)),
            Err(e) => {
                error!("Invalid date pattern {}: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// Parse a relative or absolute date string into an absolute timestamp.
///
/// Unrecognized input falls back to the current time; `None` is only returned
/// when the arithmetic itself fails.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_date_at(raw, Utc::now())
}

/// Same as [`parse_date`] with an explicit "now".
pub fn parse_date_at(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for (regex, rule) in DATE_PATTERNS.iter() {
        let Some(captures) = regex.captures(raw) else {
            continue;
        };
        let matched = captures.get(0).map(|m| m.as_str()).unwrap_or_default();

        match rule {
            DateRule::Calendar(formats) => {
                let parsed = formats
                    .iter()
                    .find_map(|format| NaiveDate::parse_from_str(matched, format).ok());
                if let Some(date) = parsed {
                    let midnight = date.and_hms_opt(0, 0, 0)?;
                    return Some(Utc.from_utc_datetime(&midnight));
                }
                // matched the shape but not a real date; try the next pattern
            }
            DateRule::HoursAgo => {
                let hours: i64 = captures.get(1)?.as_str().parse().ok()?;
                return now.checked_sub_signed(Duration::hours(hours));
            }
            DateRule::Yesterday => return now.checked_sub_signed(Duration::days(1)),
            DateRule::Today => return Some(now),
        }
    }

    Some(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 30, 0).unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   "), "");
        assert_eq!(clean_text("  Hello \n\t world  "), "Hello world");
        assert_eq!(clean_text("line one\r\nline two"), "line one line two");
        assert_eq!(clean_text("bell\u{7}char"), "bell char");
        assert_eq!(clean_text("already clean"), "already clean");
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(parse_date_at("2024-01-15", fixed_now()), Some(midnight(2024, 1, 15)));
        assert_eq!(
            parse_date_at("Published 2024-01-15 08:00", fixed_now()),
            Some(midnight(2024, 1, 15))
        );
    }

    #[test]
    fn test_day_first_formats() {
        assert_eq!(parse_date_at("15/01/2024", fixed_now()), Some(midnight(2024, 1, 15)));
        assert_eq!(parse_date_at("15-01-2024", fixed_now()), Some(midnight(2024, 1, 15)));
        assert_eq!(parse_date_at("5 March 2024", fixed_now()), Some(midnight(2024, 3, 5)));
        assert_eq!(parse_date_at("5 mar 2024", fixed_now()), Some(midnight(2024, 3, 5)));
    }

    #[test]
    fn test_long_form_date() {
        assert_eq!(parse_date_at("January 15, 2024", fixed_now()), Some(midnight(2024, 1, 15)));
        assert_eq!(parse_date_at("Updated: Feb 2, 2023", fixed_now()), Some(midnight(2023, 2, 2)));
    }

    #[test]
    fn test_relative_dates() {
        let now = fixed_now();
        assert_eq!(parse_date_at("2 hours ago", now), Some(now - Duration::hours(2)));
        assert_eq!(parse_date_at("1 hour ago", now), Some(now - Duration::hours(1)));
        // minutes are counted as hours
        assert_eq!(parse_date_at("30 minutes ago", now), Some(now - Duration::hours(30)));
        assert_eq!(parse_date_at("Yesterday", now), Some(now - Duration::days(1)));
        assert_eq!(parse_date_at("today", now), Some(now));
    }

    #[test]
    fn test_hours_ago_against_wall_clock() {
        let before = Utc::now();
        let parsed = parse_date("2 hours ago").unwrap();
        let after = Utc::now();
        assert!(parsed >= before - Duration::hours(2));
        assert!(parsed <= after - Duration::hours(2));
    }

    #[test]
    fn test_unrecognized_falls_back_to_now() {
        let now = fixed_now();
        assert_eq!(parse_date_at("sometime last spring", now), Some(now));
        assert_eq!(parse_date_at("", now), Some(now));
    }

    #[test]
    fn test_impossible_calendar_date_falls_through() {
        // 99/99/2024 matches the slash shape but is not a date
        let parsed = parse_date_at("99/99/2024", fixed_now()).unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed, fixed_now());
    }
}
