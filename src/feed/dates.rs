//! Lenient date parsing for feed items
//!
//! Feeds in the wild carry RFC 822 dates (RSS), ISO 8601 dates (RDF, Atom,
//! sitemaps) and the occasional `yyyy/MM/dd HH:mm:ss` form. Every parser
//! returns epoch milliseconds, or `None` when the value is not understood.
//! Trailing text after a recognised date is ignored.

use chrono::{Datelike, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO8601: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{2}|\d{4})-(\d{1,2})-(\d{1,2})T(\d{1,2}):(\d{1,2}):(\d{1,2})(?:\.(\d+))?\s*(Z|[+-]\d{2}:?\d{2})",
    )
    .expect("Invalid ISO 8601 regex")
});

static MICROSOFT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2}) (\d{1,2}):(\d{1,2}):(\d{1,2})")
        .expect("Invalid zone-less date regex")
});

static DATE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("Invalid date-only regex")
});

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .and_then(|i| u32::try_from(i + 1).ok())
}

fn to_millis(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<i64> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .map(|t| t.timestamp_millis())
}

/// Offset east of UTC in seconds for `+hhmm`, `-hh:mm`, `+hh`, or a zone name.
/// Unknown names are treated as GMT.
fn zone_offset_seconds(zone: &str) -> Option<i64> {
    if let Some(sign) = zone.chars().next().filter(|c| *c == '+' || *c == '-') {
        let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
        let (hours, minutes) = match digits.len() {
            1 | 2 => (digits.as_str(), "0"),
            3 | 4 => digits.split_at(digits.len() - 2),
            _ => return None,
        };
        let total = hours.parse::<i64>().ok()? * 3600 + minutes.parse::<i64>().ok()? * 60;
        return Some(if sign == '-' { -total } else { total });
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "A" => -1,
        "M" => -12,
        "N" => 1,
        "Y" => 12,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    Some(hours * 3600)
}

/// `[Day,] dd Mon yyyy [HH:mm[:ss] [zone]]`
///
/// Years below 1900 have 1900 added. A missing zone means GMT.
#[must_use]
pub fn parse_rfc822(value: &str) -> Option<i64> {
    let value = value.trim();
    let usable = value.split_once(',').map_or(value, |(_, rest)| rest).trim();

    let (day, rest) = usable.split_once(' ')?;
    let (month, rest) = rest.trim().split_once(' ')?;
    let rest = rest.trim();

    let (year, hour, minute, second, zone) = match rest.split_once(' ') {
        None => (rest, "0", "0", "0", None),
        Some((year, time)) => {
            let (hour, time) = time.trim().split_once(':')?;
            let time = time.trim();
            let (minute, second, zone) = match time.split_once(':') {
                Some((minute, rest)) => {
                    let rest = rest.trim();
                    match rest.split_once(' ') {
                        Some((second, zone)) => (minute, second, Some(zone.trim())),
                        None => (minute, rest, None),
                    }
                }
                None => match time.split_once(' ') {
                    Some((minute, zone)) => (minute, "0", Some(zone.trim())),
                    None => (time, "0", None),
                },
            };
            (year, hour, minute, second, zone)
        }
    };

    let mut year: i32 = year.parse().ok()?;
    if year < 1900 {
        year += 1900;
    }
    let millis = to_millis(
        year,
        month_number(month)?,
        day.parse().ok()?,
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )?;
    let offset = match zone.filter(|z| !z.is_empty()) {
        Some(zone) => zone_offset_seconds(zone)?,
        None => 0,
    };
    Some(millis - offset * 1000)
}

/// `yyyy/MM/dd[ HH:mm[:ss]]`, always GMT
#[must_use]
pub fn parse_china(value: &str) -> Option<i64> {
    let value = value.trim();
    let (year, rest) = value.split_once('/')?;
    let (month, rest) = rest.split_once('/')?;
    let (day, hour, minute, second) = match rest.split_once(' ') {
        None => (rest, "0", "0", "0"),
        Some((day, time)) => {
            let (hour, time) = time.split_once(':')?;
            match time.split_once(':') {
                Some((minute, second)) => (day, hour, minute, second),
                None => (day, hour, time, "0"),
            }
        }
    };

    let mut year: i32 = year.parse().ok()?;
    if year < 1900 {
        year += 1900;
    }
    to_millis(
        year,
        month.parse().ok()?,
        day.parse().ok()?,
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )
}

/// Map a two-digit year into the century window `[now-80, now+20)`.
fn expand_two_digit_year(two_digits: i32) -> i32 {
    let current = Utc::now().year();
    let mut year = current - current.rem_euclid(100) + two_digits;
    if year >= current + 20 {
        year -= 100;
    } else if year < current - 80 {
        year += 100;
    }
    year
}

/// ISO 8601 with a mandatory zone (`Z`, `+hh:mm`, `+hhmm`), or the
/// zone-less `yyyy-MM-dd HH:mm:ss` form some servers emit, read as UTC.
/// A bare `yyyy-MM-dd` (W3C datetime, common in sitemaps) is midnight UTC.
///
/// Two-digit years and fractional seconds are accepted; fractions are
/// truncated to milliseconds.
#[must_use]
pub fn parse_iso8601(value: &str) -> Option<i64> {
    let value = value.trim();

    if !value.contains('T') {
        if let Some(caps) = DATE_ONLY.captures(value) {
            return to_millis(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
                0,
                0,
                0,
            );
        }
        let caps = MICROSOFT.captures(value)?;
        return to_millis(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
            caps[4].parse().ok()?,
            caps[5].parse().ok()?,
            caps[6].parse().ok()?,
        );
    }

    let caps = ISO8601.captures(value)?;
    let year_text = &caps[1];
    let mut year: i32 = year_text.parse().ok()?;
    if year_text.len() == 2 {
        year = expand_two_digit_year(year);
    }
    let millis = to_millis(
        year,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
        caps[4].parse().ok()?,
        caps[5].parse().ok()?,
        caps[6].parse().ok()?,
    )?;
    let fraction = caps.get(7).map_or(Some(0), |f| {
        let digits: String = f.as_str().chars().chain("00".chars()).take(3).collect();
        digits.parse::<i64>().ok()
    })?;
    let offset = match &caps[8] {
        "Z" => 0,
        zone => zone_offset_seconds(zone)?,
    };
    Some(millis + fraction - offset * 1000)
}

/// RSS item dates: RFC 822 first, then the slash form, then ISO 8601.
#[must_use]
pub fn parse_rss_date(value: &str) -> Option<i64> {
    parse_rfc822(value)
        .or_else(|| parse_china(value))
        .or_else(|| parse_iso8601(value))
}

/// `yyyy-MM-dd'T'HH:mm'Z'` in UTC, as stored in the `pubdateiso` field
#[must_use]
pub fn format_iso_minutes(epoch_ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format("%Y-%m-%dT%H:%MZ").to_string())
}
