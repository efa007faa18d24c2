//! Display formatting for visitor previews: schedule strings, avatar initials
//! and asset counts

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Rendered when a date/time pair cannot be parsed
pub const UNKNOWN_SCHEDULE: &str = "-";

/// Initials fallback for visitors with no name
pub const VISITOR_FALLBACK_INITIAL: &str = "V";

/// Initials fallback for hosts and guests with no name
pub const PERSON_FALLBACK_INITIAL: &str = "?";

type DateParser = fn(&str) -> Option<NaiveDate>;

/// Tried in order; the first hit wins
const DATE_PARSERS: &[DateParser] = &[
    parse_iso_datetime,
    parse_ymd,
    parse_dmy,
    parse_loose,
];

fn parse_iso_datetime(raw: &str) -> Option<NaiveDate> {
    if !raw.contains('T') {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc().date())
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.date())
                .ok()
        })
}

fn parse_ymd(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_dmy(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

fn parse_loose(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_utc().date());
    }
    ["%Y/%m/%d", "%d-%m-%Y", "%d %b %Y", "%b %d %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parse a scheduled date in any of the formats the upstream API produces
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_PARSERS.iter().find_map(|parse| parse(raw))
}

/// Parse a scheduled time (`HH:MM`, `HH:MM:SS` or `h:mm am`)
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let upper = raw.to_uppercase();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
}

pub fn parse_schedule(date: &str, time: &str) -> Option<NaiveDateTime> {
    Some(parse_date(date)?.and_time(parse_time(time)?))
}

/// `DD/MM/YYYY h:mmam`; `-` if either half is missing or unparseable
pub fn format_date_time(date: &str, time: &str) -> String {
    match parse_schedule(date, time) {
        Some(dt) => {
            let (is_pm, hour) = dt.hour12();
            format!(
                "{} {}:{:02}{}",
                dt.format("%d/%m/%Y"),
                hour,
                dt.minute(),
                if is_pm { "pm" } else { "am" }
            )
        }
        None => UNKNOWN_SCHEDULE.to_string(),
    }
}

/// First letter of the first and last words, or one letter for a single word
pub fn avatar_initials(name: Option<&str>, fallback: &str) -> String {
    let words: Vec<&str> = name.unwrap_or_default().split_whitespace().collect();
    match words.as_slice() {
        [] => fallback.to_string(),
        [only] => first_letter(only),
        [first, .., last] => format!("{}{}", first_letter(first), first_letter(last)),
    }
}

fn first_letter(word: &str) -> String {
    word.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

pub fn visitor_initials(name: Option<&str>) -> String {
    avatar_initials(name, VISITOR_FALLBACK_INITIAL)
}

/// `Total Assets: 05`
pub fn total_assets_label(total: usize) -> String {
    format!("Total Assets: {:02}", total)
}
