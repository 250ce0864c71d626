use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::calendar::types::local_datetime;

pub const DEFAULT_HOUR: u32 = 9;

// Compile regex patterns once at startup
static MERIDIEM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap());

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").unwrap());

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*(minutes|minute|mins|min|hours|hour|hrs|hr)\b").unwrap()
});

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DMY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}[/.\-]\d{1,2}[/.\-]\d{4}$").unwrap());

static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

const LITERAL_FORMATS: [&str; 6] = ["%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"];

// Checked in order, so longer phrases come before their substrings.
const TITLE_PHRASES: [(&str, &str); 15] = [
    ("daily standup", "Daily Standup"),
    ("team meeting", "Team Meeting"),
    ("team meet", "Team Meeting"),
    ("standup", "Standup Meeting"),
    ("gym", "Gym Session"),
    ("workout", "Workout"),
    ("lunch", "Lunch"),
    ("dinner", "Dinner"),
    ("breakfast", "Breakfast"),
    ("interview", "Interview"),
    ("presentation", "Presentation"),
    ("review", "Review Meeting"),
    ("planning", "Planning Session"),
    ("call", "Call"),
    ("dentist", "Dentist Appointment"),
];

const TITLE_VERBS: [&str; 4] = ["create", "schedule", "add", "book"];

/// Lowercases and pads with spaces so phrases can be matched on word boundaries.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ':' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Whole-word match on [`normalize`]d text; a trailing possessive is allowed.
pub fn contains_word(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {} ", phrase)) || normalized.contains(&format!(" {}'s ", phrase))
}

/// Resolves relative date words and clock phrases against a fixed "now".
#[derive(Debug, Clone, Copy)]
pub struct TimeExpressionResolver {
    now: DateTime<FixedOffset>,
}

impl TimeExpressionResolver {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    pub fn resolve_date(&self, text: &str) -> NaiveDate {
        let today = self.now.date_naive();

        if let Some(date) = extract_date_phrase(text).and_then(|p| parse_literal_date(&p)) {
            return date;
        }

        let normalized = normalize(text);
        if normalized.contains(" day after tomorrow ") {
            return today + Duration::days(2);
        }
        if contains_word(&normalized, "tomorrow") {
            return today + Duration::days(1);
        }
        if contains_word(&normalized, "today") || contains_word(&normalized, "tonight") {
            return today;
        }
        if normalized.contains(" next week ") {
            return today + Duration::days(7);
        }

        for (name, weekday) in WEEKDAYS {
            if contains_word(&normalized, name) {
                return today + Duration::days(days_until_next_weekday(today.weekday(), weekday));
            }
        }

        today + Duration::days(1)
    }

    /// Hour and minute named in the text, if any.
    pub fn clock_time(&self, text: &str) -> Option<(u32, u32)> {
        if let Some(caps) = MERIDIEM_TIME.captures(text) {
            let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
            let minute: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            if !(1..=12).contains(&hour) || minute > 59 {
                return None;
            }

            let is_pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
            let hour = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            return Some((hour, minute));
        }

        let caps = CLOCK_TIME.captures(text)?;
        Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
    }

    pub fn has_clock_time(&self, text: &str) -> bool {
        self.clock_time(text).is_some()
    }

    pub fn resolve_hour(&self, text: &str) -> u32 {
        self.clock_time(text).map(|(h, _)| h).unwrap_or(DEFAULT_HOUR)
    }

    pub fn resolve_duration(&self, text: &str) -> Duration {
        DURATION
            .captures(text)
            .and_then(|caps| {
                let amount: i64 = caps[1].parse().ok()?;
                let unit = caps[2].to_lowercase();
                let duration = if unit.starts_with('h') {
                    Duration::hours(amount)
                } else {
                    Duration::minutes(amount)
                };
                (amount > 0).then_some(duration)
            })
            .unwrap_or_else(|| Duration::hours(1))
    }

    /// Date and clock time combined at the resolver's offset.
    pub fn resolve_start(&self, text: &str) -> DateTime<FixedOffset> {
        let date = self.resolve_date(text);
        let (hour, minute) = self.clock_time(text).unwrap_or((DEFAULT_HOUR, 0));

        local_datetime(*self.now.offset(), date, hour, minute)
            .or_else(|| local_datetime(*self.now.offset(), date, DEFAULT_HOUR, 0))
            .unwrap_or(self.now)
    }

    pub fn resolve_interval(&self, text: &str) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let start = self.resolve_start(text);
        (start, start + self.resolve_duration(text))
    }
}

/// Days until the next `target`, never zero.
pub fn days_until_next_weekday(current: Weekday, target: Weekday) -> i64 {
    let current = current.num_days_from_monday() as i64;
    let target = target.num_days_from_monday() as i64;
    let days = (target - current + 7) % 7;
    if days == 0 { 7 } else { days }
}

fn strip_ordinal(word: &str) -> &str {
    ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| word.strip_suffix(suffix))
        .unwrap_or(word)
}

fn is_day(word: &str) -> bool {
    let digits = strip_ordinal(word);
    (1..=2).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_month(word: &str) -> bool {
    MONTHS
        .iter()
        .any(|m| *m == word || (word.len() == 3 && m.starts_with(word)))
}

fn is_year(word: &str) -> bool {
    word.len() == 4 && word.chars().all(|c| c.is_ascii_digit())
}

/// Finds the first literal date in free text, e.g. "13th july 2025" or "2025-07-13".
pub fn extract_date_phrase(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | '?' | '!' | ';' | '"' | '(' | ')')))
        .map(|w| w.trim_end_matches('.'))
        .collect();

    for window in words.windows(3) {
        if is_day(window[0]) && is_month(window[1]) && is_year(window[2]) {
            return Some(window.join(" "));
        }
    }

    words
        .iter()
        .find(|w| ISO_DATE.is_match(w))
        .or_else(|| words.iter().find(|w| DMY_DATE.is_match(w)))
        .map(|w| w.to_string())
}

/// Parses a phrase found by [`extract_date_phrase`]. First matching format wins.
pub fn parse_literal_date(phrase: &str) -> Option<NaiveDate> {
    let cleaned = ORDINAL.replace_all(phrase.trim(), "$1");

    LITERAL_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

// Skipped between a create verb and the word used as the title.
const TITLE_DETERMINERS: [&str; 8] = ["a", "an", "the", "my", "our", "your", "this", "that"];

pub fn extract_title(text: &str) -> String {
    let normalized = normalize(text);

    for (phrase, title) in TITLE_PHRASES {
        if contains_word(&normalized, phrase) {
            return title.to_string();
        }
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        if !TITLE_VERBS.contains(word) {
            continue;
        }
        let next = words[i + 1..]
            .iter()
            .find(|w| !TITLE_DETERMINERS.contains(*w));
        if let Some(next) = next {
            return capitalize(next);
        }
    }

    "Event".to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
