use crate::calendar::types::Action;
use crate::nlp::time_expr::{contains_word, extract_date_phrase, normalize};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const DELETE_KEYWORDS: [&str; 11] = [
    "delete",
    "remove",
    "cancel",
    "clear",
    "erase",
    "drop",
    "get rid of",
    "eliminate",
    "destroy",
    "wipe",
    "purge",
];

const SCHEDULE_VERBS: [&str; 12] = [
    "schedule", "book", "add", "create", "set up", "plan", "arrange", "organize", "make", "put",
    "insert", "place",
];

const EXPLICIT_CREATE_VERBS: [&str; 8] = [
    "schedule", "book", "add", "create", "set up", "plan", "arrange", "organize",
];

const TIME_MARKERS: [&str; 18] = [
    "at",
    "on",
    "tomorrow",
    "today",
    "next week",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "am",
    "pm",
    "o'clock",
    "morning",
    "afternoon",
    "evening",
];

const VIEW_VOCABULARY: [&str; 17] = [
    "what's",
    "what is",
    "show me",
    "tell me",
    "display",
    "view",
    "see",
    "check",
    "look at",
    "find",
    "get",
    "list",
    "when is",
    "when are",
    "my schedule",
    "schedule for",
    "events for",
];

// "2pm", "10am": digits glued to the meridiem never split into words.
static GLUED_MERIDIEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d\s*(am|pm)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Create,
    Delete,
    View,
}

impl From<Intent> for Action {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Create => Action::Create,
            Intent::Delete => Action::Delete,
            Intent::View => Action::View,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Action::from(*self).fmt(f)
    }
}

fn mentions_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_word(normalized, p))
}

/// Plain substring match, so inflections such as "cancelled" or "removing" count.
pub fn is_delete_request(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    DELETE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

pub fn has_time_marker(utterance: &str) -> bool {
    utterance.contains(':')
        || GLUED_MERIDIEM.is_match(utterance)
        || mentions_any(&normalize(utterance), &TIME_MARKERS)
}

pub fn is_scheduling_request(utterance: &str) -> bool {
    mentions_any(&normalize(utterance), &SCHEDULE_VERBS) && has_time_marker(utterance)
}

pub fn has_view_vocabulary(utterance: &str) -> bool {
    mentions_any(&normalize(utterance), &VIEW_VOCABULARY)
}

/// Priority order: delete, then schedule verb with a time marker, else view.
pub fn classify(utterance: &str) -> Intent {
    if is_delete_request(utterance) {
        Intent::Delete
    } else if is_scheduling_request(utterance) {
        Intent::Create
    } else {
        Intent::View
    }
}

/// Classification for requests arriving from outside the process. Any view
/// phrasing rules out creation, and an explicit create verb is enough on its own.
pub fn classify_strict(utterance: &str) -> Intent {
    let normalized = normalize(utterance);

    if !mentions_any(&normalized, &VIEW_VOCABULARY)
        && mentions_any(&normalized, &EXPLICIT_CREATE_VERBS)
    {
        return Intent::Create;
    }

    if is_delete_request(utterance) {
        return Intent::Delete;
    }

    Intent::View
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRoute {
    DayLookup,
    ListUpcoming,
    NextEvent,
    KeywordLookup(&'static str),
    TodaySchedule,
    FreeTime,
    General,
}

/// An utterance alongside its normalized form.
struct Phrasing<'a> {
    raw: &'a str,
    words: String,
}

impl Phrasing<'_> {
    fn mentions(&self, phrase: &str) -> bool {
        contains_word(&self.words, phrase)
    }

    fn mentions_any(&self, phrases: &[&str]) -> bool {
        mentions_any(&self.words, phrases)
    }
}

fn asks_about_day(p: &Phrasing) -> bool {
    p.mentions_any(&["tomorrow", "next day", "day after tomorrow"])
        || extract_date_phrase(p.raw).is_some()
}

fn lists_upcoming(p: &Phrasing) -> bool {
    p.mentions_any(&["upcoming", "show", "display"]) && p.mentions_any(&["event", "events"])
}

fn asks_next_event(p: &Phrasing) -> bool {
    p.mentions_any(&["next meeting", "next event"])
}

fn asks_timing(p: &Phrasing) -> bool {
    p.mentions_any(&["time", "timing", "when"])
}

fn asks_gym_time(p: &Phrasing) -> bool {
    p.mentions("gym") && asks_timing(p)
}

fn asks_work_time(p: &Phrasing) -> bool {
    p.mentions("work") && asks_timing(p)
}

fn asks_lunch_time(p: &Phrasing) -> bool {
    p.mentions("lunch") && asks_timing(p)
}

fn asks_today(p: &Phrasing) -> bool {
    p.mentions("today") && p.mentions_any(&["schedule", "events", "event"])
}

fn asks_free_time(p: &Phrasing) -> bool {
    p.mentions_any(&["free", "available"])
}

type RoutePredicate = fn(&Phrasing) -> bool;

// First match wins.
static VIEW_ROUTES: [(RoutePredicate, ViewRoute); 8] = [
    (asks_about_day, ViewRoute::DayLookup),
    (lists_upcoming, ViewRoute::ListUpcoming),
    (asks_next_event, ViewRoute::NextEvent),
    (asks_gym_time, ViewRoute::KeywordLookup("gym")),
    (asks_work_time, ViewRoute::KeywordLookup("work")),
    (asks_lunch_time, ViewRoute::KeywordLookup("lunch")),
    (asks_today, ViewRoute::TodaySchedule),
    (asks_free_time, ViewRoute::FreeTime),
];

pub fn view_route(utterance: &str) -> ViewRoute {
    let phrasing = Phrasing {
        raw: utterance,
        words: normalize(utterance),
    };

    VIEW_ROUTES
        .iter()
        .find(|(matches, _)| matches(&phrasing))
        .map(|(_, route)| *route)
        .unwrap_or(ViewRoute::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_wins_over_create() {
        assert_eq!(classify("delete my gym session"), Intent::Delete);
        assert_eq!(classify("cancel the meeting I scheduled at 3pm"), Intent::Delete);
        assert_eq!(classify("get rid of lunch tomorrow"), Intent::Delete);
    }

    #[test]
    fn test_inflected_delete_words() {
        assert_eq!(classify("I want my dentist appointment cancelled"), Intent::Delete);
        assert_eq!(classify("removing the standup"), Intent::Delete);
        assert_eq!(classify("clearing my afternoon"), Intent::Delete);
        assert_eq!(classify_strict("I want my dentist appointment cancelled"), Intent::Delete);
        assert_eq!(classify_strict("removing the standup"), Intent::Delete);
    }

    #[test]
    fn test_create_needs_time_marker() {
        assert_eq!(classify("schedule gym tomorrow at 2pm"), Intent::Create);
        assert_eq!(classify("book dentist 10am"), Intent::Create);
        assert_eq!(classify("add standup 9:30"), Intent::Create);
        assert_eq!(classify("schedule gym"), Intent::View);
        assert_eq!(classify("make coffee"), Intent::View);
    }

    #[test]
    fn test_plain_questions_are_views() {
        assert_eq!(classify("how busy is my week"), Intent::View);
        assert_eq!(classify("am I free later?"), Intent::View);
    }

    #[test]
    fn test_schedule_noun_only_vetoed_by_strict() {
        assert_eq!(classify("what's my schedule today?"), Intent::Create);
        assert_eq!(classify_strict("what's my schedule today?"), Intent::View);
    }

    #[test]
    fn test_strict_view_vocabulary_vetoes_create() {
        assert_eq!(classify_strict("schedule gym tomorrow at 2pm"), Intent::Create);
        assert_eq!(classify_strict("show me my schedule for tomorrow"), Intent::View);
        assert_eq!(classify_strict("what is planned for friday"), Intent::View);
        assert_eq!(classify_strict("check if I can book a room"), Intent::View);
    }

    #[test]
    fn test_strict_create_without_time_marker() {
        assert_eq!(classify_strict("add a team lunch"), Intent::Create);
        assert_eq!(classify_strict("remove the team lunch"), Intent::Delete);
        assert_eq!(classify_strict("get rid of lunch"), Intent::Delete);
        assert_eq!(classify_strict("how busy am I"), Intent::View);
    }

    #[test]
    fn test_view_routes_in_order() {
        assert_eq!(view_route("what do I have tomorrow?"), ViewRoute::DayLookup);
        assert_eq!(view_route("anything on 13th july 2025"), ViewRoute::DayLookup);
        assert_eq!(view_route("events on 13/07/2025"), ViewRoute::DayLookup);
        assert_eq!(view_route("show upcoming events"), ViewRoute::ListUpcoming);
        assert_eq!(view_route("when is my next meeting"), ViewRoute::NextEvent);
        assert_eq!(view_route("what time is gym"), ViewRoute::KeywordLookup("gym"));
        assert_eq!(view_route("when is lunch"), ViewRoute::KeywordLookup("lunch"));
        assert_eq!(view_route("today's schedule please"), ViewRoute::TodaySchedule);
        assert_eq!(view_route("am I free this afternoon"), ViewRoute::FreeTime);
        assert_eq!(view_route("how was my week"), ViewRoute::General);
    }

    #[test]
    fn test_tomorrow_beats_free_time() {
        assert_eq!(view_route("am I free tomorrow"), ViewRoute::DayLookup);
    }
}
