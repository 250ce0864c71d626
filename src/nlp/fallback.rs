use crate::calendar::types::{Event, local_datetime};
use crate::nlp::time_expr::{TimeExpressionResolver, extract_title};
use chrono::{DateTime, Duration, DurationRound, FixedOffset};
use tracing::debug;

struct SlotRule {
    keywords: &'static [&'static str],
    title: &'static str,
    start: (u32, u32),
    end: (u32, u32),
}

// Every matching rule contributes an event.
const SLOT_RULES: [SlotRule; 7] = [
    SlotRule {
        keywords: &["gym", "workout", "exercise"],
        title: "Gym Workout",
        start: (7, 0),
        end: (8, 0),
    },
    SlotRule {
        keywords: &["work", "office"],
        title: "Work",
        start: (9, 0),
        end: (17, 0),
    },
    SlotRule {
        keywords: &["lunch", "eat"],
        title: "Lunch Break",
        start: (12, 30),
        end: (13, 0),
    },
    SlotRule {
        keywords: &["read", "book"],
        title: "Reading Time",
        start: (19, 0),
        end: (20, 0),
    },
    SlotRule {
        keywords: &["study", "learn"],
        title: "Study Session",
        start: (14, 0),
        end: (16, 0),
    },
    SlotRule {
        keywords: &["meeting"],
        title: "Meeting",
        start: (10, 0),
        end: (11, 0),
    },
    SlotRule {
        keywords: &["break", "rest"],
        title: "Break Time",
        start: (15, 0),
        end: (15, 30),
    },
];

/// Offline planner used when no completion provider produced a usable plan.
pub struct FallbackRuleEngine;

impl FallbackRuleEngine {
    /// Keyword table over `now`'s date. `existing` is accepted for symmetry with
    /// the provider path but never consulted; conflicts are filtered afterwards.
    pub fn generate(utterance: &str, _existing: &[Event], now: DateTime<FixedOffset>) -> Vec<Event> {
        let input = utterance.to_lowercase();
        let offset = *now.offset();
        let today = now.date_naive();

        let mut events: Vec<Event> = SLOT_RULES
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| input.contains(k)))
            .filter_map(|rule| {
                let start = local_datetime(offset, today, rule.start.0, rule.start.1)?;
                let end = local_datetime(offset, today, rule.end.0, rule.end.1)?;
                Event::new(rule.title, start, end).ok()
            })
            .collect();

        if events.is_empty() {
            let start = now.duration_trunc(Duration::hours(1)).unwrap_or(now) + Duration::hours(1);
            let summary = format!("Task: {}", utterance.trim());
            events.extend(Event::new(summary, start, start + Duration::hours(1)).ok());
        }

        debug!(count = events.len(), "fallback plan generated");
        events
    }

    /// A single resolved event when the text names a clock time, otherwise [`Self::generate`].
    pub fn plan(utterance: &str, existing: &[Event], now: DateTime<FixedOffset>) -> Vec<Event> {
        let resolver = TimeExpressionResolver::new(now);
        if !resolver.has_clock_time(utterance) {
            return Self::generate(utterance, existing, now);
        }

        let (start, end) = resolver.resolve_interval(utterance);
        match Event::new(extract_title(utterance), start, end) {
            Ok(event) => vec![event],
            Err(_) => Self::generate(utterance, existing, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-01-01T10:15:42+05:30").unwrap()
    }

    #[test]
    fn test_gym_and_lunch() {
        let events = FallbackRuleEngine::generate("gym and lunch", &[], now());
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.summary.as_str(), e.start.to_rfc3339(), e.end.to_rfc3339()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (
                    "Gym Workout",
                    "2025-01-01T07:00:00+05:30".to_string(),
                    "2025-01-01T08:00:00+05:30".to_string()
                ),
                (
                    "Lunch Break",
                    "2025-01-01T12:30:00+05:30".to_string(),
                    "2025-01-01T13:00:00+05:30".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_categories_are_independent() {
        let events = FallbackRuleEngine::generate("office, then study and a meeting", &[], now());
        let titles: Vec<_> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(titles, vec!["Work", "Study Session", "Meeting"]);
    }

    #[test]
    fn test_unknown_text_becomes_generic_task() {
        let events = FallbackRuleEngine::generate("call mom", &[], now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Task: call mom");
        assert_eq!(events[0].start.to_rfc3339(), "2025-01-01T11:00:00+05:30");
        assert_eq!(events[0].end.to_rfc3339(), "2025-01-01T12:00:00+05:30");
    }

    #[test]
    fn test_existing_events_are_ignored() {
        let busy = Event::new(
            "Busy",
            DateTime::parse_from_rfc3339("2025-01-01T07:00:00+05:30").unwrap(),
            DateTime::parse_from_rfc3339("2025-01-01T08:00:00+05:30").unwrap(),
        )
        .unwrap();
        let events = FallbackRuleEngine::generate("gym", &[busy], now());
        assert_eq!(events[0].start.to_rfc3339(), "2025-01-01T07:00:00+05:30");
    }

    #[test]
    fn test_plan_uses_explicit_clock_time() {
        let events = FallbackRuleEngine::plan("schedule gym tomorrow at 2pm", &[], now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Gym Session");
        assert_eq!(events[0].start.to_rfc3339(), "2025-01-02T14:00:00+05:30");
        assert_eq!(events[0].end.to_rfc3339(), "2025-01-02T15:00:00+05:30");
    }

    #[test]
    fn test_plan_without_clock_time_uses_table() {
        let events = FallbackRuleEngine::plan("add lunch tomorrow", &[], now());
        assert_eq!(events[0].summary, "Lunch Break");
    }
}
