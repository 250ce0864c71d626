use crate::calendar::types::{Event, QueryContext};
use std::fmt::Write;

fn event_lines(events: &[Event], ctx: &QueryContext) -> String {
    let mut lines = String::new();
    for event in events {
        let start = event.start.with_timezone(&ctx.time_zone);
        let end = event.end.with_timezone(&ctx.time_zone);
        let _ = writeln!(
            lines,
            "- {} ({} to {})",
            event.summary,
            start.format("%a %b %-d %H:%M"),
            end.format("%H:%M")
        );
    }
    lines
}

/// Prompt for turning one request into events. Asks for exactly what the user named.
pub fn scheduling_prompt(ctx: &QueryContext, utterance: &str) -> String {
    let now = ctx.current_time;
    let existing = if ctx.todays_events.is_empty() {
        "No existing events today.\n".to_string()
    } else {
        format!("Existing events today:\n{}", event_lines(&ctx.todays_events, ctx))
    };
    let example_day = now.format("%Y-%m-%d");
    let tz = ctx.time_zone_label();

    format!(
        r#"You are a calendar assistant. Create ONLY the specific event(s) mentioned in the user's request.

IMPORTANT RULES:
1. Create ONLY what the user explicitly asks for
2. Do NOT suggest additional events
3. Do NOT create a full day schedule
4. Use realistic durations (meetings: 1 hour, gym: 1 hour, lunch: 30 min, presentation: 1 hour)
5. If the user names several events, create all of them
6. Avoid overlapping the existing events

Current time: {current} ({tz})
{existing}
User request: "{utterance}"

Respond with a JSON array of events. Each event has:
- summary: event title
- start: start time in RFC 3339 format (YYYY-MM-DDTHH:MM:SS{tz})
- end: end time in RFC 3339 format

Example response:
[
  {{
    "summary": "Team Meeting",
    "start": "{example_day}T14:00:00{tz}",
    "end": "{example_day}T15:00:00{tz}"
  }}
]

Only respond with the JSON array, no additional text."#,
        current = now.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Prompt for answering a question about the calendar without changing it.
pub fn view_prompt(ctx: &QueryContext, question: &str) -> String {
    let mut calendar = String::new();
    if !ctx.todays_events.is_empty() {
        let _ = write!(
            calendar,
            "Today's events ({}):\n{}",
            ctx.todays_events.len(),
            event_lines(&ctx.todays_events, ctx)
        );
    }
    if !ctx.upcoming_events.is_empty() {
        let _ = write!(
            calendar,
            "Upcoming events ({}):\n{}",
            ctx.upcoming_events.len(),
            event_lines(&ctx.upcoming_events, ctx)
        );
    }
    if calendar.is_empty() {
        calendar.push_str("No events scheduled.\n");
    }

    format!(
        r#"You are a calendar assistant. Answer the user's question about their calendar. Do not create or delete anything.

Current time: {current} ({tz})

Calendar events:
{calendar}
User question: "{question}"

Respond with a JSON object in this format:
{{
  "answer": "Your answer to the user in plain language",
  "events": [
    {{
      "summary": "Event Title",
      "start": "2025-01-15T14:00:00{tz}",
      "end": "2025-01-15T15:00:00{tz}"
    }}
  ]
}}

Include in "events" only the existing events your answer refers to. Be brief and conversational."#,
        current = ctx.current_time.format("%Y-%m-%d %H:%M:%S"),
        tz = ctx.time_zone_label(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    fn context(todays_events: Vec<Event>) -> QueryContext {
        QueryContext {
            current_time: DateTime::parse_from_rfc3339("2025-01-01T10:00:00+05:30").unwrap(),
            todays_events,
            upcoming_events: Vec::new(),
            time_zone: FixedOffset::east_opt(19800).unwrap(),
        }
    }

    #[test]
    fn test_scheduling_prompt_lists_existing_and_request() {
        let gym = Event::new(
            "Gym",
            DateTime::parse_from_rfc3339("2025-01-01T07:00:00+05:30").unwrap(),
            DateTime::parse_from_rfc3339("2025-01-01T08:00:00+05:30").unwrap(),
        )
        .unwrap();
        let prompt = scheduling_prompt(&context(vec![gym]), "lunch with Sam at 1pm");

        assert!(prompt.contains("- Gym (Wed Jan 1 07:00 to 08:00)"));
        assert!(prompt.contains("User request: \"lunch with Sam at 1pm\""));
        assert!(prompt.contains("2025-01-01T14:00:00+05:30"));
        assert!(prompt.contains("Create ONLY"));
    }

    #[test]
    fn test_view_prompt_without_events() {
        let prompt = view_prompt(&context(Vec::new()), "how busy is my week?");
        assert!(prompt.contains("No events scheduled."));
        assert!(prompt.contains("Current time: 2025-01-01 10:00:00 (+05:30)"));
        assert!(prompt.contains("\"answer\""));
    }
}
