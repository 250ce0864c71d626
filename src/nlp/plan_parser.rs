use crate::calendar::types::Event;
use crate::error::{ParseError, ValidationError};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How invalid drafts inside an otherwise well-formed plan are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Drop invalid drafts and keep the rest.
    #[default]
    Lenient,
    /// Fail the whole plan on the first invalid draft.
    Strict,
}

/// Event as proposed by a model; every field may be missing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventDraft {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn required<'a>(value: &'a Option<String>, missing: ValidationError) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(missing)
}

fn timestamp(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| ValidationError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl EventDraft {
    pub fn validate(self) -> Result<Event, ValidationError> {
        let summary = required(&self.summary, ValidationError::MissingSummary)?;
        let start = timestamp("start", required(&self.start, ValidationError::MissingStart)?)?;
        let end = timestamp("end", required(&self.end, ValidationError::MissingEnd)?)?;

        let mut event = Event::new(summary, start, end)?;
        event.description = non_blank(self.description);
        event.location = non_blank(self.location);
        Ok(event)
    }
}

/// A conversational provider reply: a natural-language answer plus any events it mentions.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub answer: String,
    pub events: Vec<Event>,
}

#[derive(Deserialize)]
struct RawReply {
    answer: String,
    #[serde(default)]
    events: Vec<EventDraft>,
}

/// Removes every markdown code fence marker and trims.
pub fn clean_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// First balanced `open`..`close` span, ignoring delimiters inside JSON strings.
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    balanced_span_at(text, text.find(open)?, open, close)
}

/// Every balanced span in order of its opening delimiter. Nested spans are included.
fn balanced_spans(text: &str, open: char, close: char) -> impl Iterator<Item = &str> {
    text.match_indices(open)
        .filter_map(move |(start, _)| balanced_span_at(text, start, open, close))
}

fn balanced_span_at(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = start + offset + c.len_utf8();
                return Some(&text[start..end]);
            }
        }
    }

    None
}

pub struct PlanParser;

impl PlanParser {
    pub fn parse(raw: &str, mode: ParseMode) -> Result<Vec<Event>, ParseError> {
        let drafts = Self::decode_drafts(raw)?;
        let mut events = Vec::with_capacity(drafts.len());

        for (index, draft) in drafts.into_iter().enumerate() {
            match draft.validate() {
                Ok(event) => events.push(event),
                Err(reason) if mode == ParseMode::Strict => {
                    return Err(ParseError::InvalidEvent { index, reason });
                }
                Err(reason) => warn!(index, %reason, "dropping invalid event draft"),
            }
        }

        Ok(events)
    }

    fn decode_drafts(raw: &str) -> Result<Vec<EventDraft>, ParseError> {
        let cleaned = clean_fences(raw);
        let mut last_error = None;

        // Prose such as "Plan [v2]:" can hold brackets of its own, so keep scanning
        // until an array decodes. An empty array only wins when nothing else does.
        let mut empty = None;
        for array in balanced_spans(&cleaned, '[', ']') {
            match serde_json::from_str::<Vec<EventDraft>>(array) {
                Ok(drafts) if drafts.is_empty() => empty = empty.or(Some(drafts)),
                Ok(drafts) => return Ok(drafts),
                Err(e) => {
                    last_error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(drafts) = empty {
            return Ok(drafts);
        }

        // A lone object only counts when the reply has no array at all.
        if let Some(e) = last_error {
            return Err(ParseError::Malformed(e));
        }

        if let Some(object) = balanced_span(&cleaned, '{', '}') {
            match serde_json::from_str::<EventDraft>(object) {
                Ok(draft) => return Ok(vec![draft]),
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        Err(ParseError::Malformed(
            last_error.unwrap_or_else(|| "no JSON array or object found".to_string()),
        ))
    }

    /// Canonical JSON array form of a plan.
    pub fn to_json(events: &[Event]) -> String {
        serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decodes a conversational reply, or `None` if the text does not fit the schema.
    pub fn parse_reply(raw: &str) -> Option<AssistantReply> {
        let cleaned = clean_fences(raw);
        let object = balanced_span(&cleaned, '{', '}')?;
        let reply: RawReply = serde_json::from_str(object).ok()?;

        let answer = reply.answer.trim().to_string();
        if answer.is_empty() {
            return None;
        }

        let events = reply
            .events
            .into_iter()
            .filter_map(|draft| draft.validate().ok())
            .collect();

        Some(AssistantReply { answer, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "Here is your plan:\n```json\n[{\"summary\":\"X\",\"start\":\"2025-01-01T09:00:00+05:30\",\"end\":\"2025-01-01T10:00:00+05:30\"}]\n```";

    #[test]
    fn test_fenced_plan_with_prose() {
        let events = PlanParser::parse(PLAN, ParseMode::Strict).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "X");
        assert_eq!(events[0].start.to_rfc3339(), "2025-01-01T09:00:00+05:30");
    }

    #[test]
    fn test_trailing_prose_is_ignored() {
        let raw = r#"[{"summary":"Gym","start":"2025-01-01T07:00:00+05:30","end":"2025-01-01T08:00:00+05:30"}] Let me know [if] you need more."#;
        let events = PlanParser::parse(raw, ParseMode::Lenient).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_brackets_inside_strings() {
        let raw = r#"[{"summary":"Review [draft]","start":"2025-01-01T07:00:00+05:30","end":"2025-01-01T08:00:00+05:30"}]"#;
        let events = PlanParser::parse(raw, ParseMode::Strict).unwrap();
        assert_eq!(events[0].summary, "Review [draft]");
    }

    #[test]
    fn test_bracketed_prose_before_plan() {
        let raw = "Plan [v2]:\n[{\"summary\":\"A\",\"start\":\"2025-01-02T08:00:00+05:30\",\"end\":\"2025-01-02T09:00:00+05:30\"},{\"summary\":\"B\",\"start\":\"2025-01-02T10:00:00+05:30\",\"end\":\"2025-01-02T11:00:00+05:30\"}]";
        let events = PlanParser::parse(raw, ParseMode::Strict).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].summary, "B");
    }

    #[test]
    fn test_object_inside_broken_array_is_not_a_plan() {
        let raw = r#"[{"summary":"A","start":"2025-01-02T08:00:00+05:30","end":"2025-01-02T09:00:00+05:30"},]"#;
        assert!(matches!(
            PlanParser::parse(raw, ParseMode::Strict),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_single_object_is_wrapped() {
        let raw = r#"Sure! {"summary":"Call","start":"2025-01-01T07:00:00Z","end":"2025-01-01T07:30:00Z"}"#;
        let events = PlanParser::parse(raw, ParseMode::Strict).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            PlanParser::parse("I could not plan that.", ParseMode::Lenient),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            PlanParser::parse("[{\"summary\": }]", ParseMode::Lenient),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_array_is_ok() {
        assert_eq!(PlanParser::parse("[]", ParseMode::Strict).unwrap(), vec![]);
    }

    #[test]
    fn test_modes_differ_on_invalid_drafts() {
        let raw = r#"[
            {"summary":"Good","start":"2025-01-01T09:00:00+05:30","end":"2025-01-01T10:00:00+05:30"},
            {"summary":"","start":"2025-01-01T09:00:00+05:30","end":"2025-01-01T10:00:00+05:30"},
            {"summary":"Backwards","start":"2025-01-01T11:00:00+05:30","end":"2025-01-01T10:00:00+05:30"}
        ]"#;

        let lenient = PlanParser::parse(raw, ParseMode::Lenient).unwrap();
        assert_eq!(lenient.len(), 1);

        assert_eq!(
            PlanParser::parse(raw, ParseMode::Strict),
            Err(ParseError::InvalidEvent {
                index: 1,
                reason: ValidationError::MissingSummary,
            })
        );
    }

    #[test]
    fn test_unparseable_timestamp() {
        let raw = r#"[{"summary":"Gym","start":"tomorrow 7am","end":"2025-01-01T08:00:00+05:30"}]"#;
        assert!(matches!(
            PlanParser::parse(raw, ParseMode::Strict),
            Err(ParseError::InvalidEvent {
                reason: ValidationError::InvalidTimestamp { field: "start", .. },
                ..
            })
        ));
    }

    #[test]
    fn test_to_json_round_trip() {
        let original = PlanParser::parse(PLAN, ParseMode::Strict).unwrap();
        let again = PlanParser::parse(&PlanParser::to_json(&original), ParseMode::Strict).unwrap();
        assert_eq!(original, again);
    }

    #[test]
    fn test_parse_reply() {
        let raw = "```json\n{\"answer\": \"You have gym at 07:00.\", \"success\": true, \"action\": \"view\", \"events\": []}\n```";
        let reply = PlanParser::parse_reply(raw).unwrap();
        assert_eq!(reply.answer, "You have gym at 07:00.");
        assert!(reply.events.is_empty());

        assert_eq!(PlanParser::parse_reply("You are free all afternoon."), None);
        assert_eq!(PlanParser::parse_reply("{\"answer\": \"  \"}"), None);
    }
}
