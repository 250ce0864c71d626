use crate::error::ValidationError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A titled time interval. `event_id` is only set once the store has persisted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub summary: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Event {
    pub fn new(
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, ValidationError> {
        let summary = summary.into().trim().to_string();
        if summary.is_empty() {
            return Err(ValidationError::MissingSummary);
        }
        if start >= end {
            return Err(ValidationError::EmptyInterval);
        }

        Ok(Self {
            summary,
            start,
            end,
            event_id: None,
            description: None,
            location: None,
        })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Calendar date of the start, read at the event's own offset.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn local_date(&self, offset: FixedOffset) -> NaiveDate {
        self.start.with_timezone(&offset).date_naive()
    }

    /// Half-open overlap: touching intervals do not overlap.
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &Event) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn time_label(&self) -> String {
        self.start.format("%H:%M").to_string()
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// "Summary at HH:MM (location)"
    pub fn display_line(&self) -> String {
        match self.location.as_deref().filter(|l| !l.is_empty()) {
            Some(location) => format!("{} at {} ({})", self.summary, self.time_label(), location),
            None => format!("{} at {}", self.summary, self.time_label()),
        }
    }
}

/// Builds a timestamp on `date` at the given wall-clock time in a fixed offset.
pub fn local_datetime(
    offset: FixedOffset,
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(hour, minute, 0)?
        .and_local_timezone(offset)
        .single()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    View,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::View => write!(f, "view"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Snapshot of the calendar taken at the start of a request.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub current_time: DateTime<FixedOffset>,
    pub todays_events: Vec<Event>,
    pub upcoming_events: Vec<Event>,
    pub time_zone: FixedOffset,
}

impl QueryContext {
    pub fn today(&self) -> NaiveDate {
        self.current_time.date_naive()
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.todays_events
            .iter()
            .chain(self.upcoming_events.iter())
            .cloned()
            .collect()
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        self.todays_events
            .iter()
            .chain(self.upcoming_events.iter())
            .filter(|e| e.local_date(self.time_zone) == date)
            .cloned()
            .collect()
    }

    pub fn time_zone_label(&self) -> String {
        self.time_zone.to_string()
    }
}

/// Uniform answer returned for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub events: Vec<Event>,
    pub success: bool,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn ok(action: Action, answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            events: Vec::new(),
            success: true,
            action,
            error: None,
        }
    }

    pub fn failure(action: Action, answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            events: Vec::new(),
            success: false,
            action,
            error: None,
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Ignored on successful responses.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        if !self.success {
            self.error = Some(error.into());
        }
        self
    }
}

/// Read-only calendar summary served without classifying anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarOverview {
    pub today: Vec<Event>,
    pub upcoming: Vec<Event>,
    pub today_count: usize,
    pub upcoming_count: usize,
    pub next_event: Option<Event>,
}
