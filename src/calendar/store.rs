use crate::calendar::types::Event;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use tracing::warn;

/// Result of a best-effort bulk insert.
#[derive(Debug, Default)]
pub struct CreateOutcome {
    pub created: Vec<Event>,
    pub failures: Vec<(Event, String)>,
}

impl CreateOutcome {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

/// Backing calendar. Implementations must be safe to share across requests.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Events overlapping `[start, end)`, ordered by start time.
    async fn events_in_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Persists `event` and returns the stored copy carrying its id.
    async fn create_event(&self, event: Event) -> Result<Event, StoreError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError>;

    async fn create_multiple(&self, events: &[Event]) -> CreateOutcome {
        let mut outcome = CreateOutcome::default();

        for event in events {
            match self.create_event(event.clone()).await {
                Ok(created) => outcome.created.push(created),
                Err(e) => {
                    warn!(summary = %event.summary, error = %e, "failed to create event");
                    outcome.failures.push((event.clone(), e.to_string()));
                }
            }
        }

        outcome
    }

    /// Deletes the first event matching exactly, searching one day either side.
    async fn delete_by_summary_and_time(
        &self,
        summary: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<(), StoreError> {
        let window = self
            .events_in_range(start - Duration::hours(24), end + Duration::hours(24))
            .await?;

        let event_id = window
            .into_iter()
            .find(|e| e.summary == summary && e.start == start && e.end == end)
            .and_then(|e| e.event_id)
            .ok_or(StoreError::NotFound)?;

        self.delete_event(&event_id).await
    }
}
