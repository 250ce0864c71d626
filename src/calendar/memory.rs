use crate::calendar::store::CalendarStore;
use crate::calendar::types::Event;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Non-persistent store, used for `store = "memory"` and in tests.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store, assigning ids to events that lack one.
    #[cfg(test)]
    pub fn with_events(events: Vec<Event>) -> Self {
        let events = events
            .into_iter()
            .map(|e| match e.event_id {
                Some(_) => e,
                None => e.with_event_id(Uuid::new_v4().to_string()),
            })
            .collect();

        Self {
            events: RwLock::new(events),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl CalendarStore for MemoryStore {
    async fn events_in_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, StoreError> {
        let mut found: Vec<Event> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.start < end && e.end > start)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    async fn create_event(&self, event: Event) -> Result<Event, StoreError> {
        let stored = event.with_event_id(Uuid::new_v4().to_string());
        self.events.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let position = events
            .iter()
            .position(|e| e.event_id.as_deref() == Some(event_id))
            .ok_or(StoreError::NotFound)?;
        events.remove(position);
        Ok(())
    }
}
