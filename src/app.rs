use crate::calendar::{Action, Event, QueryResponse};
use crate::planner::QueryOrchestrator;
use std::sync::Arc;
use tracing::debug;

pub enum InputMode {
    Normal,
    Editing,
}

/// One question and the assistant's answer to it.
#[derive(Clone)]
pub struct Exchange {
    pub question: String,
    pub response: QueryResponse,
}

pub struct App {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub history: Vec<Exchange>,
    pub today: Vec<Event>,
    pub upcoming: Vec<Event>,
    pub next_event: Option<Event>,
    pub selected: usize,
    pub input_mode: InputMode,
    pub input_buffer: String,
}

impl App {
    pub fn new(orchestrator: Arc<QueryOrchestrator>) -> Self {
        Self {
            orchestrator,
            history: Vec::new(),
            today: Vec::new(),
            upcoming: Vec::new(),
            next_event: None,
            selected: 0,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
        }
    }

    // Reload the calendar panels from the store
    pub async fn refresh(&mut self) {
        let overview = self.orchestrator.overview().await;
        debug!(
            today = overview.today_count,
            upcoming = overview.upcoming_count,
            "refreshed calendar panels"
        );
        self.today = overview.today;
        self.upcoming = overview.upcoming;
        self.next_event = overview.next_event;
    }

    // Send the input buffer to the assistant and select the new answer
    pub async fn submit(&mut self) {
        let question = self.input_buffer.trim().to_string();
        self.input_buffer.clear();
        self.input_mode = InputMode::Normal;

        if question.is_empty() {
            return;
        }

        let response = self.orchestrator.handle_query(&question).await;
        let changed = response.success && response.action != Action::View;

        self.history.push(Exchange { question, response });
        self.selected = self.history.len() - 1;

        if changed {
            self.refresh().await;
        }
    }

    pub fn selected_exchange(&self) -> Option<&Exchange> {
        self.history.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.history.is_empty() {
            let max = self.history.len() - 1;
            if self.selected < max {
                self.selected += 1;
            }
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.selected = 0;
    }
}
