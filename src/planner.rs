pub mod conflict;
pub mod orchestrator;
pub mod prompt;
pub mod view;

pub use orchestrator::{AssistantSettings, QueryOrchestrator};
