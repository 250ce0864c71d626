use crate::calendar::store::CalendarStore;
use crate::calendar::types::{
    Action, CalendarOverview, Event, QueryContext, QueryResponse, local_datetime,
};
use crate::llm::ProviderChain;
use crate::nlp::fallback::FallbackRuleEngine;
use crate::nlp::intent::{
    DELETE_KEYWORDS, Intent, classify, classify_strict, has_view_vocabulary, view_route,
};
use crate::nlp::plan_parser::{ParseMode, PlanParser, clean_fences};
use crate::nlp::time_expr::{contains_word, extract_date_phrase, normalize, parse_literal_date};
use crate::planner::conflict::ConflictChecker;
use crate::planner::prompt::{scheduling_prompt, view_prompt};
use crate::planner::view;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NO_VALID_EVENTS: &str = "No valid events could be created. Please check for time conflicts.";

const DELETE_STOPWORDS: [&str; 24] = [
    "my", "the", "a", "an", "all", "today", "tomorrow", "yesterday", "upcoming", "event",
    "events", "on", "for", "from", "at", "in", "of", "to", "please", "this", "that", "these",
    "those", "and",
];

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub time_zone: FixedOffset,
    /// Look-ahead window for "upcoming" events.
    pub upcoming_days: i64,
    /// Provider plans with more events than this are rejected.
    pub max_plan_events: usize,
    /// Deleting more matches than this requires "all" in the request.
    pub delete_confirmation_threshold: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            time_zone: FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or(FixedOffset::east_opt(0).unwrap()),
            upcoming_days: 7,
            max_plan_events: 5,
            delete_confirmation_threshold: 5,
        }
    }
}

/// Answers natural-language calendar requests. Holds no per-request state.
pub struct QueryOrchestrator {
    store: Arc<dyn CalendarStore>,
    providers: ProviderChain,
    settings: AssistantSettings,
}

fn slot_key(event: &Event) -> (String, i64, i64) {
    (
        event.summary.clone(),
        event.start.timestamp(),
        event.end.timestamp(),
    )
}

fn summary_list(events: &[Event]) -> String {
    events
        .iter()
        .map(|e| e.summary.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Summary match for a delete keyword; "meetings" also matches "Meeting".
fn summary_matches(summary: &str, keyword: &str) -> bool {
    let summary = summary.to_lowercase();
    summary.contains(keyword)
        || keyword
            .strip_suffix('s')
            .is_some_and(|stem| stem.len() > 2 && summary.contains(stem))
}

fn describe_created(events: &[Event], tz: FixedOffset) -> String {
    events
        .iter()
        .map(|e| {
            format!(
                "{} ({})",
                e.summary,
                e.start.with_timezone(&tz).format("%a %b %-d, %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// First meaningful word after the delete verb, e.g. "gym" in "delete my gym session".
pub fn delete_keyword(question: &str) -> Option<String> {
    let words = normalize(question);

    // The verb may be inflected ("cancelled", "removing"), so match word starts only
    let (position, verb) = DELETE_KEYWORDS
        .iter()
        .filter_map(|k| words.find(&format!(" {}", k)).map(|p| (p, *k)))
        .min_by_key(|(p, _)| *p)?;

    let tail = &words[position + verb.len() + 1..];
    let rest = tail.find(' ').map_or("", |i| &tail[i..]);

    rest.split_whitespace()
        .map(|w| w.trim_end_matches("'s"))
        .find(|w| {
            w.len() > 2
                && !DELETE_STOPWORDS.contains(w)
                && !w.chars().any(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
}

impl QueryOrchestrator {
    pub fn new(
        store: Arc<dyn CalendarStore>,
        providers: ProviderChain,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            store,
            providers,
            settings,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.settings.time_zone)
    }

    fn day_bounds(&self, date: NaiveDate) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let start = local_datetime(self.settings.time_zone, date, 0, 0)?;
        Some((start, start + Duration::days(1)))
    }

    async fn read_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        scope: &str,
    ) -> Vec<Event> {
        match self.store.events_in_range(start, end).await {
            Ok(events) => events,
            Err(e) => {
                warn!(scope, error = %e, "calendar read failed, continuing without events");
                Vec::new()
            }
        }
    }

    async fn events_on_day(&self, date: NaiveDate) -> Vec<Event> {
        let tz = self.settings.time_zone;
        match self.day_bounds(date) {
            Some((start, end)) => self
                .read_events(start, end, "day")
                .await
                .into_iter()
                .filter(|e| e.local_date(tz) == date)
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn build_context(&self, now: DateTime<FixedOffset>) -> QueryContext {
        let tz = self.settings.time_zone;
        let now = now.with_timezone(&tz);
        let today = now.date_naive();
        let (day_start, day_end) = self
            .day_bounds(today)
            .unwrap_or((now, now + Duration::days(1)));
        let horizon = now + Duration::days(self.settings.upcoming_days);

        let (todays, upcoming) = futures::future::join(
            self.read_events(day_start, day_end, "today"),
            self.read_events(now, horizon, "upcoming"),
        )
        .await;

        let mut seen = HashSet::new();
        let mut todays_events: Vec<Event> = todays
            .into_iter()
            .filter(|e| e.local_date(tz) == today)
            .filter(|e| seen.insert(slot_key(e)))
            .collect();
        let mut upcoming_events: Vec<Event> = upcoming
            .into_iter()
            .filter(|e| e.local_date(tz) != today)
            .filter(|e| seen.insert(slot_key(e)))
            .collect();

        todays_events.sort_by_key(|e| e.start);
        upcoming_events.sort_by_key(|e| e.start);

        debug!(
            today = todays_events.len(),
            upcoming = upcoming_events.len(),
            "built query context"
        );

        QueryContext {
            current_time: now,
            todays_events,
            upcoming_events,
            time_zone: tz,
        }
    }

    /// Conversational entry point: provider failures fall back to the rule engine.
    pub async fn handle_query(&self, question: &str) -> QueryResponse {
        self.handle_query_at(question, self.now()).await
    }

    pub async fn handle_query_at(&self, question: &str, now: DateTime<FixedOffset>) -> QueryResponse {
        let question = question.trim();
        if question.is_empty() {
            return QueryResponse::failure(Action::View, "Please ask me something about your calendar.")
                .with_error("empty question");
        }

        // "what's my schedule today" has a schedule verb and a time word but is a question.
        let intent = match classify(question) {
            Intent::Create if has_view_vocabulary(question) => Intent::View,
            intent => intent,
        };
        info!(%intent, question, "handling query");

        let ctx = self.build_context(now).await;
        match intent {
            Intent::Delete => self.delete_flow(&ctx, question).await,
            Intent::Create => self.create_conversational(&ctx, question).await,
            Intent::View => self.view_flow(&ctx, question).await,
        }
    }

    /// Entry point for requests from outside the process. Creation never falls back
    /// to the rule engine and model output is parsed strictly.
    pub async fn handle_request(&self, question: &str) -> QueryResponse {
        self.handle_request_at(question, self.now()).await
    }

    pub async fn handle_request_at(&self, question: &str, now: DateTime<FixedOffset>) -> QueryResponse {
        let question = question.trim();
        if question.is_empty() {
            return QueryResponse::failure(Action::View, "Please ask me something about your calendar.")
                .with_error("question is required");
        }

        let intent = classify_strict(question);
        info!(%intent, question, "handling request");

        let ctx = self.build_context(now).await;
        match intent {
            Intent::Create => self.create_strict(&ctx, question).await,
            Intent::Delete => self.delete_flow(&ctx, question).await,
            Intent::View => self.view_flow(&ctx, question).await,
        }
    }

    /// One response per question, strictly in order.
    pub async fn handle_batch(&self, questions: &[String]) -> Vec<QueryResponse> {
        let mut responses = Vec::with_capacity(questions.len());
        for question in questions {
            responses.push(self.handle_query(question).await);
        }
        responses
    }

    async fn create_conversational(&self, ctx: &QueryContext, question: &str) -> QueryResponse {
        let existing = ctx.all_events();

        let plan = match self.providers.complete(&scheduling_prompt(ctx, question)).await {
            Ok(raw) => match PlanParser::parse(&raw, ParseMode::Lenient) {
                Ok(events) if events.is_empty() => {
                    warn!("provider plan was empty, using rule engine");
                    None
                }
                Ok(events) if events.len() > self.settings.max_plan_events => {
                    return self.too_many_events(events.len());
                }
                Ok(events) => Some(events),
                Err(e) => {
                    warn!(error = %e, "could not parse provider plan, using rule engine");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "no provider plan, using rule engine");
                None
            }
        };

        let plan = plan
            .unwrap_or_else(|| FallbackRuleEngine::plan(question, &existing, ctx.current_time));
        self.place(plan, &existing).await
    }

    async fn create_strict(&self, ctx: &QueryContext, question: &str) -> QueryResponse {
        let raw = match self.providers.complete(&scheduling_prompt(ctx, question)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "scheduling provider unavailable");
                return QueryResponse::failure(
                    Action::Create,
                    "I can't schedule events right now because the AI service is not available. Please try again later.",
                )
                .with_error(e.to_string());
            }
        };

        let plan = match PlanParser::parse(&raw, ParseMode::Strict) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "rejecting provider plan");
                return QueryResponse::failure(
                    Action::Create,
                    "I understood your request but couldn't create a properly formatted event. Please try again.",
                )
                .with_error(e.to_string());
            }
        };

        if plan.is_empty() {
            return QueryResponse::failure(
                Action::Create,
                "I couldn't identify any events to create from your request.",
            )
            .with_error("empty plan");
        }

        if plan.len() > self.settings.max_plan_events {
            return self.too_many_events(plan.len());
        }

        self.place(plan, &ctx.all_events()).await
    }

    fn too_many_events(&self, count: usize) -> QueryResponse {
        warn!(count, "provider plan exceeds event limit");
        QueryResponse::failure(
            Action::Create,
            format!(
                "That request produced {} events, more than the {} I can create at once. Please be more specific.",
                count, self.settings.max_plan_events
            ),
        )
        .with_error("too many events in plan")
    }

    /// Persists the candidates that fit the calendar. Clashing ones are skipped, never moved.
    async fn place(&self, plan: Vec<Event>, existing: &[Event]) -> QueryResponse {
        let (free, clashing) = ConflictChecker::without_conflicts(plan, existing);
        for event in &clashing {
            info!(summary = %event.summary, "skipping conflicting event");
        }

        if free.is_empty() {
            return Self::all_conflicting(clashing, existing);
        }

        debug!(plan = %PlanParser::to_json(&free), "persisting plan");
        self.persist(free, clashing.len()).await
    }

    // Nothing is created, but free hours on the same day are offered as suggestions.
    fn all_conflicting(clashing: Vec<Event>, existing: &[Event]) -> QueryResponse {
        let suggestions = ConflictChecker::resolve(clashing, existing);
        let mut answer = NO_VALID_EVENTS.to_string();
        if !suggestions.is_empty() {
            answer.push_str("\nFree alternatives:");
            for event in &suggestions {
                answer.push_str(&format!("\n- {}", event.display_line()));
            }
        }

        QueryResponse::failure(Action::Create, answer)
            .with_error("every candidate event conflicts with the calendar")
    }

    async fn persist(&self, events: Vec<Event>, skipped: usize) -> QueryResponse {
        let outcome = self.store.create_multiple(&events).await;

        if outcome.is_empty() {
            let reasons: Vec<String> = outcome
                .failures
                .iter()
                .map(|(e, reason)| format!("{}: {}", e.summary, reason))
                .collect();
            return QueryResponse::failure(
                Action::Create,
                "I couldn't save any of the events to your calendar.",
            )
            .with_error(reasons.join("; "));
        }

        let mut answer = format!(
            "Created {} event(s): {}",
            outcome.created.len(),
            describe_created(&outcome.created, self.settings.time_zone)
        );
        if !outcome.failures.is_empty() {
            let failed: Vec<Event> = outcome.failures.iter().map(|(e, _)| e.clone()).collect();
            answer.push_str(&format!("\nCould not save: {}", summary_list(&failed)));
        }
        if skipped > 0 {
            answer.push_str(&format!(
                "\nSkipped {} event(s) that conflict with your calendar.",
                skipped
            ));
        }

        info!(created = outcome.created.len(), failed = outcome.failures.len(), "events created");
        QueryResponse::ok(Action::Create, answer).with_events(outcome.created)
    }

    async fn delete_candidates(&self, ctx: &QueryContext, question: &str) -> Vec<Event> {
        let words = normalize(question);
        let today = ctx.today();
        let keyword = delete_keyword(question);
        let matches_keyword = |e: &Event| match &keyword {
            Some(k) => summary_matches(&e.summary, k),
            None => true,
        };

        if contains_word(&words, "all") {
            let scope = if contains_word(&words, "today") {
                ctx.events_on(today)
            } else if contains_word(&words, "tomorrow") {
                ctx.events_on(today + Duration::days(1))
            } else if contains_word(&words, "upcoming") {
                ctx.all_events()
                    .into_iter()
                    .filter(|e| e.start > ctx.current_time)
                    .collect()
            } else {
                ctx.all_events()
            };
            return scope.into_iter().filter(|e| matches_keyword(e)).collect();
        }

        let date = extract_date_phrase(question)
            .and_then(|p| parse_literal_date(&p))
            .or_else(|| {
                if contains_word(&words, "today") {
                    Some(today)
                } else if contains_word(&words, "tomorrow") {
                    Some(today + Duration::days(1))
                } else if contains_word(&words, "yesterday") {
                    Some(today - Duration::days(1))
                } else {
                    None
                }
            });
        debug!(?date, ?keyword, "delete scope");

        match (date, &keyword) {
            (Some(date), _) => self
                .events_on_day(date)
                .await
                .into_iter()
                .filter(|e| matches_keyword(e))
                .collect(),
            (None, Some(_)) => ctx
                .all_events()
                .into_iter()
                .filter(|e| matches_keyword(e))
                .collect(),
            (None, None) => Vec::new(),
        }
    }

    async fn delete_flow(&self, ctx: &QueryContext, question: &str) -> QueryResponse {
        let candidates = self.delete_candidates(ctx, question).await;
        let confirmed = contains_word(&normalize(question), "all");

        if candidates.is_empty() {
            return QueryResponse::failure(Action::Delete, "No matching events found to delete.")
                .with_error("no matching events");
        }

        if !confirmed && candidates.len() > self.settings.delete_confirmation_threshold {
            let listing: Vec<String> = candidates.iter().map(|e| format!("- {}", e.display_line())).collect();
            return QueryResponse::failure(
                Action::Delete,
                format!(
                    "Found {} matching events. To delete them, say \"delete all\" with the same details:\n{}",
                    candidates.len(),
                    listing.join("\n")
                ),
            )
            .with_events(candidates)
            .with_error("confirmation required");
        }

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for event in candidates {
            let result = match event.event_id.as_deref() {
                Some(id) => self.store.delete_event(id).await,
                None => {
                    self.store
                        .delete_by_summary_and_time(&event.summary, event.start, event.end)
                        .await
                }
            };

            match result {
                Ok(()) => deleted.push(event),
                Err(e) => {
                    warn!(summary = %event.summary, error = %e, "failed to delete event");
                    failed.push(event);
                }
            }
        }

        let mut lines = Vec::new();
        if !deleted.is_empty() {
            lines.push(format!("Deleted {} event(s): {}", deleted.len(), summary_list(&deleted)));
        }
        if !failed.is_empty() {
            lines.push(format!("Failed to delete {} event(s): {}", failed.len(), summary_list(&failed)));
        }
        let answer = lines.join("\n");

        info!(deleted = deleted.len(), failed = failed.len(), "delete finished");
        if deleted.is_empty() {
            QueryResponse::failure(Action::Delete, answer)
                .with_error("no events could be deleted")
        } else {
            QueryResponse::ok(Action::Delete, answer).with_events(deleted)
        }
    }

    async fn view_flow(&self, ctx: &QueryContext, question: &str) -> QueryResponse {
        let route = view_route(question);
        debug!(?route, "view route");
        if let Some(response) = view::answer(route, ctx, question) {
            return response;
        }

        if self.providers.is_empty() {
            return view::offline_answer("no completion provider configured");
        }

        match self.providers.complete(&view_prompt(ctx, question)).await {
            Ok(raw) => {
                let cleaned = clean_fences(&raw);
                match PlanParser::parse_reply(&cleaned) {
                    Some(reply) => QueryResponse::ok(Action::View, reply.answer).with_events(reply.events),
                    None => QueryResponse::ok(Action::View, cleaned),
                }
            }
            Err(e) => {
                warn!(error = %e, "view provider failed");
                view::offline_answer(e.to_string())
            }
        }
    }

    /// Today's and upcoming events without classifying anything.
    pub async fn overview(&self) -> CalendarOverview {
        self.overview_at(self.now()).await
    }

    pub async fn overview_at(&self, now: DateTime<FixedOffset>) -> CalendarOverview {
        let ctx = self.build_context(now).await;
        let next_event = ctx
            .all_events()
            .into_iter()
            .find(|e| e.start > ctx.current_time);

        CalendarOverview {
            today_count: ctx.todays_events.len(),
            upcoming_count: ctx.upcoming_events.len(),
            today: ctx.todays_events,
            upcoming: ctx.upcoming_events,
            next_event,
        }
    }

    pub async fn stats(&self) -> QueryResponse {
        self.stats_at(self.now()).await
    }

    pub async fn stats_at(&self, now: DateTime<FixedOffset>) -> QueryResponse {
        let overview = self.overview_at(now).await;
        let mut answer = format!(
            "Calendar Stats:\n• Today: {} events\n• Next {} days: {} events",
            overview.today_count, self.settings.upcoming_days, overview.upcoming_count
        );

        if let Some(next) = &overview.next_event {
            let until = next.start - now;
            if until < Duration::hours(24) {
                answer.push_str(&format!(
                    "\n• Next event: {} in {} hours",
                    next.summary,
                    until.num_hours()
                ));
            } else {
                answer.push_str(&format!(
                    "\n• Next event: {} on {}",
                    next.summary,
                    next.start.with_timezone(&self.settings.time_zone).format("%a %b %-d")
                ));
            }
        }

        let mut events = overview.today;
        events.extend(overview.upcoming);
        QueryResponse::ok(Action::View, answer).with_events(events)
    }

    /// Case-insensitive match on summary, description and location over the next `days` days.
    pub async fn search(&self, keyword: &str, days: i64) -> QueryResponse {
        self.search_at(keyword, days, self.now()).await
    }

    pub async fn search_at(&self, keyword: &str, days: i64, now: DateTime<FixedOffset>) -> QueryResponse {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return QueryResponse::failure(Action::View, "Please give me a keyword to search for.")
                .with_error("empty keyword");
        }

        let events = match self.store.events_in_range(now, now + Duration::days(days.max(1))).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "search failed");
                return QueryResponse::failure(Action::View, format!("Error searching calendar: {}", e))
                    .with_error(e.to_string());
            }
        };

        let found: Vec<Event> = events
            .into_iter()
            .filter(|e| {
                [Some(&e.summary), e.description.as_ref(), e.location.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect();

        if found.is_empty() {
            return QueryResponse::ok(
                Action::View,
                format!("No events found matching '{}' in the next {} days.", keyword.trim(), days),
            );
        }

        let tz = self.settings.time_zone;
        let lines: Vec<String> = found
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut line = format!(
                    "{}. {} - {}",
                    i + 1,
                    e.summary,
                    e.start.with_timezone(&tz).format("%a %b %-d, %H:%M")
                );
                if let Some(location) = &e.location {
                    line.push_str(&format!(" at {}", location));
                }
                line
            })
            .collect();

        QueryResponse::ok(
            Action::View,
            format!(
                "Found {} events matching '{}':\n{}",
                found.len(),
                keyword.trim(),
                lines.join("\n")
            ),
        )
        .with_events(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::memory::MemoryStore;
    use crate::llm::CompletionProvider;
    use crate::llm::testing::ScriptedProvider;
    use crate::planner::view::OFFLINE_ANSWER;
    use std::time::Duration as StdDuration;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(19800).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        local_datetime(ist(), NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), hour, 0).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        at(1, 10)
    }

    fn event(summary: &str, day: u32, from: u32, to: u32) -> Event {
        Event::new(summary, at(day, from), at(day, to)).unwrap()
    }

    fn chain(providers: Vec<Arc<dyn CompletionProvider>>) -> ProviderChain {
        ProviderChain::new(providers, StdDuration::from_secs(5))
    }

    fn orchestrator(store: Arc<MemoryStore>, providers: ProviderChain) -> QueryOrchestrator {
        let settings = AssistantSettings {
            time_zone: ist(),
            ..AssistantSettings::default()
        };
        QueryOrchestrator::new(store, providers, settings)
    }

    fn busy_week() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_events(vec![
            event("Gym", 1, 7, 8),
            event("Standup", 1, 11, 12),
            event("Lunch", 1, 13, 14),
            event("Dentist", 2, 15, 16).with_location("Main St"),
            event("Review", 3, 9, 10),
        ]))
    }

    const TOO_MANY: &str = r#"[
        {"summary":"A","start":"2025-01-02T08:00:00+05:30","end":"2025-01-02T09:00:00+05:30"},
        {"summary":"B","start":"2025-01-02T09:00:00+05:30","end":"2025-01-02T10:00:00+05:30"},
        {"summary":"C","start":"2025-01-02T10:00:00+05:30","end":"2025-01-02T11:00:00+05:30"},
        {"summary":"D","start":"2025-01-02T11:00:00+05:30","end":"2025-01-02T12:00:00+05:30"},
        {"summary":"E","start":"2025-01-02T12:00:00+05:30","end":"2025-01-02T13:00:00+05:30"},
        {"summary":"F","start":"2025-01-02T13:00:00+05:30","end":"2025-01-02T14:00:00+05:30"}
    ]"#;

    #[tokio::test]
    async fn test_context_splits_and_dedupes() {
        let store = Arc::new(MemoryStore::with_events(vec![
            event("Gym", 1, 7, 8),
            event("Gym", 1, 7, 8),
            event("Standup", 1, 11, 12),
            event("Dentist", 2, 15, 16),
        ]));
        let ctx = orchestrator(store, ProviderChain::empty())
            .build_context(now())
            .await;

        let today: Vec<_> = ctx.todays_events.iter().map(|e| e.summary.as_str()).collect();
        let upcoming: Vec<_> = ctx.upcoming_events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(today, vec!["Gym", "Standup"]);
        assert_eq!(upcoming, vec!["Dentist"]);
        assert_eq!(ctx.current_time, now());
    }

    #[tokio::test]
    async fn test_empty_question_fails() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());
        let response = assistant.handle_query_at("   ", now()).await;
        assert!(!response.success);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_delete_all_today_keeps_other_days() {
        let store = busy_week();
        let assistant = orchestrator(store.clone(), ProviderChain::empty());

        let response = assistant.handle_query_at("delete all events today", now()).await;

        assert!(response.success);
        assert_eq!(response.action, Action::Delete);
        assert_eq!(response.events.len(), 3);
        assert!(response.answer.starts_with("Deleted 3 event(s): Gym, Standup, Lunch"));
        let left: Vec<_> = store.snapshot().await.into_iter().map(|e| e.summary).collect();
        assert_eq!(left, vec!["Dentist", "Review"]);
    }

    #[tokio::test]
    async fn test_delete_by_keyword() {
        let store = busy_week();
        let assistant = orchestrator(store.clone(), ProviderChain::empty());

        let response = assistant.handle_query_at("cancel my dentist appointment", now()).await;

        assert!(response.success);
        assert_eq!(response.events[0].summary, "Dentist");
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_delete_without_match() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());
        let response = assistant.handle_query_at("delete yoga", now()).await;
        assert!(!response.success);
        assert_eq!(response.answer, "No matching events found to delete.");
    }

    #[tokio::test]
    async fn test_large_delete_needs_confirmation() {
        let store = Arc::new(MemoryStore::with_events(
            (2..=7).map(|day| event("Gym", day, 7, 8)).collect(),
        ));
        let assistant = orchestrator(store.clone(), ProviderChain::empty());

        let response = assistant.handle_query_at("delete gym", now()).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("confirmation required"));
        assert_eq!(response.events.len(), 6);
        assert_eq!(store.len().await, 6);

        let confirmed = assistant.handle_query_at("delete all gym sessions", now()).await;
        assert!(confirmed.success);
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn test_delete_keyword_extraction() {
        assert_eq!(delete_keyword("delete my gym session").as_deref(), Some("gym"));
        assert_eq!(delete_keyword("please remove the standup's invite").as_deref(), Some("standup"));
        assert_eq!(delete_keyword("get rid of lunch tomorrow").as_deref(), Some("lunch"));
        assert_eq!(delete_keyword("delete all events today"), None);
        assert_eq!(delete_keyword("clear 2025-01-02"), None);
        assert_eq!(delete_keyword("removing the standup tomorrow").as_deref(), Some("standup"));
    }

    #[tokio::test]
    async fn test_conversational_create_falls_back_to_rules() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::failing());
        let assistant = orchestrator(
            store.clone(),
            chain(vec![provider.clone() as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_query_at("schedule gym tomorrow at 2pm", now())
            .await;

        assert!(response.success, "{}", response.answer);
        assert_eq!(provider.prompt_count(), 1);
        assert_eq!(response.answer, "Created 1 event(s): Gym Session (Thu Jan 2, 14:00)");
        assert!(response.events[0].event_id.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_conversational_create_never_moves_clashing_plan() {
        let store = Arc::new(MemoryStore::with_events(vec![event("Standup", 2, 14, 15)]));
        let reply = r#"[{"summary":"Gym","start":"2025-01-02T14:00:00+05:30","end":"2025-01-02T15:00:00+05:30"}]"#;
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_query_at("schedule gym tomorrow at 2pm", now())
            .await;

        assert!(!response.success);
        assert!(response.answer.starts_with(NO_VALID_EVENTS));
        assert!(response.events.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_conversational_create_skips_only_clashing_events() {
        let store = Arc::new(MemoryStore::with_events(vec![event("Standup", 2, 9, 10)]));
        let reply = r#"[
            {"summary":"Review","start":"2025-01-02T09:00:00+05:30","end":"2025-01-02T10:00:00+05:30"},
            {"summary":"Gym","start":"2025-01-02T18:00:00+05:30","end":"2025-01-02T19:00:00+05:30"}
        ]"#;
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_query_at("add a review at 9am and gym at 6pm tomorrow", now())
            .await;

        assert!(response.success);
        assert_eq!(response.events.len(), 1);
        assert_eq!(response.events[0].summary, "Gym");
        assert!(response.answer.contains("Skipped 1 event(s)"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_conversational_create_rejects_oversized_plan() {
        let store = Arc::new(MemoryStore::new());
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(TOO_MANY)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_query_at("schedule my meeting day tomorrow at 8am", now())
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("too many events in plan"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_strict_create_rejects_oversized_plan() {
        let store = Arc::new(MemoryStore::new());
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(TOO_MANY)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_request_at("schedule six meetings tomorrow", now())
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("too many events in plan"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_strict_create_keeps_whole_plan_after_bracketed_prose() {
        let store = Arc::new(MemoryStore::new());
        let reply = r#"Plan [v2]:
[{"summary":"A","start":"2025-01-02T08:00:00+05:30","end":"2025-01-02T09:00:00+05:30"},
 {"summary":"B","start":"2025-01-02T10:00:00+05:30","end":"2025-01-02T11:00:00+05:30"}]"#;
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_request_at("schedule A and B tomorrow morning", now())
            .await;

        assert!(response.success);
        assert_eq!(response.events.len(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_strict_create_with_only_conflicts_fails() {
        let store = Arc::new(MemoryStore::with_events(vec![event("Standup", 2, 11, 12)]));
        let reply = r#"[{"summary":"Review","start":"2025-01-02T11:00:00+05:30","end":"2025-01-02T12:00:00+05:30"}]"#;
        let assistant = orchestrator(
            store.clone(),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_request_at("schedule a review tomorrow at 11am", now())
            .await;

        assert!(!response.success);
        assert!(response.answer.starts_with(NO_VALID_EVENTS));
        assert!(response.answer.contains("Review at 06:00"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_strict_create_never_uses_rules() {
        let store = Arc::new(MemoryStore::new());
        let assistant = orchestrator(store.clone(), ProviderChain::empty());

        let response = assistant
            .handle_request_at("schedule gym tomorrow at 2pm", now())
            .await;

        assert!(!response.success);
        assert_eq!(response.action, Action::Create);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_strict_create_rejects_malformed_plan() {
        let reply = r#"[{"summary":"Gym","start":"tomorrow","end":"later"}]"#;
        let assistant = orchestrator(
            Arc::new(MemoryStore::new()),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant
            .handle_request_at("schedule gym tomorrow at 2pm", now())
            .await;

        assert!(!response.success);
        assert!(response.answer.contains("properly formatted"));
    }

    #[tokio::test]
    async fn test_view_without_provider_is_offline_answer() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());
        let response = assistant.handle_query_at("how was my week", now()).await;
        assert!(!response.success);
        assert_eq!(response.answer, OFFLINE_ANSWER);
    }

    #[tokio::test]
    async fn test_view_uses_local_routes_first() {
        let provider = Arc::new(ScriptedProvider::failing());
        let assistant = orchestrator(
            busy_week(),
            chain(vec![provider.clone() as Arc<dyn CompletionProvider>]),
        );

        let response = assistant.handle_query_at("what do I have tomorrow?", now()).await;

        assert!(response.success);
        assert_eq!(response.events[0].summary, "Dentist");
        assert_eq!(provider.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_view_decodes_provider_reply() {
        let reply = "```json\n{\"answer\": \"Fairly light week.\", \"events\": []}\n```";
        let assistant = orchestrator(
            busy_week(),
            chain(vec![Arc::new(ScriptedProvider::replying(reply)) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant.handle_query_at("how busy is my week", now()).await;
        assert!(response.success);
        assert_eq!(response.answer, "Fairly light week.");
    }

    #[tokio::test]
    async fn test_view_keeps_unstructured_reply() {
        let assistant = orchestrator(
            busy_week(),
            chain(vec![Arc::new(ScriptedProvider::replying("Looks quiet.")) as Arc<dyn CompletionProvider>]),
        );

        let response = assistant.handle_query_at("how busy is my week", now()).await;
        assert!(response.success);
        assert_eq!(response.answer, "Looks quiet.");
    }

    #[tokio::test]
    async fn test_batch_answers_in_order() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());
        let questions = vec![
            "what's my next event".to_string(),
            "delete yoga".to_string(),
        ];

        let responses = assistant.handle_batch(&questions).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].action, Action::View);
        assert_eq!(responses[1].action, Action::Delete);
    }

    #[tokio::test]
    async fn test_overview_and_stats() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());

        let overview = assistant.overview_at(now()).await;
        assert_eq!(overview.today_count, 3);
        assert_eq!(overview.upcoming_count, 2);
        assert_eq!(overview.next_event.map(|e| e.summary).as_deref(), Some("Standup"));

        let stats = assistant.stats_at(now()).await;
        assert_eq!(
            stats.answer,
            "Calendar Stats:\n• Today: 3 events\n• Next 7 days: 2 events\n• Next event: Standup in 1 hours"
        );
    }

    #[tokio::test]
    async fn test_search_matches_location() {
        let assistant = orchestrator(busy_week(), ProviderChain::empty());

        let found = assistant.search_at("main st", 7, now()).await;
        assert_eq!(
            found.answer,
            "Found 1 events matching 'main st':\n1. Dentist - Thu Jan 2, 15:00 at Main St"
        );

        let missing = assistant.search_at("yoga", 7, now()).await;
        assert_eq!(missing.answer, "No events found matching 'yoga' in the next 7 days.");
        assert!(missing.events.is_empty());
    }
}
