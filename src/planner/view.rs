use crate::calendar::types::{Action, Event, QueryContext, QueryResponse, local_datetime};
use crate::nlp::intent::ViewRoute;
use crate::nlp::time_expr::{contains_word, extract_date_phrase, normalize, parse_literal_date};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

pub const OFFLINE_ANSWER: &str = "I'm not sure how to help with that. You can ask me to create events, view your schedule, or delete events.";

const FREE_UNTIL_HOUR: u32 = 22;
const MIN_FREE_MINUTES: i64 = 30;

/// Answers a routed view question from the context alone. `General` has no local answer.
pub fn answer(route: ViewRoute, ctx: &QueryContext, question: &str) -> Option<QueryResponse> {
    let response = match route {
        ViewRoute::DayLookup => day_lookup(ctx, question),
        ViewRoute::ListUpcoming => list_upcoming(ctx),
        ViewRoute::NextEvent => next_event(ctx),
        ViewRoute::KeywordLookup(keyword) => keyword_lookup(ctx, keyword),
        ViewRoute::TodaySchedule => todays_schedule(ctx),
        ViewRoute::FreeTime => free_time(ctx),
        ViewRoute::General => return None,
    };
    Some(response)
}

pub fn offline_answer(reason: impl Into<String>) -> QueryResponse {
    QueryResponse::failure(Action::View, OFFLINE_ANSWER).with_error(reason)
}

fn clock(event: &Event, ctx: &QueryContext) -> String {
    event.start.with_timezone(&ctx.time_zone).format("%H:%M").to_string()
}

fn day_and_clock(event: &Event, ctx: &QueryContext) -> String {
    event
        .start
        .with_timezone(&ctx.time_zone)
        .format("%a %b %-d, %H:%M")
        .to_string()
}

fn with_location(mut line: String, event: &Event) -> String {
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" ({})", location));
    }
    line
}

fn numbered(events: &[Event], render: impl Fn(&Event) -> String) -> String {
    events
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, with_location(render(e), e)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Date a day-lookup question refers to: a literal date, else relative words, else today.
pub fn target_date(ctx: &QueryContext, question: &str) -> NaiveDate {
    let today = ctx.today();

    if let Some(date) = extract_date_phrase(question).and_then(|p| parse_literal_date(&p)) {
        return date;
    }

    let words = normalize(question);
    if words.contains(" day after tomorrow ") {
        today + Duration::days(2)
    } else if contains_word(&words, "tomorrow") || words.contains(" next day ") {
        today + Duration::days(1)
    } else {
        today
    }
}

pub fn day_lookup(ctx: &QueryContext, question: &str) -> QueryResponse {
    let date = target_date(ctx, question);
    let label = date.format("%A, %B %-d");
    let events = ctx.events_on(date);

    if events.is_empty() {
        return QueryResponse::ok(
            Action::View,
            format!("You have no events scheduled for {}.", label),
        );
    }

    let answer = format!(
        "You have {} event(s) on {}:\n{}",
        events.len(),
        label,
        numbered(&events, |e| format!("{} at {}", e.summary, clock(e, ctx)))
    );
    QueryResponse::ok(Action::View, answer).with_events(events)
}

pub fn list_upcoming(ctx: &QueryContext) -> QueryResponse {
    let events: Vec<Event> = ctx
        .all_events()
        .into_iter()
        .filter(|e| e.end > ctx.current_time)
        .collect();

    if events.is_empty() {
        return QueryResponse::ok(Action::View, "You have no upcoming events scheduled.");
    }

    let answer = format!(
        "You have {} upcoming event(s):\n{}",
        events.len(),
        numbered(&events, |e| format!("{} - {}", e.summary, day_and_clock(e, ctx)))
    );
    QueryResponse::ok(Action::View, answer).with_events(events)
}

pub fn next_event(ctx: &QueryContext) -> QueryResponse {
    let Some(next) = ctx
        .all_events()
        .into_iter()
        .find(|e| e.start > ctx.current_time)
    else {
        return QueryResponse::ok(Action::View, "You have no upcoming events scheduled.");
    };

    let when = if next.local_date(ctx.time_zone) == ctx.today() {
        clock(&next, ctx)
    } else {
        day_and_clock(&next, ctx)
    };
    let answer = with_location(format!("Your next event is: {} at {}", next.summary, when), &next);
    QueryResponse::ok(Action::View, answer).with_events(vec![next])
}

pub fn keyword_lookup(ctx: &QueryContext, keyword: &str) -> QueryResponse {
    let events: Vec<Event> = ctx
        .all_events()
        .into_iter()
        .filter(|e| e.summary.to_lowercase().contains(keyword))
        .collect();

    if events.is_empty() {
        return QueryResponse::ok(
            Action::View,
            format!("No events found related to '{}'.", keyword),
        );
    }

    let answer = format!(
        "Found {} event(s) related to '{}':\n{}",
        events.len(),
        keyword,
        numbered(&events, |e| format!("{} - {}", e.summary, day_and_clock(e, ctx)))
    );
    QueryResponse::ok(Action::View, answer).with_events(events)
}

pub fn todays_schedule(ctx: &QueryContext) -> QueryResponse {
    if ctx.todays_events.is_empty() {
        return QueryResponse::ok(Action::View, "You have no events scheduled for today.");
    }

    let answer = format!(
        "Today's schedule ({} event(s)):\n{}",
        ctx.todays_events.len(),
        numbered(&ctx.todays_events, |e| format!("{} at {}", e.summary, clock(e, ctx)))
    );
    QueryResponse::ok(Action::View, answer).with_events(ctx.todays_events.clone())
}

/// Gaps of at least half an hour between now and the end of the day.
pub fn free_slots(ctx: &QueryContext) -> Vec<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let Some(day_end) = local_datetime(ctx.time_zone, ctx.today(), FREE_UNTIL_HOUR, 0) else {
        return Vec::new();
    };

    let mut busy: Vec<&Event> = ctx
        .todays_events
        .iter()
        .filter(|e| e.end > ctx.current_time && e.start < day_end)
        .collect();
    busy.sort_by_key(|e| e.start);

    let mut slots = Vec::new();
    let mut cursor = ctx.current_time;
    for event in busy {
        if event.start > cursor && event.start - cursor >= Duration::minutes(MIN_FREE_MINUTES) {
            slots.push((cursor, event.start));
        }
        cursor = cursor.max(event.end);
    }
    if day_end > cursor && day_end - cursor >= Duration::minutes(MIN_FREE_MINUTES) {
        slots.push((cursor, day_end));
    }

    slots
}

pub fn free_time(ctx: &QueryContext) -> QueryResponse {
    if ctx.todays_events.is_empty() {
        return QueryResponse::ok(
            Action::View,
            "You have no scheduled events today, so you're free all day!",
        );
    }

    let slots = free_slots(ctx);
    if slots.is_empty() {
        return QueryResponse::ok(
            Action::View,
            "Your schedule looks quite busy. Consider checking for longer gaps between events.",
        );
    }

    let ranges: Vec<String> = slots
        .iter()
        .map(|(from, to)| {
            format!(
                "{}-{}",
                from.with_timezone(&ctx.time_zone).format("%H:%M"),
                to.with_timezone(&ctx.time_zone).format("%H:%M")
            )
        })
        .collect();
    QueryResponse::ok(
        Action::View,
        format!("You appear to be free: {}", ranges.join(", ")),
    )
}
