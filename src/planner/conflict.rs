use crate::calendar::types::{Event, local_datetime};
use chrono::Duration;
use tracing::debug;

const BREAK_WORDS: [&str; 3] = ["lunch", "break", "meal"];
const WORK_WORDS: [&str; 3] = ["work", "office", "job"];
const FIRST_SLOT_HOUR: u32 = 6;
const LAST_SLOT_HOUR: u32 = 22;

fn mentions(summary: &str, words: &[&str]) -> bool {
    let summary = summary.to_lowercase();
    words.iter().any(|w| summary.contains(w))
}

/// A short break nested inside a work block does not count as a clash.
/// Only applies with the break as the candidate.
fn is_break_during_work(candidate: &Event, existing: &Event) -> bool {
    mentions(&candidate.summary, &BREAK_WORDS)
        && mentions(&existing.summary, &WORK_WORDS)
        && existing.contains(candidate)
        && candidate.duration() <= Duration::hours(2)
}

pub struct ConflictChecker;

impl ConflictChecker {
    pub fn has_conflict(candidate: &Event, existing: &[Event]) -> bool {
        existing
            .iter()
            .any(|e| candidate.overlaps(e) && !is_break_during_work(candidate, e))
    }

    pub fn without_conflicts(candidates: Vec<Event>, existing: &[Event]) -> (Vec<Event>, Vec<Event>) {
        candidates
            .into_iter()
            .partition(|c| !Self::has_conflict(c, existing))
    }

    /// Keeps free candidates and moves clashing ones to the first free whole hour
    /// between 06:00 and 22:00 on the same day. Candidates with no free slot are dropped.
    pub fn resolve(candidates: Vec<Event>, existing: &[Event]) -> Vec<Event> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                if !Self::has_conflict(&candidate, existing) {
                    return Some(candidate);
                }

                let moved = Self::find_alternative(&candidate, existing);
                if moved.is_none() {
                    debug!(summary = %candidate.summary, "no free slot, dropping event");
                }
                moved
            })
            .collect()
    }

    fn find_alternative(candidate: &Event, existing: &[Event]) -> Option<Event> {
        let offset = *candidate.start.offset();
        let date = candidate.date();
        let duration = candidate.duration();

        (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR).find_map(|hour| {
            let start = local_datetime(offset, date, hour, 0)?;
            let moved = Event {
                start,
                end: start + duration,
                ..candidate.clone()
            };
            (!Self::has_conflict(&moved, existing)).then_some(moved)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate};

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(19800).unwrap();
        local_datetime(offset, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), hour, minute).unwrap()
    }

    fn event(summary: &str, from: (u32, u32), to: (u32, u32)) -> Event {
        Event::new(summary, at(from.0, from.1), at(to.0, to.1)).unwrap()
    }

    #[test]
    fn test_event_conflicts_with_itself() {
        let a = event("Gym", (7, 0), (8, 0));
        assert!(ConflictChecker::has_conflict(&a, &[a.clone()]));
    }

    #[test]
    fn test_disjoint_and_touching_never_conflict() {
        let a = event("A", (7, 0), (8, 0));
        let b = event("B", (8, 0), (9, 0));
        let c = event("C", (12, 0), (13, 0));
        assert!(!ConflictChecker::has_conflict(&a, &[b.clone(), c.clone()]));
        assert!(!ConflictChecker::has_conflict(&b, &[a, c]));
    }

    #[test]
    fn test_lunch_inside_work_is_exempt() {
        let work = event("Work", (9, 0), (17, 0));
        let lunch = event("Lunch Break", (12, 30), (13, 0));
        assert!(!ConflictChecker::has_conflict(&lunch, &[work]));
    }

    #[test]
    fn test_lunch_crossing_work_boundary_conflicts() {
        let work = event("Work", (9, 0), (17, 0));
        let lunch = event("Lunch", (16, 30), (17, 30));
        assert!(ConflictChecker::has_conflict(&lunch, &[work]));
    }

    #[test]
    fn test_carve_out_is_one_directional() {
        let lunch = event("Lunch", (12, 0), (14, 0));
        let work = event("Work call", (12, 30), (13, 0));
        assert!(ConflictChecker::has_conflict(&work, &[lunch]));
    }

    #[test]
    fn test_long_break_inside_work_conflicts() {
        let work = event("Office", (9, 0), (17, 0));
        let long_break = event("Break", (10, 0), (12, 30));
        assert!(ConflictChecker::has_conflict(&long_break, &[work]));
    }

    #[test]
    fn test_resolve_moves_to_first_free_hour() {
        let existing = vec![
            event("Early", (6, 0), (8, 0)),
            event("Gym", (9, 0), (10, 0)),
        ];
        let candidates = vec![
            event("Reading", (9, 0), (10, 0)),
            event("Walk", (20, 0), (20, 30)),
        ];

        let resolved = ConflictChecker::resolve(candidates, &existing);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].summary, "Reading");
        assert_eq!(resolved[0].start, at(8, 0));
        assert_eq!(resolved[0].end, at(9, 0));
        assert_eq!(resolved[1].start, at(20, 0));
    }

    #[test]
    fn test_resolve_drops_when_day_is_full() {
        let existing = vec![event("Marathon", (0, 0), (23, 59))];
        let resolved = ConflictChecker::resolve(vec![event("Nap", (13, 0), (14, 0))], &existing);
        assert!(resolved.is_empty());
    }
}
