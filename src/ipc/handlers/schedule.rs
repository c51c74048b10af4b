use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use serde_json::json;

use crate::ipc::error::{get_optional_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::Weekday;
use crate::schedule;

use super::reports::current_snapshot;

fn handle_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_snapshot(state) {
        Ok(snapshot) => {
            let grid = schedule::build_grid(&snapshot.lessons);
            let has_lessons = !grid.slots.is_empty();
            match serde_json::to_value(&grid) {
                Ok(mut result) => {
                    result["hasLessons"] = json!(has_lessons);
                    ok(&req.id, result)
                }
                Err(e) => HandlerErr::new("bad_result", e.to_string()).response(&req.id),
            }
        }
        Err(error) => error.response(&req.id),
    }
}

fn parse_today(params: &serde_json::Value) -> Result<Weekday, HandlerErr> {
    match get_optional_str(params, "today") {
        Some(raw) => Weekday::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unrecognized weekday: {}", raw))),
        None => Ok(Weekday::from_chrono(Local::now().date_naive().weekday())),
    }
}

fn handle_today(state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = match parse_today(&req.params) {
        Ok(day) => day,
        Err(error) => return error.response(&req.id),
    };
    match current_snapshot(state) {
        Ok(snapshot) => {
            let grid = schedule::build_grid(&snapshot.lessons);
            let entries = schedule::today_view(&grid, today);
            match serde_json::to_value(&entries) {
                Ok(entries) => ok(
                    &req.id,
                    json!({
                        "today": today,
                        "entries": entries,
                        "hasLessons": !grid.slots.is_empty(),
                    }),
                ),
                Err(e) => HandlerErr::new("bad_result", e.to_string()).response(&req.id),
            }
        }
        Err(error) => error.response(&req.id),
    }
}

/// Reference instant for the upcoming listing. Accepts RFC3339 or a naive
/// `YYYY-MM-DDTHH:MM:SS` so callers (and tests) can pin the clock; defaults
/// to local wall-clock time.
fn parse_now(params: &serde_json::Value) -> Result<NaiveDateTime, HandlerErr> {
    match get_optional_str(params, "now") {
        Some(raw) => {
            let t = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
                return Ok(dt.naive_local());
            }
            NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S")
                .map_err(|_| HandlerErr::bad_params(format!("unparsable instant: {}", raw)))
        }
        None => Ok(Local::now().naive_local()),
    }
}

fn handle_upcoming(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = match parse_now(&req.params) {
        Ok(now) => now,
        Err(error) => return error.response(&req.id),
    };
    match current_snapshot(state) {
        Ok(snapshot) => {
            let occurrences = schedule::upcoming_occurrences(&snapshot.lessons, now);
            match serde_json::to_value(&occurrences) {
                Ok(occurrences) => ok(&req.id, json!({ "occurrences": occurrences })),
                Err(e) => HandlerErr::new("bad_result", e.to_string()).response(&req.id),
            }
        }
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.grid" => Some(handle_grid(state, req)),
        "schedule.today" => Some(handle_today(state, req)),
        "lessons.upcoming" => Some(handle_upcoming(state, req)),
        _ => None,
    }
}
