use tracing::warn;

use crate::calc;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::Snapshot;

use super::snapshot::snapshot_key;

/// Decodes the stored snapshot for the open session. A missing session is a
/// hard error; an absent or undecodable snapshot reads as empty input so the
/// aggregators produce their valid "no data" shapes.
pub fn current_snapshot(state: &AppState) -> Result<Snapshot, HandlerErr> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;

    let value = store
        .get_json(&snapshot_key(&session.user))
        .map_err(|e| HandlerErr::new("store_read_failed", e.to_string()))?;
    let Some(value) = value else {
        return Ok(Snapshot::default());
    };
    match serde_json::from_value::<Snapshot>(value) {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => {
            warn!(user = %session.user, error = %e, "stored snapshot undecodable; treating as empty");
            Ok(Snapshot::default())
        }
    }
}

fn handle_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_snapshot(state) {
        Ok(snapshot) => {
            let overview = calc::attendance_overview(&snapshot.attendance);
            match serde_json::to_value(&overview) {
                Ok(result) => ok(&req.id, result),
                Err(e) => HandlerErr::new("bad_result", e.to_string()).response(&req.id),
            }
        }
        Err(error) => error.response(&req.id),
    }
}

fn handle_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_snapshot(state) {
        Ok(snapshot) => {
            let report = calc::grade_report(&snapshot.grades);
            match serde_json::to_value(&report) {
                Ok(result) => ok(&req.id, result),
                Err(e) => HandlerErr::new("bad_result", e.to_string()).response(&req.id),
            }
        }
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.attendance" => Some(handle_attendance(state, req)),
        "reports.grades" => Some(handle_grades(state, req)),
        _ => None,
    }
}
