use serde_json::json;
use tracing::{error, info};

use crate::fetch::{self, DirSource};
use crate::ipc::error::{get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use crate::records::{self, Snapshot};
use crate::store::Store;

pub fn snapshot_key(user: &str) -> String {
    format!("snapshot.{}", user)
}

fn require_session<'a>(state: &'a AppState) -> Result<(&'a Store, &'a Session), HandlerErr> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;
    Ok((store, session))
}

/// Fan-out fetch of the three per-identity endpoints, joined all-or-nothing,
/// then normalization and a single atomic store write. A failed join leaves
/// any previously stored snapshot untouched.
fn load_snapshot(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = require_session(state)?;
    let source_dir = get_required_str(params, "sourceDir")?;
    let source = DirSource::new(source_dir);

    let docs = fetch::fetch_identity_docs(&source, &session.user).map_err(|e| {
        error!(user = %session.user, error = %format!("{e:#}"), "snapshot fetch aborted");
        HandlerErr::new("snapshot_fetch_failed", "record retrieval failed")
    })?;

    let attendance = records::ingest_attendance(&docs.attendance);
    let grades = records::ingest_grades(&docs.grades);
    let lessons = records::ingest_lessons(&docs.lessons);

    let snapshot = Snapshot {
        snapshot_id: uuid::Uuid::new_v4().to_string(),
        user: session.user.clone(),
        role: session.role.clone(),
        loaded_at: chrono::Utc::now().to_rfc3339(),
        attendance: attendance.records,
        grades: grades.records,
        lessons: lessons.records,
    };

    let value = serde_json::to_value(&snapshot)
        .map_err(|e| HandlerErr::new("bad_snapshot", e.to_string()))?;
    store
        .set_json(&snapshot_key(&session.user), &value)
        .map_err(|e| HandlerErr::new("store_write_failed", e.to_string()))?;

    info!(
        user = %session.user,
        snapshot_id = %snapshot.snapshot_id,
        attendance = snapshot.attendance.len(),
        grades = snapshot.grades.len(),
        lessons = snapshot.lessons.len(),
        "snapshot loaded"
    );

    Ok(json!({
        "snapshotId": snapshot.snapshot_id,
        "counts": {
            "attendance": snapshot.attendance.len(),
            "grades": snapshot.grades.len(),
            "lessons": snapshot.lessons.len(),
        },
        "dropped": {
            "attendance": attendance.dropped,
            "grades": grades.dropped,
            "lessons": lessons.dropped,
        }
    }))
}

fn count_roster(doc: &serde_json::Value, field: &str) -> u64 {
    match doc {
        serde_json::Value::Array(items) => items.len() as u64,
        serde_json::Value::Object(map) => match map.get("content").or_else(|| map.get(field)) {
            Some(serde_json::Value::Array(items)) => items.len() as u64,
            _ => 0,
        },
        _ => 0,
    }
}

/// Dashboard overview: three roster fetches joined all-or-nothing; counts
/// come from the joined lists.
fn overview_stats(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let source_dir = get_required_str(params, "sourceDir")?;
    let source = DirSource::new(source_dir);

    let docs = fetch::fetch_roster_docs(&source).map_err(|e| {
        error!(error = %format!("{e:#}"), "overview fetch aborted");
        HandlerErr::new("stats_fetch_failed", "roster retrieval failed")
    })?;

    let total_students = count_roster(&docs.students, "students");
    let total_teachers = count_roster(&docs.teachers, "teachers");
    let total_classes = count_roster(&docs.classes, "classes");

    Ok(json!({
        "totalStudents": total_students,
        "totalTeachers": total_teachers,
        "totalClasses": total_classes,
        "hasData": total_students > 0 || total_teachers > 0 || total_classes > 0,
    }))
}

fn handle_snapshot_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    match load_snapshot(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_overview_stats(_state: &mut AppState, req: &Request) -> serde_json::Value {
    match overview_stats(&req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.load" => Some(handle_snapshot_load(state, req)),
        "overview.stats" => Some(handle_overview_stats(state, req)),
        _ => None,
    }
}
