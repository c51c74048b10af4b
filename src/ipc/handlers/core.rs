use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::ipc::error::{err, get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use crate::store;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "storePath": state.store_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            "sessionUser": state.session.as_ref().map(|s| s.user.clone()),
            "role": state.session.as_ref().map(|s| s.role.clone()),
        }),
    )
}

fn open_session(state: &mut AppState, params: &serde_json::Value) -> Result<Session, HandlerErr> {
    let path = PathBuf::from(get_required_str(params, "path")?);
    let user = get_required_str(params, "user")?;
    let role = get_required_str(params, "role")?.to_lowercase();
    if role != "student" && role != "teacher" {
        return Err(HandlerErr::bad_params("role must be student or teacher"));
    }

    let store = store::open_store(&path)
        .map_err(|e| HandlerErr::new("store_open_failed", format!("{e:?}")))?;
    store
        .set_json("session.user", &json!(user))
        .and_then(|_| store.set_json("session.role", &json!(role)))
        .map_err(|e| HandlerErr::new("store_write_failed", e.to_string()))?;

    state.store_path = Some(path);
    state.store = Some(store);
    let session = Session { user, role };
    state.session = Some(session.clone());
    info!(user = %session.user, role = %session.role, "session opened");
    Ok(session)
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    match open_session(state, &req.params) {
        Ok(session) => ok(
            &req.id,
            json!({ "sessionUser": session.user, "role": session.role }),
        ),
        Err(error) => error.response(&req.id),
    }
}

/// Logout / role switch: every stored snapshot and the session keys are
/// invalidated, not merely hidden from the running process.
fn handle_session_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut cleared = false;
    if let Some(store) = state.store.as_ref() {
        let wiped = store
            .delete_prefix("snapshot.")
            .and_then(|_| store.delete("session.user"))
            .and_then(|_| store.delete("session.role"));
        if let Err(e) = wiped {
            return err(&req.id, "store_write_failed", e.to_string(), None);
        }
        cleared = true;
    }
    if let Some(session) = state.session.take() {
        info!(user = %session.user, "session closed");
        cleared = true;
    }
    ok(&req.id, json!({ "cleared": cleared }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        "session.close" => Some(handle_session_close(state, req)),
        _ => None,
    }
}
