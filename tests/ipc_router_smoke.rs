use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_escolard");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn escolard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn write_doc(root: &Path, rel: &str, doc: &serde_json::Value) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, serde_json::to_string_pretty(doc).expect("encode")).expect("write doc");
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let store_dir = temp_dir("escolard-router-smoke-store");
    let source_dir = temp_dir("escolard-router-smoke-source");
    write_doc(
        &source_dir,
        "attendance/111.json",
        &json!([{ "subjectName": "Matemática", "present": true, "date": "2024-03-11" }]),
    );
    write_doc(&source_dir, "students.json", &json!([{}, {}]));

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({
            "path": store_dir.to_string_lossy(),
            "user": "111",
            "role": "student"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "snapshot.load",
        json!({ "sourceDir": source_dir.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "overview.stats",
        json!({ "sourceDir": source_dir.to_string_lossy() }),
    );
    let _ = request(&mut stdin, &mut reader, "5", "reports.attendance", json!({}));
    let _ = request(&mut stdin, &mut reader, "6", "reports.grades", json!({}));
    let _ = request(&mut stdin, &mut reader, "7", "schedule.grid", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "schedule.today",
        json!({ "today": "mon" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "lessons.upcoming",
        json!({ "now": "2024-03-13T10:00:00" }),
    );
    let _ = request(&mut stdin, &mut reader, "10", "session.close", json!({}));

    let unknown = request(&mut stdin, &mut reader, "11", "nope.nothing", json!({}));
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    let _ = child.kill();
}

#[test]
fn health_reports_version_and_open_session() {
    let store_dir = temp_dir("escolard-health-store");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(before.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert!(before["result"]["sessionUser"].is_null());

    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({
            "path": store_dir.to_string_lossy(),
            "user": "42",
            "role": "teacher"
        }),
    );
    let after = request(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(
        after["result"]["sessionUser"].as_str(),
        Some("42")
    );
    assert_eq!(after["result"]["role"].as_str(), Some("teacher"));

    let _ = child.kill();
}

#[test]
fn session_open_rejects_unknown_role() {
    let store_dir = temp_dir("escolard-role-store");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.open",
        json!({
            "path": store_dir.to_string_lossy(),
            "user": "42",
            "role": "admin"
        }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp["error"]["code"].as_str(),
        Some("bad_params")
    );

    let _ = child.kill();
}
