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

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(resp.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        resp
    );
    resp["result"].clone()
}

fn write_doc(root: &Path, rel: &str, doc: &serde_json::Value) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, serde_json::to_string_pretty(doc).expect("encode")).expect("write doc");
}

fn load_grades(user: &str, grades: serde_json::Value) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let store_dir = temp_dir("escolard-grade-store");
    let source_dir = temp_dir("escolard-grade-source");
    write_doc(&source_dir, &format!("grades/{}.json", user), &grades);

    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "open",
        "session.open",
        json!({
            "path": store_dir.to_string_lossy(),
            "user": user,
            "role": "student"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "load",
        "snapshot.load",
        json!({ "sourceDir": source_dir.to_string_lossy() }),
    );
    (child, stdin, reader)
}

#[test]
fn grand_average_of_three_scores_is_recovery() {
    let grades = json!([
        { "score": 7.5, "evaluation": { "subjectName": "Matemática", "date": "2024-04-01" } },
        { "score": 4.0, "evaluation": { "subjectName": "Português", "date": "2024-04-02" } },
        { "score": 9.0, "evaluation": { "subjectName": "Ciências", "date": "2024-04-03" } }
    ]);
    let (mut child, mut stdin, mut reader) = load_grades("555", grades);

    let result = request_ok(&mut stdin, &mut reader, "r1", "reports.grades", json!({}));
    assert_eq!(result["averageDisplay"].as_f64(), Some(6.8));
    assert_eq!(result["overallStatus"].as_str(), Some("Recuperação"));

    let rows = result["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["subjectName"].as_str(), Some("Matemática"));
    assert_eq!(rows[0]["status"].as_str(), Some("Aprovado"));
    assert_eq!(rows[1]["status"].as_str(), Some("Reprovado"));
    assert_eq!(rows[2]["status"].as_str(), Some("Aprovado"));
    assert_eq!(rows[0]["evaluationDate"].as_str(), Some("2024-04-01"));

    let _ = child.kill();
}

#[test]
fn non_numeric_score_lists_as_indefinido_outside_the_average() {
    let grades = json!([
        { "subjectName": "Matemática", "score": 8.0 },
        { "subjectName": "Matemática", "score": "N/A" },
        { "subjectName": "Português", "score": "6.0" }
    ]);
    let (mut child, mut stdin, mut reader) = load_grades("555", grades);

    let result = request_ok(&mut stdin, &mut reader, "r1", "reports.grades", json!({}));
    let rows = result["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["status"].as_str(), Some("Indefinido"));
    assert!(rows[1]["score"].is_null());
    // (8 + 6) / 2, the N/A record is excluded.
    assert_eq!(result["averageDisplay"].as_f64(), Some(7.0));
    assert_eq!(result["overallStatus"].as_str(), Some("Aprovado"));

    let subjects = result["subjects"].as_array().expect("subjects");
    assert_eq!(subjects[0]["subjectName"].as_str(), Some("Matemática"));
    assert_eq!(subjects[0]["averageDisplay"].as_f64(), Some(8.0));
    assert_eq!(subjects[0]["status"].as_str(), Some("Aprovado"));

    let _ = child.kill();
}

#[test]
fn empty_grade_source_yields_zero_average_report() {
    let (mut child, mut stdin, mut reader) = load_grades("555", json!([]));

    let result = request_ok(&mut stdin, &mut reader, "r1", "reports.grades", json!({}));
    assert_eq!(result["rows"].as_array().map(|a| a.len()), Some(0));
    assert_eq!(result["subjects"].as_array().map(|a| a.len()), Some(0));
    assert_eq!(result["average"].as_f64(), Some(0.0));
    assert_eq!(result["averageDisplay"].as_f64(), Some(0.0));

    let _ = child.kill();
}

#[test]
fn malformed_rows_are_dropped_and_counted_at_load() {
    let store_dir = temp_dir("escolard-grade-store");
    let source_dir = temp_dir("escolard-grade-source");
    write_doc(
        &source_dir,
        "grades/555.json",
        &json!([
            { "subjectName": "Matemática", "score": 8.0 },
            { "evaluation": { "subjectName": "História" } },
            42
        ]),
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "open",
        "session.open",
        json!({
            "path": store_dir.to_string_lossy(),
            "user": "555",
            "role": "student"
        }),
    );
    let loaded = request_ok(
        &mut stdin,
        &mut reader,
        "load",
        "snapshot.load",
        json!({ "sourceDir": source_dir.to_string_lossy() }),
    );
    assert_eq!(loaded["counts"]["grades"].as_u64(), Some(1));
    assert_eq!(loaded["dropped"]["grades"].as_u64(), Some(2));

    let result = request_ok(&mut stdin, &mut reader, "r1", "reports.grades", json!({}));
    assert_eq!(result["rows"].as_array().map(|a| a.len()), Some(1));

    let _ = child.kill();
}
