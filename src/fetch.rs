use std::path::{Path, PathBuf};

use anyhow::Context;

/// Endpoints of the record-retrieval service. The first three are per
/// identity; the roster endpoints back the overview counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Attendance,
    Grades,
    Lessons,
    Students,
    Teachers,
    Classes,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Attendance => "attendance",
            Endpoint::Grades => "grades",
            Endpoint::Lessons => "lessons",
            Endpoint::Students => "students",
            Endpoint::Teachers => "teachers",
            Endpoint::Classes => "classes",
        }
    }

    fn per_identity(self) -> bool {
        matches!(
            self,
            Endpoint::Attendance | Endpoint::Grades | Endpoint::Lessons
        )
    }
}

/// Interface to the record-retrieval service. Implementations must return
/// `Value::Null` for an absent document (the valid "no data" case) and an
/// error only for genuine retrieval failures.
pub trait RecordSource: Sync {
    fn fetch(&self, endpoint: Endpoint, user: Option<&str>) -> anyhow::Result<serde_json::Value>;
}

/// Directory-backed source: each endpoint is a JSON document on disk,
/// `<root>/<endpoint>/<user>.json` for per-identity endpoints and
/// `<root>/<endpoint>.json` for rosters.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }

    fn document_path(&self, endpoint: Endpoint, user: Option<&str>) -> anyhow::Result<PathBuf> {
        if endpoint.per_identity() {
            let user = user.context("per-identity endpoint requires a user")?;
            Ok(self.root.join(endpoint.as_str()).join(format!("{}.json", user)))
        } else {
            Ok(self.root.join(format!("{}.json", endpoint.as_str())))
        }
    }
}

impl RecordSource for DirSource {
    fn fetch(&self, endpoint: Endpoint, user: Option<&str>) -> anyhow::Result<serde_json::Value> {
        let path = self.document_path(endpoint, user)?;
        if !path.exists() {
            return Ok(serde_json::Value::Null);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read {} document at {}", endpoint.as_str(), path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse {} document at {}", endpoint.as_str(), path.display()))
    }
}

/// Raw per-identity documents, fetched before ingestion.
#[derive(Debug)]
pub struct RawRecordDocs {
    pub attendance: serde_json::Value,
    pub grades: serde_json::Value,
    pub lessons: serde_json::Value,
}

fn joined(
    result: std::thread::Result<anyhow::Result<serde_json::Value>>,
    endpoint: Endpoint,
) -> anyhow::Result<serde_json::Value> {
    match result {
        Ok(r) => r.with_context(|| format!("{} retrieval failed", endpoint.as_str())),
        Err(_) => Err(anyhow::anyhow!(
            "{} retrieval worker panicked",
            endpoint.as_str()
        )),
    }
}

/// Fans the three per-identity fetches out as independent requests and joins
/// them. If any one fails the whole fetch fails; no partial bundle is
/// returned.
pub fn fetch_identity_docs(
    source: &dyn RecordSource,
    user: &str,
) -> anyhow::Result<RawRecordDocs> {
    let (attendance, grades, lessons) = std::thread::scope(|s| {
        let attendance = s.spawn(|| source.fetch(Endpoint::Attendance, Some(user)));
        let grades = s.spawn(|| source.fetch(Endpoint::Grades, Some(user)));
        let lessons = s.spawn(|| source.fetch(Endpoint::Lessons, Some(user)));
        (attendance.join(), grades.join(), lessons.join())
    });

    Ok(RawRecordDocs {
        attendance: joined(attendance, Endpoint::Attendance)?,
        grades: joined(grades, Endpoint::Grades)?,
        lessons: joined(lessons, Endpoint::Lessons)?,
    })
}

/// Roster documents for the overview counts, fetched with the same
/// all-or-nothing join.
#[derive(Debug)]
pub struct RosterDocs {
    pub students: serde_json::Value,
    pub teachers: serde_json::Value,
    pub classes: serde_json::Value,
}

pub fn fetch_roster_docs(source: &dyn RecordSource) -> anyhow::Result<RosterDocs> {
    let (students, teachers, classes) = std::thread::scope(|s| {
        let students = s.spawn(|| source.fetch(Endpoint::Students, None));
        let teachers = s.spawn(|| source.fetch(Endpoint::Teachers, None));
        let classes = s.spawn(|| source.fetch(Endpoint::Classes, None));
        (students.join(), teachers.join(), classes.join())
    });

    Ok(RosterDocs {
        students: joined(students, Endpoint::Students)?,
        teachers: joined(teachers, Endpoint::Teachers)?,
        classes: joined(classes, Endpoint::Classes)?,
    })
}
