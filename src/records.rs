use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Seven-value weekday enumeration. Producers disagree (five-day backend enum
/// strings vs. seven-day lowercase lists), so everything is normalized to this
/// one enum at ingestion. Ordering is Monday-first for grid rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "mon")]
    Monday,
    #[serde(rename = "tue")]
    Tuesday,
    #[serde(rename = "wed")]
    Wednesday,
    #[serde(rename = "thu")]
    Thursday,
    #[serde(rename = "fri")]
    Friday,
    #[serde(rename = "sat")]
    Saturday,
    #[serde(rename = "sun")]
    Sunday,
}

impl Weekday {
    /// Numeric code in the 0(Sun)..6(Sat) convention used by the upcoming
    /// occurrence calculation.
    pub fn code(self) -> i64 {
        match self {
            Weekday::Sunday => 0,
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Weekday::Monday => "mon",
            Weekday::Tuesday => "tue",
            Weekday::Wednesday => "wed",
            Weekday::Thursday => "thu",
            Weekday::Friday => "fri",
            Weekday::Saturday => "sat",
            Weekday::Sunday => "sun",
        }
    }

    /// Accepts the backend enum spellings (`SEGUNDA_FEIRA`..`DOMINGO`), the
    /// lowercase names used in schedule entries (`segunda`..`domingo`, with or
    /// without accents), and the short keys this daemon serializes.
    pub fn parse(raw: &str) -> Option<Weekday> {
        let t = raw.trim().to_lowercase();
        match t.as_str() {
            "segunda_feira" | "segunda" | "mon" => Some(Weekday::Monday),
            "terca_feira" | "terça_feira" | "terca" | "terça" | "tue" => Some(Weekday::Tuesday),
            "quarta_feira" | "quarta" | "wed" => Some(Weekday::Wednesday),
            "quinta_feira" | "quinta" | "thu" => Some(Weekday::Thursday),
            "sexta_feira" | "sexta" | "fri" => Some(Weekday::Friday),
            "sabado" | "sábado" | "sat" => Some(Weekday::Saturday),
            "domingo" | "sun" => Some(Weekday::Sunday),
            _ => None,
        }
    }

    pub fn from_chrono(w: chrono::Weekday) -> Weekday {
        match w {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub subject_name: String,
    pub present: bool,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub subject_name: String,
    /// `None` means the score field was present but not numeric; such records
    /// are listed with status "Indefinido" and excluded from averages.
    pub score: Option<f64>,
    pub evaluation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOccurrence {
    pub subject_name: String,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_id: Option<i64>,
}

/// Canonical per-user record bundle as stored in the session store. Derived
/// views are always recomputed from this value, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub snapshot_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub loaded_at: String,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub grades: Vec<GradeRecord>,
    #[serde(default)]
    pub lessons: Vec<LessonOccurrence>,
}

#[derive(Debug)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

// Raw endpoint shapes. One discriminated union per source endpoint, each with
// its own normalization into the canonical type above.

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSubjectRef {
    Named { name: String },
    Plain(String),
}

impl RawSubjectRef {
    fn into_name(self) -> String {
        match self {
            RawSubjectRef::Named { name } => name,
            RawSubjectRef::Plain(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttendance {
    subject_name: Option<String>,
    subject: Option<RawSubjectRef>,
    present: Option<bool>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
    subject_name: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGrade {
    /// Student records endpoint: score sits beside a nested evaluation.
    #[serde(rename_all = "camelCase")]
    Nested {
        evaluation: RawEvaluation,
        score: Option<serde_json::Value>,
    },
    /// Flat shape used by per-subject grade listings.
    #[serde(rename_all = "camelCase")]
    Flat {
        subject_name: Option<String>,
        subject: Option<RawSubjectRef>,
        score: Option<serde_json::Value>,
        date: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLesson {
    /// Lesson endpoint: one weekly recurrence with a backend weekday string.
    #[serde(rename_all = "camelCase")]
    Recurring {
        day_of_week: String,
        start_time: String,
        end_time: String,
        class_id: Option<i64>,
        subject_name: Option<String>,
        subject: Option<RawSubjectRef>,
    },
    /// Class schedule endpoint: one entry fanning out over a weekday list.
    #[serde(rename_all = "camelCase")]
    WeekdayList {
        week_days: Vec<String>,
        start_time: String,
        end_time: String,
        class_id: Option<i64>,
        subject: RawSubjectRef,
    },
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(t).ok().map(|dt| dt.date_naive())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .ok()
}

fn numeric_score(v: &serde_json::Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str().and_then(|s| s.trim().parse::<f64>().ok())
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Endpoints answer a bare array, a Spring-style page (`{"content": [...]}`),
/// or an identity document embedding the list under its DTO field name. An
/// absent document (null) is the valid "no data" case.
fn unwrap_list(doc: &serde_json::Value, fields: &[&str]) -> Vec<serde_json::Value> {
    match doc {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items.clone(),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::Array(items)) = map.get("content") {
                return items.clone();
            }
            for field in fields {
                if let Some(serde_json::Value::Array(items)) = map.get(*field) {
                    return items.clone();
                }
            }
            warn!(fields = ?fields, "record document has no recognizable list; treating as empty");
            Vec::new()
        }
        _ => {
            warn!("record document is not a list or object; treating as empty");
            Vec::new()
        }
    }
}

fn normalize_attendance(raw: RawAttendance) -> Option<AttendanceRecord> {
    let subject_name = non_empty(raw.subject_name)
        .or_else(|| non_empty(raw.subject.map(RawSubjectRef::into_name)))?;
    let date = raw.date.as_deref().and_then(parse_date)?;
    Some(AttendanceRecord {
        subject_name,
        present: raw.present.unwrap_or(false),
        date,
    })
}

fn normalize_grade(raw: RawGrade) -> Option<GradeRecord> {
    let (subject_name, score_field, date) = match raw {
        RawGrade::Nested { evaluation, score } => {
            (non_empty(evaluation.subject_name), score, evaluation.date)
        }
        RawGrade::Flat {
            subject_name,
            subject,
            score,
            date,
        } => (
            non_empty(subject_name).or_else(|| non_empty(subject.map(RawSubjectRef::into_name))),
            score,
            date,
        ),
    };
    let subject_name = subject_name?;
    // Absent score field drops the record; a present but non-numeric score is
    // kept and later classified "Indefinido".
    let score_field = score_field.filter(|v| !v.is_null())?;
    Some(GradeRecord {
        subject_name,
        score: numeric_score(&score_field),
        evaluation_date: date.as_deref().and_then(parse_date),
    })
}

fn normalize_lesson(raw: RawLesson) -> Vec<LessonOccurrence> {
    let (subject_name, day_strings, start, end, class_id) = match raw {
        RawLesson::Recurring {
            day_of_week,
            start_time,
            end_time,
            class_id,
            subject_name,
            subject,
        } => (
            non_empty(subject_name).or_else(|| non_empty(subject.map(RawSubjectRef::into_name))),
            vec![day_of_week],
            start_time,
            end_time,
            class_id,
        ),
        RawLesson::WeekdayList {
            week_days,
            start_time,
            end_time,
            class_id,
            subject,
        } => (
            non_empty(Some(subject.into_name())),
            week_days,
            start_time,
            end_time,
            class_id,
        ),
    };

    let Some(subject_name) = subject_name else {
        return Vec::new();
    };
    let (Some(start_time), Some(end_time)) = (parse_time(&start), parse_time(&end)) else {
        warn!(subject = %subject_name, start = %start, end = %end, "lesson has unparsable times; dropping");
        return Vec::new();
    };
    if start_time >= end_time {
        warn!(subject = %subject_name, %start_time, %end_time, "lesson start is not before end; dropping");
        return Vec::new();
    }

    let mut out = Vec::new();
    for day in day_strings {
        match Weekday::parse(&day) {
            Some(day_of_week) => out.push(LessonOccurrence {
                subject_name: subject_name.clone(),
                day_of_week,
                start_time,
                end_time,
                class_id,
            }),
            None => warn!(subject = %subject_name, weekday = %day, "unrecognized weekday; skipping"),
        }
    }
    out
}

pub fn ingest_attendance(doc: &serde_json::Value) -> Ingested<AttendanceRecord> {
    let mut records = Vec::new();
    let mut dropped = 0usize;
    for item in unwrap_list(doc, &["attendances", "attendance"]) {
        match serde_json::from_value::<RawAttendance>(item) {
            Ok(raw) => match normalize_attendance(raw) {
                Some(rec) => records.push(rec),
                None => dropped += 1,
            },
            Err(e) => {
                warn!(error = %e, "malformed attendance record; dropping");
                dropped += 1;
            }
        }
    }
    Ingested { records, dropped }
}

pub fn ingest_grades(doc: &serde_json::Value) -> Ingested<GradeRecord> {
    let mut records = Vec::new();
    let mut dropped = 0usize;
    for item in unwrap_list(doc, &["grades"]) {
        match serde_json::from_value::<RawGrade>(item) {
            Ok(raw) => match normalize_grade(raw) {
                Some(rec) => records.push(rec),
                None => dropped += 1,
            },
            Err(e) => {
                warn!(error = %e, "malformed grade record; dropping");
                dropped += 1;
            }
        }
    }
    Ingested { records, dropped }
}

pub fn ingest_lessons(doc: &serde_json::Value) -> Ingested<LessonOccurrence> {
    let mut records = Vec::new();
    let mut dropped = 0usize;
    for item in unwrap_list(doc, &["lessons", "classes"]) {
        match serde_json::from_value::<RawLesson>(item) {
            Ok(raw) => {
                let occurrences = normalize_lesson(raw);
                if occurrences.is_empty() {
                    dropped += 1;
                } else {
                    records.extend(occurrences);
                }
            }
            Err(e) => {
                warn!(error = %e, "malformed lesson record; dropping");
                dropped += 1;
            }
        }
    }
    Ingested { records, dropped }
}
