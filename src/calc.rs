use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::records::{AttendanceRecord, GradeRecord};

/// 1-decimal half-up rounding used for display values:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Good,
    Medium,
    Bad,
}

/// Fixed-threshold classification, inclusive on the upper side of each band:
/// >= 85 good, >= 75 medium, below that bad.
pub fn attendance_status(percentage: i64) -> AttendanceStatus {
    if percentage >= 85 {
        AttendanceStatus::Good
    } else if percentage >= 75 {
        AttendanceStatus::Medium
    } else {
        AttendanceStatus::Bad
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject_name: String,
    pub attended_count: u64,
    pub total_count: u64,
    pub percentage: i64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOverview {
    pub subjects: Vec<SubjectAttendance>,
    pub overall_percentage: i64,
    pub overall_status: AttendanceStatus,
}

fn percent(attended: u64, total: u64) -> i64 {
    if total == 0 {
        return 0;
    }
    (100.0 * attended as f64 / total as f64).round() as i64
}

/// Groups attendance records by subject in order of first appearance. The
/// overall percentage is computed over summed counts, not by averaging the
/// per-subject percentages.
pub fn attendance_overview(records: &[AttendanceRecord]) -> AttendanceOverview {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (u64, u64)> = HashMap::new();

    for rec in records {
        let entry = groups.entry(rec.subject_name.clone()).or_insert_with(|| {
            order.push(rec.subject_name.clone());
            (0, 0)
        });
        entry.1 += 1;
        if rec.present {
            entry.0 += 1;
        }
    }

    let mut subjects = Vec::with_capacity(order.len());
    let mut sum_attended = 0u64;
    let mut sum_total = 0u64;
    for subject_name in order {
        let (attended, total) = groups[&subject_name];
        sum_attended += attended;
        sum_total += total;
        let percentage = percent(attended, total);
        subjects.push(SubjectAttendance {
            subject_name,
            attended_count: attended,
            total_count: total,
            percentage,
            status: attendance_status(percentage),
        });
    }

    let overall_percentage = percent(sum_attended, sum_total);
    AttendanceOverview {
        subjects,
        overall_percentage,
        overall_status: attendance_status(overall_percentage),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeStatus {
    Aprovado,
    #[serde(rename = "Recuperação")]
    Recuperacao,
    Reprovado,
    Indefinido,
}

/// >= 7 Aprovado, >= 5 Recuperação, below that Reprovado. Non-numeric scores
/// never reach this function; they classify as Indefinido at the call site.
pub fn grade_status(score: f64) -> GradeStatus {
    if score >= 7.0 {
        GradeStatus::Aprovado
    } else if score >= 5.0 {
        GradeStatus::Recuperacao
    } else {
        GradeStatus::Reprovado
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    pub subject_name: String,
    pub score: Option<f64>,
    pub score_display: Option<f64>,
    pub status: GradeStatus,
    pub evaluation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGradeSummary {
    pub subject_name: String,
    pub average_score: f64,
    pub average_display: f64,
    pub status: GradeStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub rows: Vec<GradeRow>,
    pub subjects: Vec<SubjectGradeSummary>,
    pub average: f64,
    pub average_display: f64,
    pub overall_status: GradeStatus,
}

/// Every record keeps its own score and status; only the grand average over
/// numeric scores is classified for the overall verdict. Per-subject averages
/// are reported alongside, grouped in order of first appearance.
pub fn grade_report(records: &[GradeRecord]) -> GradeReport {
    let mut rows = Vec::with_capacity(records.len());
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (f64, u64)> = HashMap::new();
    let mut sum = 0.0f64;
    let mut numeric_count = 0u64;

    for rec in records {
        let status = match rec.score {
            Some(score) => grade_status(score),
            None => GradeStatus::Indefinido,
        };
        rows.push(GradeRow {
            subject_name: rec.subject_name.clone(),
            score: rec.score,
            score_display: rec.score.map(round_off_1_decimal),
            status,
            evaluation_date: rec.evaluation_date,
        });

        let entry = groups.entry(rec.subject_name.clone()).or_insert_with(|| {
            order.push(rec.subject_name.clone());
            (0.0, 0)
        });
        if let Some(score) = rec.score {
            entry.0 += score;
            entry.1 += 1;
            sum += score;
            numeric_count += 1;
        }
    }

    let subjects = order
        .into_iter()
        .map(|subject_name| {
            let (subject_sum, count) = groups[&subject_name];
            let average_score = if count > 0 {
                subject_sum / count as f64
            } else {
                0.0
            };
            SubjectGradeSummary {
                subject_name,
                average_score,
                average_display: round_off_1_decimal(average_score),
                status: grade_status(average_score),
            }
        })
        .collect();

    let average = if numeric_count > 0 {
        sum / numeric_count as f64
    } else {
        0.0
    };
    GradeReport {
        rows,
        subjects,
        average,
        average_display: round_off_1_decimal(average),
        overall_status: grade_status(average),
    }
}
