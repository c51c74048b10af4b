use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::warn;

use crate::records::{LessonOccurrence, Weekday};

/// Upper bound on the upcoming-occurrence listing.
pub const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub time_range: String,
    /// One subject per weekday; an absent key means no class in that cell.
    pub per_weekday: BTreeMap<Weekday, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCollision {
    pub time_range: String,
    pub day_of_week: Weekday,
    pub kept: String,
    pub discarded: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleGrid {
    pub slots: Vec<ScheduleSlot>,
    pub collisions: Vec<SlotCollision>,
}

fn time_range_key(lesson: &LessonOccurrence) -> (String, String) {
    let start = lesson.start_time.format("%H:%M").to_string();
    let end = lesson.end_time.format("%H:%M").to_string();
    (format!("{}-{}", start, end), start)
}

/// Groups occurrences into time-slot rows with one cell per weekday. Rows are
/// ordered by the zero-padded start-time string, which sorts correctly
/// lexically for 24-hour times. A cell collision keeps the later occurrence
/// and reports the discarded one instead of losing it silently.
pub fn build_grid(lessons: &[LessonOccurrence]) -> ScheduleGrid {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<(String, ScheduleSlot)> = Vec::new();
    let mut collisions: Vec<SlotCollision> = Vec::new();

    for lesson in lessons {
        let (time_range, start) = time_range_key(lesson);
        let i = match index.get(&time_range) {
            Some(&i) => i,
            None => {
                index.insert(time_range.clone(), rows.len());
                rows.push((
                    start,
                    ScheduleSlot {
                        time_range: time_range.clone(),
                        per_weekday: BTreeMap::new(),
                    },
                ));
                rows.len() - 1
            }
        };

        if let Some(previous) = rows[i]
            .1
            .per_weekday
            .insert(lesson.day_of_week, lesson.subject_name.clone())
        {
            if previous != lesson.subject_name {
                warn!(
                    slot = %time_range,
                    weekday = lesson.day_of_week.key(),
                    kept = %lesson.subject_name,
                    discarded = %previous,
                    "schedule slot collision; keeping the later occurrence"
                );
                collisions.push(SlotCollision {
                    time_range: time_range.clone(),
                    day_of_week: lesson.day_of_week,
                    kept: lesson.subject_name.clone(),
                    discarded: previous,
                });
            }
        }
    }

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    ScheduleGrid {
        slots: rows.into_iter().map(|(_, slot)| slot).collect(),
        collisions,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySlot {
    pub time_range: String,
    /// `None` is the explicit "no class today" display case, distinct from an
    /// entirely empty grid.
    pub subject: Option<String>,
}

/// Compact projection of the grid: for each slot, today's subject or nothing.
pub fn today_view(grid: &ScheduleGrid, today: Weekday) -> Vec<TodaySlot> {
    grid.slots
        .iter()
        .map(|slot| TodaySlot {
            time_range: slot.time_range.clone(),
            subject: slot.per_weekday.get(&today).cloned(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingOccurrence {
    pub subject_name: String,
    pub occurrence_date: NaiveDate,
    pub day_of_week: Weekday,
    pub time_range: String,
    pub class_id: Option<i64>,
    pub starts_at: NaiveDateTime,
}

/// Next calendar occurrence of each weekly-recurring lesson, filtered to the
/// future, sorted ascending, truncated to [`UPCOMING_LIMIT`].
///
/// `(target - today + 7) % 7` alone maps a same-weekday lesson to today even
/// when its start time has already passed; that case is pushed out a full
/// week explicitly.
pub fn upcoming_occurrences(
    lessons: &[LessonOccurrence],
    now: NaiveDateTime,
) -> Vec<UpcomingOccurrence> {
    let today_code = Weekday::from_chrono(now.date().weekday()).code();

    let mut out: Vec<UpcomingOccurrence> = Vec::new();
    for lesson in lessons {
        let days_until = (lesson.day_of_week.code() - today_code + 7) % 7;
        let mut date = now.date() + Duration::days(days_until);
        let mut starts_at = date.and_time(lesson.start_time);
        if days_until == 0 && starts_at < now {
            date += Duration::days(7);
            starts_at = date.and_time(lesson.start_time);
        }
        if starts_at < now {
            continue;
        }
        let (time_range, _) = time_range_key(lesson);
        out.push(UpcomingOccurrence {
            subject_name: lesson.subject_name.clone(),
            occurrence_date: date,
            day_of_week: lesson.day_of_week,
            time_range,
            class_id: lesson.class_id,
            starts_at,
        });
    }

    out.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
    out.truncate(UPCOMING_LIMIT);
    out
}
