use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{required_ref, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub struct Timetable;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimetableDraft {
    #[serde(default)]
    pub course_id: Option<i64>,
    pub day: String,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRecord {
    pub id: i64,
    pub course_id: Option<i64>,
    pub course: Option<String>,
    pub day: String,
    pub time_slot: String,
}

impl Entity for Timetable {
    const KIND: EntityKind = EntityKind::Timetable;
    const SELECT: &'static str = "SELECT t.id, t.course_id, c.name, t.day, t.time_slot
         FROM timetable t
         LEFT JOIN courses c ON c.id = t.course_id";
    const ID_COLUMN: &'static str = "t.id";
    const FILTERS: &'static [(&'static str, &'static str)] = &[("courseId", "t.course_id")];

    type Draft = TimetableDraft;
    type Record = TimetableRecord;

    fn normalize(draft: TimetableDraft) -> StoreResult<TimetableDraft> {
        let day = draft.day.trim();
        let day = WEEKDAYS
            .iter()
            .find(|d| d.eq_ignore_ascii_case(day))
            .ok_or_else(|| StoreError::invalid("day", "expected a weekday name"))?;
        Ok(TimetableDraft {
            course_id: draft.course_id,
            day: day.to_string(),
            time_slot: required_text("timeSlot", draft.time_slot)?,
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &TimetableDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        required_ref(
            conn,
            Self::KIND,
            "courseId",
            EntityKind::Course,
            draft.course_id,
        )
    }

    fn insert(conn: &Connection, draft: &TimetableDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO timetable(course_id, day, time_slot) VALUES(?, ?, ?)",
            (draft.course_id, &draft.day, &draft.time_slot),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &TimetableDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE timetable SET course_id = ?, day = ?, time_slot = ? WHERE id = ?",
            (draft.course_id, &draft.day, &draft.time_slot, id),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<TimetableDraft>> {
        Ok(conn
            .query_row(
                "SELECT course_id, day, time_slot FROM timetable WHERE id = ?",
                [id],
                |r| {
                    Ok(TimetableDraft {
                        course_id: r.get(0)?,
                        day: r.get(1)?,
                        time_slot: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<TimetableRecord> {
        Ok(TimetableRecord {
            id: row.get(0)?,
            course_id: row.get(1)?,
            course: row.get(2)?,
            day: row.get(3)?,
            time_slot: row.get(4)?,
        })
    }

    fn search_text(record: &TimetableRecord) -> Vec<&str> {
        let mut out = vec![record.day.as_str(), record.time_slot.as_str()];
        out.extend(record.course.as_deref());
        out
    }
}
