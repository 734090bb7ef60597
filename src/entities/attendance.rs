use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{iso_date, required_ref, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Attendance;

fn default_present() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttendanceDraft {
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub student_id: Option<i64>,
    pub date: String,
    #[serde(default = "default_present")]
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub class_id: i64,
    pub class: Option<String>,
    pub student_id: i64,
    pub student: Option<String>,
    pub date: String,
    pub present: bool,
}

fn day_label(draft: &AttendanceDraft) -> String {
    format!(
        "class {} / student {} / {}",
        draft.class_id.unwrap_or_default(),
        draft.student_id.unwrap_or_default(),
        draft.date
    )
}

impl Entity for Attendance {
    const KIND: EntityKind = EntityKind::Attendance;
    const SELECT: &'static str =
        "SELECT a.id, a.class_id, k.name, a.student_id, s.name, a.date, a.present
         FROM attendance a
         LEFT JOIN classes k ON k.id = a.class_id
         LEFT JOIN students s ON s.id = a.student_id";
    const ID_COLUMN: &'static str = "a.id";
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("classId", "a.class_id"), ("studentId", "a.student_id")];

    type Draft = AttendanceDraft;
    type Record = AttendanceRecord;

    fn normalize(draft: AttendanceDraft) -> StoreResult<AttendanceDraft> {
        Ok(AttendanceDraft {
            date: iso_date("date", &draft.date)?,
            ..draft
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &AttendanceDraft,
        own_id: Option<i64>,
    ) -> StoreResult<()> {
        required_ref(
            conn,
            Self::KIND,
            "classId",
            EntityKind::Class,
            draft.class_id,
        )?;
        required_ref(
            conn,
            Self::KIND,
            "studentId",
            EntityKind::Student,
            draft.student_id,
        )?;
        let clash: Option<i64> = conn
            .query_row(
                "SELECT id FROM attendance
                 WHERE class_id = ? AND student_id = ? AND date = ? AND id IS NOT ?",
                (draft.class_id, draft.student_id, &draft.date, own_id),
                |r| r.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(StoreError::UniquenessViolation {
                entity: Self::KIND,
                field: "date",
                value: day_label(draft),
            });
        }
        Ok(())
    }

    fn insert(conn: &Connection, draft: &AttendanceDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO attendance(class_id, student_id, date, present) VALUES(?, ?, ?, ?)",
            (draft.class_id, draft.student_id, &draft.date, draft.present),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("date", &day_label(draft)))))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &AttendanceDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE attendance SET class_id = ?, student_id = ?, date = ?, present = ? WHERE id = ?",
            (
                draft.class_id,
                draft.student_id,
                &draft.date,
                draft.present,
                id,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("date", &day_label(draft)))))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<AttendanceDraft>> {
        Ok(conn
            .query_row(
                "SELECT class_id, student_id, date, present FROM attendance WHERE id = ?",
                [id],
                |r| {
                    Ok(AttendanceDraft {
                        class_id: r.get(0)?,
                        student_id: r.get(1)?,
                        date: r.get(2)?,
                        present: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
        Ok(AttendanceRecord {
            id: row.get(0)?,
            class_id: row.get(1)?,
            class: row.get(2)?,
            student_id: row.get(3)?,
            student: row.get(4)?,
            date: row.get(5)?,
            present: row.get(6)?,
        })
    }

    fn search_text(record: &AttendanceRecord) -> Vec<&str> {
        let mut out = vec![record.date.as_str()];
        out.extend(record.class.as_deref());
        out.extend(record.student.as_deref());
        out
    }
}
