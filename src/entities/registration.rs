use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{iso_date, required_ref, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Registration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistrationDraft {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub teacher_id: Option<i64>,
    #[serde(default)]
    pub course_id: Option<i64>,
    /// Defaults to today's local date.
    #[serde(default)]
    pub registration_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub id: i64,
    pub student_id: Option<i64>,
    pub student: Option<String>,
    pub teacher_id: Option<i64>,
    pub teacher: Option<String>,
    pub course_id: Option<i64>,
    pub course: Option<String>,
    pub department: Option<String>,
    pub fee: Option<f64>,
    pub registration_date: Option<String>,
}

impl Entity for Registration {
    const KIND: EntityKind = EntityKind::Registration;
    const SELECT: &'static str = "SELECT
           r.id,
           r.student_id, s.name,
           r.teacher_id, t.name,
           r.course_id, c.name,
           d.name,
           c.fee,
           r.registration_date
         FROM registrations r
         LEFT JOIN students s ON s.id = r.student_id
         LEFT JOIN teachers t ON t.id = r.teacher_id
         LEFT JOIN courses c ON c.id = r.course_id
         LEFT JOIN departments d ON d.id = c.department_id";
    const ID_COLUMN: &'static str = "r.id";
    const FILTERS: &'static [(&'static str, &'static str)] = &[
        ("studentId", "r.student_id"),
        ("teacherId", "r.teacher_id"),
        ("courseId", "r.course_id"),
    ];

    type Draft = RegistrationDraft;
    type Record = RegistrationRecord;

    fn normalize(draft: RegistrationDraft) -> StoreResult<RegistrationDraft> {
        let date = match draft.registration_date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => iso_date("registrationDate", d)?,
            _ => chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
        };
        Ok(RegistrationDraft {
            registration_date: Some(date),
            ..draft
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &RegistrationDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        required_ref(
            conn,
            Self::KIND,
            "studentId",
            EntityKind::Student,
            draft.student_id,
        )?;
        required_ref(
            conn,
            Self::KIND,
            "teacherId",
            EntityKind::Teacher,
            draft.teacher_id,
        )?;
        required_ref(
            conn,
            Self::KIND,
            "courseId",
            EntityKind::Course,
            draft.course_id,
        )
    }

    fn insert(conn: &Connection, draft: &RegistrationDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO registrations(student_id, teacher_id, course_id, registration_date)
             VALUES(?, ?, ?, ?)",
            (
                draft.student_id,
                draft.teacher_id,
                draft.course_id,
                &draft.registration_date,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &RegistrationDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE registrations
             SET student_id = ?, teacher_id = ?, course_id = ?, registration_date = ?
             WHERE id = ?",
            (
                draft.student_id,
                draft.teacher_id,
                draft.course_id,
                &draft.registration_date,
                id,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<RegistrationDraft>> {
        Ok(conn
            .query_row(
                "SELECT student_id, teacher_id, course_id, registration_date
                 FROM registrations WHERE id = ?",
                [id],
                |r| {
                    Ok(RegistrationDraft {
                        student_id: r.get(0)?,
                        teacher_id: r.get(1)?,
                        course_id: r.get(2)?,
                        registration_date: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<RegistrationRecord> {
        Ok(RegistrationRecord {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student: row.get(2)?,
            teacher_id: row.get(3)?,
            teacher: row.get(4)?,
            course_id: row.get(5)?,
            course: row.get(6)?,
            department: row.get(7)?,
            fee: row.get(8)?,
            registration_date: row.get(9)?,
        })
    }

    fn search_text(record: &RegistrationRecord) -> Vec<&str> {
        [
            &record.student,
            &record.teacher,
            &record.course,
            &record.department,
        ]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .collect()
    }
}
