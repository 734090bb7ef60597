use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{iso_date, optional_ref, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Exam;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExamDraft {
    #[serde(default)]
    pub course_id: Option<i64>,
    pub exam_name: String,
    pub exam_date: String,
    pub exam_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: i64,
    pub course_id: Option<i64>,
    pub course: Option<String>,
    pub exam_name: String,
    pub exam_date: String,
    pub exam_time: String,
}

impl Entity for Exam {
    const KIND: EntityKind = EntityKind::Exam;
    const SELECT: &'static str =
        "SELECT e.id, e.course_id, c.name, e.exam_name, e.exam_date, e.exam_time
         FROM exams e
         LEFT JOIN courses c ON c.id = e.course_id";
    const ID_COLUMN: &'static str = "e.id";
    const FILTERS: &'static [(&'static str, &'static str)] = &[("courseId", "e.course_id")];

    type Draft = ExamDraft;
    type Record = ExamRecord;

    fn normalize(draft: ExamDraft) -> StoreResult<ExamDraft> {
        Ok(ExamDraft {
            course_id: draft.course_id,
            exam_name: required_text("examName", draft.exam_name)?,
            exam_date: iso_date("examDate", &draft.exam_date)?,
            exam_time: required_text("examTime", draft.exam_time)?,
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &ExamDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        optional_ref(
            conn,
            Self::KIND,
            "courseId",
            EntityKind::Course,
            draft.course_id,
        )
    }

    fn insert(conn: &Connection, draft: &ExamDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO exams(course_id, exam_name, exam_date, exam_time) VALUES(?, ?, ?, ?)",
            (
                draft.course_id,
                &draft.exam_name,
                &draft.exam_date,
                &draft.exam_time,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &ExamDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE exams SET course_id = ?, exam_name = ?, exam_date = ?, exam_time = ? WHERE id = ?",
            (
                draft.course_id,
                &draft.exam_name,
                &draft.exam_date,
                &draft.exam_time,
                id,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<ExamDraft>> {
        Ok(conn
            .query_row(
                "SELECT course_id, exam_name, exam_date, exam_time FROM exams WHERE id = ?",
                [id],
                |r| {
                    Ok(ExamDraft {
                        course_id: r.get(0)?,
                        exam_name: r.get(1)?,
                        exam_date: r.get(2)?,
                        exam_time: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<ExamRecord> {
        Ok(ExamRecord {
            id: row.get(0)?,
            course_id: row.get(1)?,
            course: row.get(2)?,
            exam_name: row.get(3)?,
            exam_date: row.get(4)?,
            exam_time: row.get(5)?,
        })
    }

    fn search_text(record: &ExamRecord) -> Vec<&str> {
        let mut out = vec![record.exam_name.as_str(), record.exam_date.as_str()];
        out.extend(record.course.as_deref());
        out
    }
}
