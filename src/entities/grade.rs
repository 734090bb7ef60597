use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{optional_text, required_ref, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Grade;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GradeDraft {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub course_id: Option<i64>,
    pub grade: f64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: i64,
    pub student_id: Option<i64>,
    pub student: Option<String>,
    pub course_id: Option<i64>,
    pub course: Option<String>,
    pub grade: f64,
    pub remarks: Option<String>,
}

impl Entity for Grade {
    const KIND: EntityKind = EntityKind::Grade;
    const SELECT: &'static str =
        "SELECT g.id, g.student_id, s.name, g.course_id, c.name, g.grade, g.remarks
         FROM grades g
         LEFT JOIN students s ON s.id = g.student_id
         LEFT JOIN courses c ON c.id = g.course_id";
    const ID_COLUMN: &'static str = "g.id";
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("studentId", "g.student_id"), ("courseId", "g.course_id")];

    type Draft = GradeDraft;
    type Record = GradeRecord;

    fn normalize(draft: GradeDraft) -> StoreResult<GradeDraft> {
        if !(0.0..=100.0).contains(&draft.grade) {
            return Err(StoreError::invalid("grade", "must be between 0 and 100"));
        }
        Ok(GradeDraft {
            remarks: optional_text(draft.remarks),
            ..draft
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &GradeDraft,
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
            "courseId",
            EntityKind::Course,
            draft.course_id,
        )
    }

    fn insert(conn: &Connection, draft: &GradeDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO grades(student_id, course_id, grade, remarks) VALUES(?, ?, ?, ?)",
            (draft.student_id, draft.course_id, draft.grade, &draft.remarks),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &GradeDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE grades SET student_id = ?, course_id = ?, grade = ?, remarks = ? WHERE id = ?",
            (
                draft.student_id,
                draft.course_id,
                draft.grade,
                &draft.remarks,
                id,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<GradeDraft>> {
        Ok(conn
            .query_row(
                "SELECT student_id, course_id, grade, remarks FROM grades WHERE id = ?",
                [id],
                |r| {
                    Ok(GradeDraft {
                        student_id: r.get(0)?,
                        course_id: r.get(1)?,
                        grade: r.get(2)?,
                        remarks: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
        Ok(GradeRecord {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student: row.get(2)?,
            course_id: row.get(3)?,
            course: row.get(4)?,
            grade: row.get(5)?,
            remarks: row.get(6)?,
        })
    }

    fn search_text(record: &GradeRecord) -> Vec<&str> {
        record
            .student
            .as_deref()
            .into_iter()
            .chain(record.course.as_deref())
            .chain(record.remarks.as_deref())
            .collect()
    }
}
