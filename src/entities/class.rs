use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{optional_ref, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Class;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassDraft {
    pub name: String,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: i64,
    pub name: String,
    pub course_id: Option<i64>,
    pub course: Option<String>,
    pub teacher_id: Option<i64>,
    pub teacher: Option<String>,
    pub student_count: i64,
}

impl Entity for Class {
    const KIND: EntityKind = EntityKind::Class;
    // Correlated count avoids double-counting through the joins.
    const SELECT: &'static str = "SELECT
           k.id,
           k.name,
           k.course_id, c.name,
           k.teacher_id, t.name,
           (SELECT COUNT(*) FROM enrollments e WHERE e.class_id = k.id) AS student_count
         FROM classes k
         LEFT JOIN courses c ON c.id = k.course_id
         LEFT JOIN teachers t ON t.id = k.teacher_id";
    const ID_COLUMN: &'static str = "k.id";
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("courseId", "k.course_id"), ("teacherId", "k.teacher_id")];

    type Draft = ClassDraft;
    type Record = ClassRecord;

    fn normalize(draft: ClassDraft) -> StoreResult<ClassDraft> {
        Ok(ClassDraft {
            name: required_text("name", draft.name)?,
            ..draft
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &ClassDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        optional_ref(
            conn,
            Self::KIND,
            "courseId",
            EntityKind::Course,
            draft.course_id,
        )?;
        optional_ref(
            conn,
            Self::KIND,
            "teacherId",
            EntityKind::Teacher,
            draft.teacher_id,
        )
    }

    fn insert(conn: &Connection, draft: &ClassDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO classes(name, course_id, teacher_id) VALUES(?, ?, ?)",
            (&draft.name, draft.course_id, draft.teacher_id),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &ClassDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE classes SET name = ?, course_id = ?, teacher_id = ? WHERE id = ?",
            (&draft.name, draft.course_id, draft.teacher_id, id),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<ClassDraft>> {
        Ok(conn
            .query_row(
                "SELECT name, course_id, teacher_id FROM classes WHERE id = ?",
                [id],
                |r| {
                    Ok(ClassDraft {
                        name: r.get(0)?,
                        course_id: r.get(1)?,
                        teacher_id: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<ClassRecord> {
        Ok(ClassRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            course_id: row.get(2)?,
            course: row.get(3)?,
            teacher_id: row.get(4)?,
            teacher: row.get(5)?,
            student_count: row.get(6)?,
        })
    }

    fn search_text(record: &ClassRecord) -> Vec<&str> {
        let mut out = vec![record.name.as_str()];
        out.extend(record.course.as_deref());
        out.extend(record.teacher.as_deref());
        out
    }
}
