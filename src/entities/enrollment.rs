use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{required_ref, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Enrollment;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnrollmentDraft {
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub student_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub id: i64,
    pub class_id: i64,
    pub class: Option<String>,
    pub student_id: i64,
    pub student: Option<String>,
}

fn pair_label(draft: &EnrollmentDraft) -> String {
    format!(
        "class {} / student {}",
        draft.class_id.unwrap_or_default(),
        draft.student_id.unwrap_or_default()
    )
}

impl Entity for Enrollment {
    const KIND: EntityKind = EntityKind::Enrollment;
    const SELECT: &'static str = "SELECT e.id, e.class_id, k.name, e.student_id, s.name
         FROM enrollments e
         LEFT JOIN classes k ON k.id = e.class_id
         LEFT JOIN students s ON s.id = e.student_id";
    const ID_COLUMN: &'static str = "e.id";
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("classId", "e.class_id"), ("studentId", "e.student_id")];

    type Draft = EnrollmentDraft;
    type Record = EnrollmentRecord;

    fn normalize(draft: EnrollmentDraft) -> StoreResult<EnrollmentDraft> {
        Ok(draft)
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &EnrollmentDraft,
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
                "SELECT id FROM enrollments WHERE class_id = ? AND student_id = ? AND id IS NOT ?",
                (draft.class_id, draft.student_id, own_id),
                |r| r.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(StoreError::UniquenessViolation {
                entity: Self::KIND,
                field: "studentId",
                value: pair_label(draft),
            });
        }
        Ok(())
    }

    fn insert(conn: &Connection, draft: &EnrollmentDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO enrollments(class_id, student_id) VALUES(?, ?)",
            (draft.class_id, draft.student_id),
        )
        .map_err(|e| {
            StoreError::from_constraint(e, Self::KIND, Some(("studentId", &pair_label(draft))))
        })?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &EnrollmentDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE enrollments SET class_id = ?, student_id = ? WHERE id = ?",
            (draft.class_id, draft.student_id, id),
        )
        .map_err(|e| {
            StoreError::from_constraint(e, Self::KIND, Some(("studentId", &pair_label(draft))))
        })?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<EnrollmentDraft>> {
        Ok(conn
            .query_row(
                "SELECT class_id, student_id FROM enrollments WHERE id = ?",
                [id],
                |r| {
                    Ok(EnrollmentDraft {
                        class_id: r.get(0)?,
                        student_id: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentRecord> {
        Ok(EnrollmentRecord {
            id: row.get(0)?,
            class_id: row.get(1)?,
            class: row.get(2)?,
            student_id: row.get(3)?,
            student: row.get(4)?,
        })
    }

    fn search_text(record: &EnrollmentRecord) -> Vec<&str> {
        record
            .class
            .as_deref()
            .into_iter()
            .chain(record.student.as_deref())
            .collect()
    }
}
