use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{optional_ref, optional_text, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Course;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CourseDraft {
    pub name: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: i64,
    pub name: String,
    pub department_id: Option<i64>,
    pub department: Option<String>,
    pub fee: f64,
    pub duration: Option<String>,
}

impl Entity for Course {
    const KIND: EntityKind = EntityKind::Course;
    const SELECT: &'static str = "SELECT c.id, c.name, c.department_id, d.name, c.fee, c.duration
         FROM courses c
         LEFT JOIN departments d ON d.id = c.department_id";
    const ID_COLUMN: &'static str = "c.id";
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("departmentId", "c.department_id")];

    type Draft = CourseDraft;
    type Record = CourseRecord;

    fn normalize(draft: CourseDraft) -> StoreResult<CourseDraft> {
        if !draft.fee.is_finite() || draft.fee < 0.0 {
            return Err(StoreError::invalid("fee", "must be a non-negative amount"));
        }
        Ok(CourseDraft {
            name: required_text("name", draft.name)?,
            department_id: draft.department_id,
            fee: draft.fee,
            duration: optional_text(draft.duration),
        })
    }

    fn check(
        conn: &Connection,
        cfg: &StoreConfig,
        draft: &CourseDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        if cfg.require_course_department && draft.department_id.is_none() {
            return Err(StoreError::ReferenceError {
                entity: Self::KIND,
                field: "departmentId",
                id: None,
            });
        }
        optional_ref(
            conn,
            Self::KIND,
            "departmentId",
            EntityKind::Department,
            draft.department_id,
        )
    }

    fn insert(conn: &Connection, draft: &CourseDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO courses(name, department_id, fee, duration) VALUES(?, ?, ?, ?)",
            (&draft.name, draft.department_id, draft.fee, &draft.duration),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &CourseDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE courses SET name = ?, department_id = ?, fee = ?, duration = ? WHERE id = ?",
            (&draft.name, draft.department_id, draft.fee, &draft.duration, id),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, None))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<CourseDraft>> {
        Ok(conn
            .query_row(
                "SELECT name, department_id, fee, duration FROM courses WHERE id = ?",
                [id],
                |r| {
                    Ok(CourseDraft {
                        name: r.get(0)?,
                        department_id: r.get(1)?,
                        fee: r.get(2)?,
                        duration: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<CourseRecord> {
        Ok(CourseRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            department_id: row.get(2)?,
            department: row.get(3)?,
            fee: row.get(4)?,
            duration: row.get(5)?,
        })
    }

    fn search_text(record: &CourseRecord) -> Vec<&str> {
        let mut out = vec![record.name.as_str()];
        out.extend(record.department.as_deref());
        out.extend(record.duration.as_deref());
        out
    }
}
