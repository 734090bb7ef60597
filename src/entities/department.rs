use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{ensure_unique, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub struct Department;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepartmentDraft {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRecord {
    pub id: i64,
    pub name: String,
    pub course_count: i64,
}

impl Entity for Department {
    const KIND: EntityKind = EntityKind::Department;
    const SELECT: &'static str = "SELECT
           d.id,
           d.name,
           (SELECT COUNT(*) FROM courses c WHERE c.department_id = d.id) AS course_count
         FROM departments d";
    const ID_COLUMN: &'static str = "d.id";

    type Draft = DepartmentDraft;
    type Record = DepartmentRecord;

    fn normalize(draft: DepartmentDraft) -> StoreResult<DepartmentDraft> {
        Ok(DepartmentDraft {
            name: required_text("name", draft.name)?,
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &DepartmentDraft,
        own_id: Option<i64>,
    ) -> StoreResult<()> {
        ensure_unique(conn, Self::KIND, "name", "name", &draft.name, own_id)
    }

    fn insert(conn: &Connection, draft: &DepartmentDraft) -> StoreResult<i64> {
        conn.execute("INSERT INTO departments(name) VALUES(?)", [&draft.name])
            .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("name", &draft.name))))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &DepartmentDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE departments SET name = ? WHERE id = ?",
            (&draft.name, id),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("name", &draft.name))))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<DepartmentDraft>> {
        Ok(conn
            .query_row("SELECT name FROM departments WHERE id = ?", [id], |r| {
                Ok(DepartmentDraft { name: r.get(0)? })
            })
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<DepartmentRecord> {
        Ok(DepartmentRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            course_count: row.get(2)?,
        })
    }

    fn search_text(record: &DepartmentRecord) -> Vec<&str> {
        vec![record.name.as_str()]
    }
}
