use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{optional_text, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::EntityKind;

pub struct Teacher;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TeacherDraft {
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: i64,
    pub name: String,
    pub subject: Option<String>,
}

impl Entity for Teacher {
    const KIND: EntityKind = EntityKind::Teacher;
    const SELECT: &'static str = "SELECT t.id, t.name, t.subject FROM teachers t";
    const ID_COLUMN: &'static str = "t.id";

    type Draft = TeacherDraft;
    type Record = TeacherRecord;

    fn normalize(draft: TeacherDraft) -> StoreResult<TeacherDraft> {
        Ok(TeacherDraft {
            name: required_text("name", draft.name)?,
            subject: optional_text(draft.subject),
        })
    }

    fn check(
        _conn: &Connection,
        _cfg: &StoreConfig,
        _draft: &TeacherDraft,
        _own_id: Option<i64>,
    ) -> StoreResult<()> {
        Ok(())
    }

    fn insert(conn: &Connection, draft: &TeacherDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO teachers(name, subject) VALUES(?, ?)",
            (&draft.name, &draft.subject),
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &TeacherDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE teachers SET name = ?, subject = ? WHERE id = ?",
            (&draft.name, &draft.subject, id),
        )?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<TeacherDraft>> {
        Ok(conn
            .query_row(
                "SELECT name, subject FROM teachers WHERE id = ?",
                [id],
                |r| {
                    Ok(TeacherDraft {
                        name: r.get(0)?,
                        subject: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<TeacherRecord> {
        Ok(TeacherRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            subject: row.get(2)?,
        })
    }

    fn search_text(record: &TeacherRecord) -> Vec<&str> {
        let mut out = vec![record.name.as_str()];
        out.extend(record.subject.as_deref());
        out
    }
}
