use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{ensure_unique, optional_text, required_text, Entity};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

pub struct Student;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentDraft {
    pub name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
}

fn canonical_gender(raw: Option<String>) -> StoreResult<Option<String>> {
    let Some(g) = optional_text(raw) else {
        return Ok(None);
    };
    GENDERS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(&g))
        .map(|known| Some(known.to_string()))
        .ok_or_else(|| StoreError::invalid("gender", "expected Male, Female or Other"))
}

impl Entity for Student {
    const KIND: EntityKind = EntityKind::Student;
    const SELECT: &'static str =
        "SELECT s.id, s.name, s.email, s.phone, s.age, s.gender FROM students s";
    const ID_COLUMN: &'static str = "s.id";

    type Draft = StudentDraft;
    type Record = StudentRecord;

    fn normalize(draft: StudentDraft) -> StoreResult<StudentDraft> {
        if let Some(age) = draft.age {
            if age < 1 {
                return Err(StoreError::invalid("age", "must be at least 1"));
            }
        }
        let email = required_text("email", draft.email)?;
        if !email.contains('@') {
            return Err(StoreError::invalid("email", "must contain '@'"));
        }
        Ok(StudentDraft {
            name: required_text("name", draft.name)?,
            age: draft.age,
            gender: canonical_gender(draft.gender)?,
            phone: optional_text(draft.phone),
            email,
        })
    }

    fn check(
        conn: &Connection,
        _cfg: &StoreConfig,
        draft: &StudentDraft,
        own_id: Option<i64>,
    ) -> StoreResult<()> {
        ensure_unique(conn, Self::KIND, "email", "email", &draft.email, own_id)
    }

    fn insert(conn: &Connection, draft: &StudentDraft) -> StoreResult<i64> {
        conn.execute(
            "INSERT INTO students(name, age, gender, phone, email) VALUES(?, ?, ?, ?, ?)",
            (
                &draft.name,
                draft.age,
                &draft.gender,
                &draft.phone,
                &draft.email,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("email", &draft.email))))?;
        Ok(conn.last_insert_rowid())
    }

    fn write(conn: &Connection, id: i64, draft: &StudentDraft) -> StoreResult<()> {
        conn.execute(
            "UPDATE students SET name = ?, age = ?, gender = ?, phone = ?, email = ? WHERE id = ?",
            (
                &draft.name,
                draft.age,
                &draft.gender,
                &draft.phone,
                &draft.email,
                id,
            ),
        )
        .map_err(|e| StoreError::from_constraint(e, Self::KIND, Some(("email", &draft.email))))?;
        Ok(())
    }

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<StudentDraft>> {
        Ok(conn
            .query_row(
                "SELECT name, age, gender, phone, email FROM students WHERE id = ?",
                [id],
                |r| {
                    Ok(StudentDraft {
                        name: r.get(0)?,
                        age: r.get(1)?,
                        gender: r.get(2)?,
                        phone: r.get(3)?,
                        // Legacy rows may lack an email; the next write must supply one.
                        email: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
        Ok(StudentRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            age: row.get(4)?,
            gender: row.get(5)?,
        })
    }

    fn search_text(record: &StudentRecord) -> Vec<&str> {
        let mut out = vec![record.name.as_str()];
        out.extend(record.email.as_deref());
        out.extend(record.phone.as_deref());
        out
    }
}
