//! The lifecycle API handed to callers.
//!
//! A manager borrows one connection and the store settings for the length
//! of a request; every mutation runs inside its own transaction.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::cascade::{self, DeleteReport};
use crate::config::StoreConfig;
use crate::entities::{exists, Entity};
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

/// Field overrides for [`EntityLifecycleManager::update`], keyed by the
/// draft's camelCase field names.
pub type Patch = serde_json::Map<String, serde_json::Value>;

/// Pins one relationship column of a list to a parent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub field: String,
    pub id: i64,
}

impl ListFilter {
    pub fn new(field: impl Into<String>, id: i64) -> Self {
        ListFilter {
            field: field.into(),
            id,
        }
    }
}

pub struct EntityLifecycleManager<'a> {
    conn: &'a Connection,
    config: StoreConfig,
}

impl<'a> EntityLifecycleManager<'a> {
    pub fn new(conn: &'a Connection, config: StoreConfig) -> Self {
        EntityLifecycleManager { conn, config }
    }

    pub fn create<E: Entity>(&self, draft: E::Draft) -> StoreResult<E::Record> {
        let draft = E::normalize(draft)?;
        let tx = self.conn.unchecked_transaction()?;
        E::check(&tx, &self.config, &draft, None)?;
        let id = E::insert(&tx, &draft)?;
        let record = fetch::<E>(&tx, id)?;
        tx.commit()?;
        debug!(entity = %E::KIND, id, "created");
        Ok(record)
    }

    pub fn get<E: Entity>(&self, id: i64) -> StoreResult<E::Record> {
        fetch::<E>(self.conn, id)
    }

    /// Overlays `patch` on the stored row and writes the result. Fields the
    /// patch does not name keep their values.
    pub fn update<E: Entity>(&self, id: i64, patch: &Patch) -> StoreResult<E::Record> {
        let tx = self.conn.unchecked_transaction()?;
        let current = E::load(&tx, id)?.ok_or(StoreError::NotFound {
            entity: E::KIND,
            id,
        })?;
        let draft = E::normalize(apply_patch(&current, patch)?)?;
        E::check(&tx, &self.config, &draft, Some(id))?;
        E::write(&tx, id, &draft)?;
        let record = fetch::<E>(&tx, id)?;
        tx.commit()?;
        debug!(entity = %E::KIND, id, fields = patch.len(), "updated");
        Ok(record)
    }

    /// Rewrites every field of an existing row.
    pub fn replace<E: Entity>(&self, id: i64, draft: E::Draft) -> StoreResult<E::Record> {
        let draft = E::normalize(draft)?;
        let tx = self.conn.unchecked_transaction()?;
        if !exists(&tx, E::KIND, id)? {
            return Err(StoreError::NotFound {
                entity: E::KIND,
                id,
            });
        }
        E::check(&tx, &self.config, &draft, Some(id))?;
        E::write(&tx, id, &draft)?;
        let record = fetch::<E>(&tx, id)?;
        tx.commit()?;
        Ok(record)
    }

    pub fn delete<E: Entity>(&self, id: i64) -> StoreResult<DeleteReport> {
        self.delete_kind(E::KIND, id)
    }

    /// Deletes by kind, applying that kind's cascade or restrict policy.
    pub fn delete_kind(&self, kind: EntityKind, id: i64) -> StoreResult<DeleteReport> {
        let tx = self.conn.unchecked_transaction()?;
        if !exists(&tx, kind, id)? {
            return Err(StoreError::NotFound { entity: kind, id });
        }
        let report = cascade::delete(&tx, kind, id)?;
        tx.commit()?;
        Ok(report)
    }

    pub fn list<E: Entity>(&self, filter: Option<&ListFilter>) -> StoreResult<Vec<E::Record>> {
        let mut sql = E::SELECT.to_string();
        let mut args: Vec<i64> = Vec::new();
        if let Some(f) = filter {
            let column = E::FILTERS
                .iter()
                .find(|(name, _)| *name == f.field)
                .map(|(_, column)| *column)
                .ok_or_else(|| {
                    StoreError::invalid(
                        "filter",
                        format!("{} cannot be filtered by {}", E::KIND, f.field),
                    )
                })?;
            sql.push_str(&format!(" WHERE {} = ?", column));
            args.push(f.id);
        }
        sql.push_str(&format!(" ORDER BY {}", E::ID_COLUMN));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), |r| E::from_row(r))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring search over the same rows [`Self::list`]
    /// returns. The query is matched as given, whitespace included; an empty
    /// query matches everything.
    pub fn search<E: Entity>(&self, query: &str) -> StoreResult<Vec<E::Record>> {
        let needle = query.to_lowercase();
        let rows = self.list::<E>(None)?;
        if needle.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .filter(|rec| {
                E::search_text(rec)
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Row count per table.
    pub fn stats(&self) -> StoreResult<BTreeMap<&'static str, i64>> {
        let mut out = BTreeMap::new();
        for kind in EntityKind::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
            let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
            out.insert(kind.table(), n);
        }
        Ok(out)
    }
}

fn fetch<E: Entity>(conn: &Connection, id: i64) -> StoreResult<E::Record> {
    let sql = format!("{} WHERE {} = ?", E::SELECT, E::ID_COLUMN);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(E::from_row(row)?),
        None => Err(StoreError::NotFound {
            entity: E::KIND,
            id,
        }),
    }
}

fn apply_patch<D: Serialize + DeserializeOwned>(current: &D, patch: &Patch) -> StoreResult<D> {
    let mut value = serde_json::to_value(current)
        .map_err(|e| StoreError::invalid("fields", e.to_string()))?;
    let Some(fields) = value.as_object_mut() else {
        return Err(StoreError::invalid("fields", "draft is not an object"));
    };
    for (key, v) in patch {
        if !fields.contains_key(key) {
            return Err(StoreError::invalid(key.as_str(), "unknown field"));
        }
        fields.insert(key.clone(), v.clone());
    }
    serde_json::from_value(value).map_err(|e| StoreError::invalid("fields", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::entities::*;
    use serde_json::json;

    fn patch(v: serde_json::Value) -> Patch {
        v.as_object().cloned().expect("object")
    }

    fn student(m: &EntityLifecycleManager<'_>, name: &str, email: &str) -> StudentRecord {
        m.create::<Student>(StudentDraft {
            name: name.into(),
            age: None,
            gender: None,
            phone: None,
            email: email.into(),
        })
        .expect("student")
    }

    #[test]
    fn update_overlays_only_named_fields() {
        let conn = db::open_in_memory().expect("db");
        let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
        let ada = student(&m, "Ada", "ada@x.com");

        let updated = m
            .update::<Student>(ada.id, &patch(json!({ "phone": "555-0100", "age": 36 })))
            .expect("update");
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.email.as_deref(), Some("ada@x.com"));
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.age, Some(36));

        let cleared = m
            .update::<Student>(ada.id, &patch(json!({ "phone": null })))
            .expect("clear");
        assert_eq!(cleared.phone, None);
    }

    #[test]
    fn update_rejects_unknown_fields_and_missing_rows() {
        let conn = db::open_in_memory().expect("db");
        let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
        let ada = student(&m, "Ada", "ada@x.com");

        let err = m
            .update::<Student>(ada.id, &patch(json!({ "nickname": "A" })))
            .expect_err("unknown");
        assert!(matches!(err, StoreError::InvalidField { .. }));

        let err = m
            .update::<Student>(ada.id + 100, &patch(json!({ "name": "X" })))
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(m.get::<Student>(ada.id).expect("still there").name, "Ada");
    }

    #[test]
    fn update_keeps_uniqueness_against_other_rows() {
        let conn = db::open_in_memory().expect("db");
        let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
        let ada = student(&m, "Ada", "ada@x.com");
        student(&m, "Grace", "grace@x.com");

        let err = m
            .update::<Student>(ada.id, &patch(json!({ "email": "GRACE@x.com" })))
            .expect_err("clash");
        assert!(matches!(err, StoreError::UniquenessViolation { .. }));
        m.update::<Student>(ada.id, &patch(json!({ "email": "ADA@x.com" })))
            .expect("own email in a new case");
    }

    #[test]
    fn list_filter_must_be_declared() {
        let conn = db::open_in_memory().expect("db");
        let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
        let math = m
            .create::<Department>(DepartmentDraft { name: "Math".into() })
            .expect("dept");
        m.create::<Course>(CourseDraft {
            name: "Algebra I".into(),
            department_id: Some(math.id),
            fee: 500.0,
            duration: None,
        })
        .expect("course");
        m.create::<Course>(CourseDraft {
            name: "Free Study".into(),
            department_id: None,
            fee: 0.0,
            duration: None,
        })
        .expect("course");

        let by_dept = m
            .list::<Course>(Some(&ListFilter::new("departmentId", math.id)))
            .expect("filtered");
        assert_eq!(by_dept.len(), 1);
        assert_eq!(by_dept[0].department.as_deref(), Some("Math"));

        let err = m
            .list::<Course>(Some(&ListFilter::new("teacherId", 1)))
            .expect_err("undeclared");
        assert!(matches!(err, StoreError::InvalidField { .. }));
    }

    #[test]
    fn required_department_is_enforced_when_configured() {
        let conn = db::open_in_memory().expect("db");
        let strict = StoreConfig {
            require_course_department: true,
        };
        let m = EntityLifecycleManager::new(&conn, strict);
        let err = m
            .create::<Course>(CourseDraft {
                name: "Orphan".into(),
                department_id: None,
                fee: 10.0,
                duration: None,
            })
            .expect_err("department required");
        assert!(matches!(
            err,
            StoreError::ReferenceError {
                field: "departmentId",
                id: None,
                ..
            }
        ));
        assert_eq!(m.stats().expect("stats")["courses"], 0);
    }

    #[test]
    fn replace_rewrites_whole_row() {
        let conn = db::open_in_memory().expect("db");
        let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
        let t = m
            .create::<Teacher>(TeacherDraft {
                name: "Turing".into(),
                subject: Some("Logic".into()),
            })
            .expect("teacher");
        let replaced = m
            .replace::<Teacher>(
                t.id,
                TeacherDraft {
                    name: "Alan Turing".into(),
                    subject: None,
                },
            )
            .expect("replace");
        assert_eq!(replaced.name, "Alan Turing");
        assert_eq!(replaced.subject, None);
        assert!(matches!(
            m.replace::<Teacher>(
                t.id + 1,
                TeacherDraft {
                    name: "Nobody".into(),
                    subject: None
                }
            ),
            Err(StoreError::NotFound { .. })
        ));
    }
}
