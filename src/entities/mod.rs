//! Typed rows for every table plus the validation each one needs before it
//! is written. The generic lifecycle lives in [`crate::manager`].

mod attendance;
mod class;
mod course;
mod department;
mod enrollment;
mod exam;
mod grade;
mod registration;
mod student;
mod teacher;
mod timetable;

pub use attendance::{Attendance, AttendanceDraft, AttendanceRecord};
pub use class::{Class, ClassDraft, ClassRecord};
pub use course::{Course, CourseDraft, CourseRecord};
pub use department::{Department, DepartmentDraft, DepartmentRecord};
pub use enrollment::{Enrollment, EnrollmentDraft, EnrollmentRecord};
pub use exam::{Exam, ExamDraft, ExamRecord};
pub use grade::{Grade, GradeDraft, GradeRecord};
pub use registration::{Registration, RegistrationDraft, RegistrationRecord};
pub use student::{Student, StudentDraft, StudentRecord};
pub use teacher::{Teacher, TeacherDraft, TeacherRecord};
pub use timetable::{Timetable, TimetableDraft, TimetableRecord};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::EntityKind;

pub trait Entity {
    const KIND: EntityKind;

    /// Base `SELECT` including display joins. Column order matches
    /// [`Entity::from_row`]; no `WHERE`/`ORDER BY`.
    const SELECT: &'static str;

    /// Qualified id column of the base select.
    const ID_COLUMN: &'static str;

    /// Relationship columns a list may be pinned to: (param name, column).
    const FILTERS: &'static [(&'static str, &'static str)] = &[];

    /// Writable fields. Every field serializes, so a patch can be overlaid
    /// on the JSON form of the stored draft.
    type Draft: Clone + Serialize + DeserializeOwned;

    type Record: Clone + Serialize;

    /// Trims text and rejects malformed values. Needs no storage access.
    fn normalize(draft: Self::Draft) -> StoreResult<Self::Draft>;

    /// Uniqueness and reference checks against the store. `own_id` is the
    /// row being rewritten, if any.
    fn check(
        conn: &Connection,
        cfg: &StoreConfig,
        draft: &Self::Draft,
        own_id: Option<i64>,
    ) -> StoreResult<()>;

    fn insert(conn: &Connection, draft: &Self::Draft) -> StoreResult<i64>;

    fn write(conn: &Connection, id: i64, draft: &Self::Draft) -> StoreResult<()>;

    fn load(conn: &Connection, id: i64) -> StoreResult<Option<Self::Draft>>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self::Record>;

    /// Text a search query is matched against.
    fn search_text(record: &Self::Record) -> Vec<&str>;
}

pub(crate) fn exists(conn: &Connection, kind: EntityKind, id: i64) -> StoreResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());
    let found = conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()?;
    Ok(found.is_some())
}

/// A reference that must be present and resolve.
pub(crate) fn required_ref(
    conn: &Connection,
    entity: EntityKind,
    field: &'static str,
    target: EntityKind,
    id: Option<i64>,
) -> StoreResult<()> {
    match id {
        Some(_) => optional_ref(conn, entity, field, target, id),
        None => Err(StoreError::ReferenceError {
            entity,
            field,
            id: None,
        }),
    }
}

/// A nullable reference; when present it must resolve.
pub(crate) fn optional_ref(
    conn: &Connection,
    entity: EntityKind,
    field: &'static str,
    target: EntityKind,
    id: Option<i64>,
) -> StoreResult<()> {
    let Some(id) = id else { return Ok(()) };
    if exists(conn, target, id)? {
        Ok(())
    } else {
        Err(StoreError::ReferenceError {
            entity,
            field,
            id: Some(id),
        })
    }
}

pub(crate) fn required_text(field: &str, value: String) -> StoreResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(StoreError::invalid(field, "must not be empty"));
    }
    Ok(t.to_string())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn iso_date(field: &str, value: &str) -> StoreResult<String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| StoreError::invalid(field, "expected a YYYY-MM-DD date"))
}

/// Case-insensitive uniqueness over one text column. Compared through the
/// `casefold` SQL function so non-ASCII values fold the same way search does.
pub(crate) fn ensure_unique(
    conn: &Connection,
    entity: EntityKind,
    column: &str,
    field: &'static str,
    value: &str,
    own_id: Option<i64>,
) -> StoreResult<()> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE casefold({}) = ?1 AND id IS NOT ?2 LIMIT 1",
        entity.table(),
        column
    );
    let clash = conn
        .query_row(&sql, params![value.to_lowercase(), own_id], |_| Ok(()))
        .optional()?
        .is_some();
    if clash {
        return Err(StoreError::UniquenessViolation {
            entity,
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
