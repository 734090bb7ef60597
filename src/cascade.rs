//! Delete walker over [`crate::schema::DEPENDENCIES`].

use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Blocker, StoreError, StoreResult};
use crate::schema::{delete_rule, DeletePolicy, EntityKind, Reference};

/// Rows removed per table by one delete, the target included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub entity: EntityKind,
    pub id: i64,
    pub removed: BTreeMap<&'static str, usize>,
}

impl DeleteReport {
    fn new(entity: EntityKind, id: i64) -> Self {
        DeleteReport {
            entity,
            id,
            removed: BTreeMap::new(),
        }
    }

    fn add(&mut self, kind: EntityKind, rows: usize) {
        if rows > 0 {
            *self.removed.entry(kind.table()).or_default() += rows;
        }
    }

    pub fn rows(&self, table: &str) -> usize {
        self.removed.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.removed.values().sum()
    }
}

/// Deletes `kind`/`id` and, per the dependency table, everything that
/// depends on it. Must run inside the caller's transaction: on error the
/// caller drops it and nothing is kept.
pub(crate) fn delete(conn: &Connection, kind: EntityKind, id: i64) -> StoreResult<DeleteReport> {
    let mut report = DeleteReport::new(kind, id);
    remove(conn, kind, id, &mut report)?;
    Ok(report)
}

fn remove(conn: &Connection, kind: EntityKind, id: i64, report: &mut DeleteReport) -> StoreResult<()> {
    let rule = delete_rule(kind);
    match rule.policy {
        DeletePolicy::Restrict => {
            let blockers = blockers(conn, rule.references, id)?;
            if !blockers.is_empty() {
                return Err(StoreError::ReferencedEntityError {
                    entity: kind,
                    id,
                    blockers,
                });
            }
        }
        DeletePolicy::Cascade => {
            for reference in rule.references {
                if delete_rule(reference.child).policy == DeletePolicy::Leaf {
                    let sql = format!(
                        "DELETE FROM {} WHERE {} = ?",
                        reference.child.table(),
                        reference.column
                    );
                    let n = conn.execute(&sql, [id])?;
                    debug!(parent = %kind, id, table = reference.child.table(), rows = n, "cascade");
                    report.add(reference.child, n);
                } else {
                    // Child has dependents of its own: walk it row by row.
                    for child_id in child_ids(conn, reference, id)? {
                        remove(conn, reference.child, child_id, report)?;
                    }
                }
            }
        }
        DeletePolicy::Leaf => {}
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let n = conn.execute(&sql, [id])?;
    if n == 0 {
        return Err(StoreError::NotFound { entity: kind, id });
    }
    report.add(kind, n);
    Ok(())
}

fn child_ids(conn: &Connection, reference: &Reference, id: i64) -> StoreResult<Vec<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ? ORDER BY id",
        reference.child.table(),
        reference.column
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([id], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn blockers(conn: &Connection, references: &[Reference], id: i64) -> StoreResult<Vec<Blocker>> {
    let mut out = Vec::new();
    for reference in references {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            reference.child.table(),
            reference.column
        );
        let rows: i64 = conn.query_row(&sql, [id], |r| r.get(0))?;
        if rows > 0 {
            out.push(Blocker {
                table: reference.child.table(),
                column: reference.column,
                rows,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seeded() -> Connection {
        let conn = db::open_in_memory().expect("db");
        conn.execute_batch(
            "INSERT INTO departments(id, name) VALUES(1, 'Math');
             INSERT INTO courses(id, name, department_id, fee) VALUES(1, 'Algebra I', 1, 500);
             INSERT INTO teachers(id, name, subject) VALUES(1, 'Turing', 'Logic');
             INSERT INTO students(id, name, email) VALUES(1, 'Ada', 'ada@x.com');
             INSERT INTO students(id, name, email) VALUES(2, 'Grace', 'grace@x.com');
             INSERT INTO timetable(course_id, day, time_slot) VALUES(1, 'Monday', '9-11');
             INSERT INTO exams(course_id, exam_name, exam_date, exam_time) VALUES(1, 'Midterm', '2025-03-01', '10:00');
             INSERT INTO grades(student_id, course_id, grade) VALUES(1, 1, 91);
             INSERT INTO grades(student_id, course_id, grade) VALUES(2, 1, 78);
             INSERT INTO registrations(student_id, teacher_id, course_id, registration_date) VALUES(1, 1, 1, '2025-01-10');
             INSERT INTO classes(id, name, course_id, teacher_id) VALUES(1, 'Algebra A', 1, 1);
             INSERT INTO enrollments(class_id, student_id) VALUES(1, 1);
             INSERT INTO enrollments(class_id, student_id) VALUES(1, 2);
             INSERT INTO attendance(class_id, student_id, date, present) VALUES(1, 1, '2025-03-03', 1);",
        )
        .expect("seed");
        conn
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).expect(sql)
    }

    #[test]
    fn course_delete_walks_through_classes() {
        let conn = seeded();
        let report = delete(&conn, EntityKind::Course, 1).expect("delete");
        assert_eq!(report.rows("courses"), 1);
        assert_eq!(report.rows("timetable"), 1);
        assert_eq!(report.rows("exams"), 1);
        assert_eq!(report.rows("grades"), 2);
        assert_eq!(report.rows("registrations"), 1);
        assert_eq!(report.rows("classes"), 1);
        assert_eq!(report.rows("enrollments"), 2);
        assert_eq!(report.rows("attendance"), 1);
        assert_eq!(report.total(), 10);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM departments"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM students"), 2);
    }

    #[test]
    fn restricted_delete_lists_blockers() {
        let conn = seeded();
        let err = delete(&conn, EntityKind::Teacher, 1).expect_err("blocked");
        match err {
            StoreError::ReferencedEntityError { blockers, .. } => {
                let tables: Vec<_> = blockers.iter().map(|b| b.table).collect();
                assert_eq!(tables, vec!["classes", "registrations"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_row_is_not_found() {
        let conn = seeded();
        let err = delete(&conn, EntityKind::Exam, 99).expect_err("missing");
        assert!(matches!(err, StoreError::NotFound { id: 99, .. }));
    }
}
