use anyhow::Context;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

pub const DB_FILE: &str = "school.sqlite3";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let path = db_path(workspace);
    let conn = Connection::open(&path)
        .with_context(|| format!("failed to open database {}", path.to_string_lossy()))?;
    register_functions(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    register_functions(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// [`open_db`] with failures reported as [`StoreError::StorageUnavailable`].
pub fn open_store(workspace: &Path) -> StoreResult<Connection> {
    open_db(workspace).map_err(StoreError::StorageUnavailable)
}

/// `casefold(text)`: Unicode lowercase, the same folding search applies.
/// SQLite's own `lower()` and NOCASE only fold ASCII.
fn register_functions(conn: &Connection) -> anyhow::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )
    .context("failed to register casefold")?;
    Ok(())
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            department_id INTEGER,
            fee REAL NOT NULL DEFAULT 0,
            duration TEXT,
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    // Variants without departments created courses without the column.
    ensure_column(conn, "courses", "department_id", "INTEGER")?;
    ensure_column(conn, "courses", "duration", "TEXT")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            subject TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER,
            gender TEXT,
            phone TEXT,
            email TEXT UNIQUE COLLATE NOCASE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER,
            day TEXT NOT NULL,
            time_slot TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_course ON timetable(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER,
            exam_name TEXT NOT NULL,
            exam_date TEXT NOT NULL,
            exam_time TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    // Older exam tables were not tied to a course.
    ensure_column(conn, "exams", "course_id", "INTEGER")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_course ON exams(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            course_id INTEGER,
            grade REAL NOT NULL,
            remarks TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS registrations(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            teacher_id INTEGER,
            course_id INTEGER,
            registration_date TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_registrations_student ON registrations(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_registrations_teacher ON registrations(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_registrations_course ON registrations(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            course_id INTEGER,
            teacher_id INTEGER,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    ensure_column(conn, "classes", "course_id", "INTEGER")?;
    ensure_column(conn, "classes", "teacher_id", "INTEGER")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_course ON classes(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(class_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            present INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(class_id, student_id, date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl),
        [],
    )
    .with_context(|| format!("failed to add {}.{}", table, column))?;
    Ok(())
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;

    #[test]
    fn fresh_store_has_every_table() {
        let conn = open_in_memory().expect("open");
        for kind in EntityKind::ALL {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |r| {
                    r.get(0)
                })
                .expect(kind.table());
            assert_eq!(n, 0);
        }
    }

    #[test]
    fn casefold_is_unicode_aware() {
        let conn = open_in_memory().expect("open");
        let folded: String = conn
            .query_row("SELECT casefold('FÍSICA Ñandú')", [], |r| r.get(0))
            .expect("casefold");
        assert_eq!(folded, "física ñandú");
        let null: Option<String> = conn
            .query_row("SELECT casefold(NULL)", [], |r| r.get(0))
            .expect("null");
        assert_eq!(null, None);
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = open_in_memory().expect("open");
        init_schema(&conn).expect("second init");
        init_schema(&conn).expect("third init");
    }

    #[test]
    fn variant_without_relationship_columns_is_migrated() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE courses(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, fee REAL NOT NULL);
             CREATE TABLE exams(id INTEGER PRIMARY KEY AUTOINCREMENT, exam_name TEXT NOT NULL, exam_date TEXT NOT NULL, exam_time TEXT NOT NULL);
             INSERT INTO courses(name, fee) VALUES('Biology', 250);",
        )
        .expect("legacy schema");

        init_schema(&conn).expect("migrate");

        assert!(table_has_column(&conn, "courses", "department_id").expect("pragma"));
        assert!(table_has_column(&conn, "courses", "duration").expect("pragma"));
        assert!(table_has_column(&conn, "exams", "course_id").expect("pragma"));
        let dept: Option<i64> = conn
            .query_row(
                "SELECT department_id FROM courses WHERE name = 'Biology'",
                [],
                |r| r.get(0),
            )
            .expect("row kept");
        assert_eq!(dept, None);
    }

    #[test]
    fn open_db_creates_workspace_file() {
        let dir = std::env::temp_dir().join(format!(
            "schoold-db-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let conn = open_db(&dir).expect("open");
        drop(conn);
        assert!(db_path(&dir).is_file());
        let _ = std::fs::remove_dir_all(dir);
    }
}
