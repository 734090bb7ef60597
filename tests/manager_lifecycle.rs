use schoold::db;
use schoold::entities::*;
use schoold::{EntityKind, EntityLifecycleManager, StoreConfig, StoreError};

struct Seed {
    math: i64,
    algebra: i64,
    turing: i64,
    ada: i64,
    grace: i64,
    class_a: i64,
}

fn seed(m: &EntityLifecycleManager<'_>) -> Seed {
    let math = m
        .create::<Department>(DepartmentDraft { name: "Math".into() })
        .expect("department")
        .id;
    let algebra = m
        .create::<Course>(CourseDraft {
            name: "Algebra I".into(),
            department_id: Some(math),
            fee: 500.0,
            duration: Some("12 weeks".into()),
        })
        .expect("course")
        .id;
    let turing = m
        .create::<Teacher>(TeacherDraft {
            name: "Turing".into(),
            subject: Some("Logic".into()),
        })
        .expect("teacher")
        .id;
    let student = |name: &str, email: &str| {
        m.create::<Student>(StudentDraft {
            name: name.into(),
            age: Some(20),
            gender: None,
            phone: None,
            email: email.into(),
        })
        .expect("student")
        .id
    };
    let ada = student("Ada", "ada@x.com");
    let grace = student("Grace", "grace@x.com");

    m.create::<Timetable>(TimetableDraft {
        course_id: Some(algebra),
        day: "monday".into(),
        time_slot: "09:00-10:00".into(),
    })
    .expect("timetable");
    m.create::<Exam>(ExamDraft {
        course_id: Some(algebra),
        exam_name: "Midterm".into(),
        exam_date: "2024-03-01".into(),
        exam_time: "10:00".into(),
    })
    .expect("exam");
    for sid in [ada, grace] {
        m.create::<Grade>(GradeDraft {
            student_id: Some(sid),
            course_id: Some(algebra),
            grade: 91.5,
            remarks: None,
        })
        .expect("grade");
        m.create::<Registration>(RegistrationDraft {
            student_id: Some(sid),
            teacher_id: None,
            course_id: Some(algebra),
            registration_date: Some("2024-01-15".into()),
        })
        .expect("registration");
    }
    let class_a = m
        .create::<Class>(ClassDraft {
            name: "Algebra A".into(),
            course_id: Some(algebra),
            teacher_id: None,
        })
        .expect("class")
        .id;
    for sid in [ada, grace] {
        m.create::<Enrollment>(EnrollmentDraft {
            class_id: Some(class_a),
            student_id: Some(sid),
        })
        .expect("enrollment");
    }
    m.create::<Attendance>(AttendanceDraft {
        class_id: Some(class_a),
        student_id: Some(ada),
        date: "2024-02-01".into(),
        present: true,
    })
    .expect("attendance");

    Seed {
        math,
        algebra,
        turing,
        ada,
        grace,
        class_a,
    }
}

#[test]
fn deleting_a_student_leaves_no_dangling_rows() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);

    let report = m.delete::<Student>(s.ada).expect("delete student");
    assert_eq!(report.rows("students"), 1);
    assert_eq!(report.rows("grades"), 1);
    assert_eq!(report.rows("registrations"), 1);
    assert_eq!(report.rows("enrollments"), 1);
    assert_eq!(report.rows("attendance"), 1);

    for kind in EntityKind::ALL {
        let column = match kind {
            EntityKind::Grade
            | EntityKind::Registration
            | EntityKind::Enrollment
            | EntityKind::Attendance => "student_id",
            _ => continue,
        };
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", kind.table(), column);
        let n: i64 = conn.query_row(&sql, [s.ada], |r| r.get(0)).expect("count");
        assert_eq!(n, 0, "{} still references the student", kind.table());
    }

    // Grace's rows are untouched.
    let class = m.get::<Class>(s.class_a).expect("class");
    assert_eq!(class.student_count, 1);
    assert_eq!(m.list::<Grade>(None).expect("grades").len(), 1);
    assert_eq!(m.get::<Student>(s.grace).expect("grace").name, "Grace");
}

#[test]
fn deleting_a_course_cascades_through_classes() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);

    let report = m.delete::<Course>(s.algebra).expect("delete course");
    assert_eq!(report.rows("courses"), 1);
    assert_eq!(report.rows("timetable"), 1);
    assert_eq!(report.rows("exams"), 1);
    assert_eq!(report.rows("grades"), 2);
    assert_eq!(report.rows("registrations"), 2);
    assert_eq!(report.rows("classes"), 1);
    assert_eq!(report.rows("enrollments"), 2);
    assert_eq!(report.rows("attendance"), 1);

    let stats = m.stats().expect("stats");
    assert_eq!(stats["departments"], 1);
    assert_eq!(stats["students"], 2);
    assert_eq!(stats["teachers"], 1);
    for table in [
        "courses",
        "timetable",
        "exams",
        "grades",
        "registrations",
        "classes",
        "enrollments",
        "attendance",
    ] {
        assert_eq!(stats[table], 0, "{} not emptied", table);
    }
    assert_eq!(m.get::<Department>(s.math).expect("dept").course_count, 0);
}

#[test]
fn restricted_deletes_change_nothing() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);
    m.create::<Registration>(RegistrationDraft {
        student_id: Some(s.grace),
        teacher_id: Some(s.turing),
        course_id: Some(s.algebra),
        registration_date: None,
    })
    .expect("registration with teacher");
    let before = m.stats().expect("stats");

    match m.delete::<Teacher>(s.turing) {
        Err(StoreError::ReferencedEntityError { blockers, .. }) => {
            assert_eq!(blockers.len(), 1);
            assert_eq!(blockers[0].table, "registrations");
            assert_eq!(blockers[0].rows, 1);
        }
        other => panic!("expected referenced entity error, got {:?}", other),
    }
    assert!(matches!(
        m.delete::<Department>(s.math),
        Err(StoreError::ReferencedEntityError { .. })
    ));
    assert_eq!(m.stats().expect("stats"), before);
}

#[test]
fn failed_cascade_rolls_back_every_step() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);
    conn.execute_batch(
        "CREATE TRIGGER courses_locked BEFORE DELETE ON courses
         BEGIN SELECT RAISE(ABORT, 'courses are locked'); END;",
    )
    .expect("trigger");
    let before = m.stats().expect("stats");

    // Children go first, so the abort lands after they were removed.
    assert!(m.delete::<Course>(s.algebra).is_err());
    assert_eq!(m.stats().expect("stats"), before);
    assert_eq!(m.get::<Class>(s.class_a).expect("class").student_count, 2);
}

#[test]
fn search_returns_only_rows_containing_the_query() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    seed(&m);
    m.create::<Student>(StudentDraft {
        name: "Grace Hopper".into(),
        age: None,
        gender: None,
        phone: None,
        email: "hopper@x.com".into(),
    })
    .expect("student");

    let all = m.list::<Student>(None).expect("list");
    for query in ["a", "ADA", "x.com", "nobody", "Ada ", " ", "  grace  ", "E H"] {
        let needle = query.to_lowercase();
        let found = m.search::<Student>(query).expect("search");
        for rec in &found {
            assert!(all.contains(rec), "query {:?}", query);
            assert!(
                Student::search_text(rec)
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle)),
                "{} does not contain {:?}",
                rec.name,
                query
            );
        }
        let expected = all
            .iter()
            .filter(|rec| {
                Student::search_text(rec)
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle))
            })
            .count();
        assert_eq!(found.len(), expected, "query {:?}", query);
    }

    assert_eq!(m.search::<Student>("").expect("empty").len(), all.len());
    assert!(m.search::<Student>("Ada ").expect("padded").is_empty());
    assert!(m.search::<Student>("  ").expect("spaces").is_empty());
    let spaced = m.search::<Student>("e h").expect("inner space");
    assert_eq!(spaced.len(), 1);
    assert_eq!(spaced[0].name, "Grace Hopper");
    assert_eq!(m.search::<Student>("GRACE").expect("grace").len(), 2);

    let regs = m.search::<Registration>("ada").expect("joined names");
    assert_eq!(regs.len(), 1);
    assert_eq!(regs[0].department.as_deref(), Some("Math"));
}

#[test]
fn duplicate_pairs_are_rejected() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);

    assert!(matches!(
        m.create::<Enrollment>(EnrollmentDraft {
            class_id: Some(s.class_a),
            student_id: Some(s.ada),
        }),
        Err(StoreError::UniquenessViolation { .. })
    ));
    assert!(matches!(
        m.create::<Attendance>(AttendanceDraft {
            class_id: Some(s.class_a),
            student_id: Some(s.ada),
            date: "2024-02-01".into(),
            present: false,
        }),
        Err(StoreError::UniquenessViolation { .. })
    ));
    m.create::<Attendance>(AttendanceDraft {
        class_id: Some(s.class_a),
        student_id: Some(s.ada),
        date: "2024-02-02".into(),
        present: false,
    })
    .expect("next day");
    assert!(matches!(
        m.create::<Student>(StudentDraft {
            name: "Ada Byron".into(),
            age: None,
            gender: None,
            phone: None,
            email: "ADA@X.COM".into(),
        }),
        Err(StoreError::UniquenessViolation { field: "email", .. })
    ));
}

#[test]
fn missing_rows_are_not_found() {
    let conn = db::open_in_memory().expect("db");
    let m = EntityLifecycleManager::new(&conn, StoreConfig::default());
    let s = seed(&m);

    assert!(matches!(
        m.get::<Course>(s.algebra + 50),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        m.delete_kind(EntityKind::Exam, 404),
        Err(StoreError::NotFound {
            entity: EntityKind::Exam,
            id: 404
        })
    ));
    m.delete::<Student>(s.grace).expect("first delete");
    assert!(matches!(
        m.delete::<Student>(s.grace),
        Err(StoreError::NotFound { .. })
    ));
}
