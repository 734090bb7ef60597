//! Entity catalogue and the delete dependency table.
//!
//! Every delete goes through [`delete_rule`]: the parent's policy decides
//! whether referencing rows are removed with it or block the delete.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Department,
    Course,
    Teacher,
    Student,
    Timetable,
    Exam,
    Grade,
    Registration,
    Class,
    Enrollment,
    Attendance,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Department,
        EntityKind::Course,
        EntityKind::Teacher,
        EntityKind::Student,
        EntityKind::Timetable,
        EntityKind::Exam,
        EntityKind::Grade,
        EntityKind::Registration,
        EntityKind::Class,
        EntityKind::Enrollment,
        EntityKind::Attendance,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Department => "departments",
            EntityKind::Course => "courses",
            EntityKind::Teacher => "teachers",
            EntityKind::Student => "students",
            EntityKind::Timetable => "timetable",
            EntityKind::Exam => "exams",
            EntityKind::Grade => "grades",
            EntityKind::Registration => "registrations",
            EntityKind::Class => "classes",
            EntityKind::Enrollment => "enrollments",
            EntityKind::Attendance => "attendance",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Department => "department",
            EntityKind::Course => "course",
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::Timetable => "timetable",
            EntityKind::Exam => "exam",
            EntityKind::Grade => "grade",
            EntityKind::Registration => "registration",
            EntityKind::Class => "class",
            EntityKind::Enrollment => "enrollment",
            EntityKind::Attendance => "attendance",
        }
    }

    /// Resolves a sidecar method prefix (`students` in `students.list`).
    /// Method prefixes are the table names.
    pub fn from_table(table: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|k| k.table() == table)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Referencing rows are deleted first, then the row itself.
    Cascade,
    /// Any referencing row rejects the delete.
    Restrict,
    /// Nothing references this entity.
    Leaf,
}

/// A foreign-key column in `child` pointing at the parent's `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub child: EntityKind,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteRule {
    pub parent: EntityKind,
    pub policy: DeletePolicy,
    pub references: &'static [Reference],
}

const fn r(child: EntityKind, column: &'static str) -> Reference {
    Reference { child, column }
}

pub const DEPENDENCIES: &[DeleteRule] = &[
    DeleteRule {
        parent: EntityKind::Student,
        policy: DeletePolicy::Cascade,
        references: &[
            r(EntityKind::Registration, "student_id"),
            r(EntityKind::Grade, "student_id"),
            r(EntityKind::Enrollment, "student_id"),
            r(EntityKind::Attendance, "student_id"),
        ],
    },
    DeleteRule {
        parent: EntityKind::Course,
        policy: DeletePolicy::Cascade,
        references: &[
            r(EntityKind::Timetable, "course_id"),
            r(EntityKind::Exam, "course_id"),
            r(EntityKind::Grade, "course_id"),
            r(EntityKind::Registration, "course_id"),
            r(EntityKind::Class, "course_id"),
        ],
    },
    DeleteRule {
        parent: EntityKind::Class,
        policy: DeletePolicy::Cascade,
        references: &[
            r(EntityKind::Enrollment, "class_id"),
            r(EntityKind::Attendance, "class_id"),
        ],
    },
    DeleteRule {
        parent: EntityKind::Teacher,
        policy: DeletePolicy::Restrict,
        references: &[
            r(EntityKind::Class, "teacher_id"),
            r(EntityKind::Registration, "teacher_id"),
        ],
    },
    DeleteRule {
        parent: EntityKind::Department,
        policy: DeletePolicy::Restrict,
        references: &[r(EntityKind::Course, "department_id")],
    },
];

const LEAF: DeleteRule = DeleteRule {
    parent: EntityKind::Attendance,
    policy: DeletePolicy::Leaf,
    references: &[],
};

pub fn delete_rule(kind: EntityKind) -> DeleteRule {
    DEPENDENCIES
        .iter()
        .find(|rule| rule.parent == kind)
        .copied()
        .unwrap_or(DeleteRule {
            parent: kind,
            ..LEAF
        })
}

/// Every (child, column) pair that points at `kind`, regardless of policy.
pub fn referencing(kind: EntityKind) -> &'static [Reference] {
    delete_rule(kind).references
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn each_parent_has_one_rule() {
        let mut seen = HashSet::new();
        for rule in DEPENDENCIES {
            assert!(seen.insert(rule.parent), "duplicate rule for {}", rule.parent);
            assert_ne!(rule.policy, DeletePolicy::Leaf);
            assert!(!rule.references.is_empty());
        }
    }

    #[test]
    fn cascade_graph_has_no_cycles() {
        fn walk(kind: EntityKind, path: &mut Vec<EntityKind>) {
            assert!(!path.contains(&kind), "cycle through {:?}", path);
            path.push(kind);
            for reference in referencing(kind) {
                walk(reference.child, path);
            }
            path.pop();
        }
        for kind in EntityKind::ALL {
            walk(kind, &mut Vec::new());
        }
    }

    #[test]
    fn student_cascade_covers_all_dependents() {
        let rule = delete_rule(EntityKind::Student);
        assert_eq!(rule.policy, DeletePolicy::Cascade);
        let children: Vec<_> = rule.references.iter().map(|r| r.child).collect();
        assert_eq!(
            children,
            vec![
                EntityKind::Registration,
                EntityKind::Grade,
                EntityKind::Enrollment,
                EntityKind::Attendance
            ]
        );
    }

    #[test]
    fn unlisted_entities_are_leaves() {
        let rule = delete_rule(EntityKind::Grade);
        assert_eq!(rule.parent, EntityKind::Grade);
        assert_eq!(rule.policy, DeletePolicy::Leaf);
        assert_eq!(delete_rule(EntityKind::Teacher).policy, DeletePolicy::Restrict);
    }

    #[test]
    fn references_name_real_columns() {
        let conn = crate::db::open_in_memory().expect("db");
        for rule in DEPENDENCIES {
            for reference in rule.references {
                let table = reference.child.table();
                assert!(
                    crate::db::table_has_column(&conn, table, reference.column).expect("pragma"),
                    "{}.{} missing",
                    table,
                    reference.column
                );
            }
        }
    }

    #[test]
    fn method_prefixes_resolve() {
        assert_eq!(EntityKind::from_table("timetable"), Some(EntityKind::Timetable));
        assert_eq!(EntityKind::from_table("students"), Some(EntityKind::Student));
        assert_eq!(EntityKind::from_table("student"), None);
    }
}
