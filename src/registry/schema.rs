// ============================================================================
// Registry Schema
// ============================================================================
//
// The five relations of the registry. Association rows cascade away with
// either endpoint; a student's college choice is cleared when the chosen
// college is deleted.
//
// ============================================================================

use crate::connection::{Connection, StoreConfig};
use crate::core::{Column, DataType, ForeignKey, OnDelete, Result};
use crate::facade::Database;
use crate::storage::TableSchema;
use tracing::info;

pub const STUDENT: &str = "Student";
pub const COLLEGE: &str = "College";
pub const COURSES: &str = "Courses";
pub const COLLEGE_COURSES: &str = "CollegeCourses";
pub const STUDENT_COURSES: &str = "StudentCourses";

/// Table definitions, parents before children
pub fn tables() -> Result<Vec<TableSchema>> {
    let college = TableSchema::new(
        COLLEGE,
        vec![
            Column::new("college_id", DataType::Integer),
            Column::new("college_name", DataType::Text).not_null(),
            Column::new("college_fees", DataType::Integer).not_null(),
        ],
    )
    .primary_key(&["college_id"])?;

    let courses = TableSchema::new(
        COURSES,
        vec![
            Column::new("course_id", DataType::Integer),
            Column::new("course_name", DataType::Text).not_null(),
            Column::new("course_duration", DataType::Integer).not_null(),
        ],
    )
    .primary_key(&["course_id"])?;

    let student = TableSchema::new(
        STUDENT,
        vec![
            Column::new("student_id", DataType::Integer),
            Column::new("student_name", DataType::Text).not_null(),
            Column::new("student_age", DataType::Integer).not_null(),
            Column::new("college_id_choice", DataType::Integer),
        ],
    )
    .primary_key(&["student_id"])?
    .foreign_key(
        ForeignKey::new("college_id_choice", COLLEGE, "college_id").on_delete(OnDelete::SetNull),
    )?;

    let college_courses = TableSchema::new(
        COLLEGE_COURSES,
        vec![
            Column::new("college_id", DataType::Integer),
            Column::new("course_id", DataType::Integer),
        ],
    )
    .primary_key(&["college_id", "course_id"])?
    .foreign_key(ForeignKey::new("college_id", COLLEGE, "college_id").on_delete(OnDelete::Cascade))?
    .foreign_key(ForeignKey::new("course_id", COURSES, "course_id").on_delete(OnDelete::Cascade))?;

    let student_courses = TableSchema::new(
        STUDENT_COURSES,
        vec![
            Column::new("student_id", DataType::Integer),
            Column::new("course_id", DataType::Integer),
        ],
    )
    .primary_key(&["student_id", "course_id"])?
    .foreign_key(ForeignKey::new("student_id", STUDENT, "student_id").on_delete(OnDelete::Cascade))?
    .foreign_key(ForeignKey::new("course_id", COURSES, "course_id").on_delete(OnDelete::Cascade))?;

    Ok(vec![college, courses, student, college_courses, student_courses])
}

/// Create whichever registry tables are missing. Returns how many were created.
pub fn provision(db: &mut Database) -> Result<usize> {
    let mut created = 0;
    for table in tables()? {
        if !db.table_exists(table.name()) {
            db.create_table(table)?;
            created += 1;
        }
    }
    if created > 0 {
        info!(created, "registry tables provisioned");
    }
    Ok(created)
}

/// Open a store, provision the registry tables and connect to it
pub async fn connect(config: &StoreConfig) -> Result<Connection> {
    let conn = Connection::open(config)?;
    provision(&mut *conn.database().write().await)?;
    Ok(conn)
}
