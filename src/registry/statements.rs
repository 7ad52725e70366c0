// ============================================================================
// Statement Catalogue
// ============================================================================
//
// Every statement the registry issues. All of them are fixed at startup;
// partial updates are assembled from fixed column names only.
//
// ============================================================================

use super::model::{CollegeUpdate, CourseUpdate, StudentUpdate};
use super::schema::{COLLEGE, COLLEGE_COURSES, COURSES, STUDENT, STUDENT_COURSES};
use crate::core::Value;
use crate::statement::{Aggregate, Delete, Insert, Predicate, Select, Statement, Update};
use lazy_static::lazy_static;

const STUDENT_COLUMNS: [&str; 4] = ["student_id", "student_name", "student_age", "college_id_choice"];
const COLLEGE_COLUMNS: [&str; 3] = ["college_id", "college_name", "college_fees"];
const COURSE_COLUMNS: [&str; 3] = ["course_id", "course_name", "course_duration"];

lazy_static! {
    // ---- existence lookups ------------------------------------------------
    pub static ref STUDENT_BY_ID: Statement = Select::from(STUDENT)
        .columns(&["student_id"])
        .filter(Predicate::eq("student_id", 0))
        .into();
    pub static ref COLLEGE_BY_ID: Statement = Select::from(COLLEGE)
        .columns(&["college_id"])
        .filter(Predicate::eq("college_id", 0))
        .into();
    pub static ref COURSE_BY_ID: Statement = Select::from(COURSES)
        .columns(&["course_id"])
        .filter(Predicate::eq("course_id", 0))
        .into();
    pub static ref OFFERING_BY_KEY: Statement = Select::from(COLLEGE_COURSES)
        .filter(Predicate::eq("college_id", 0).and(Predicate::eq("course_id", 1)))
        .into();
    pub static ref ENROLLMENT_BY_KEY: Statement = Select::from(STUDENT_COURSES)
        .filter(Predicate::eq("student_id", 0).and(Predicate::eq("course_id", 1)))
        .into();
    /// Rows only when the student's chosen college offers the course
    pub static ref OFFERED_BY_CHOICE: Statement = Select::from(STUDENT)
        .join(COLLEGE_COURSES, "Student.college_id_choice", "CollegeCourses.college_id")
        .columns(&["CollegeCourses.course_id"])
        .filter(
            Predicate::eq("Student.student_id", 0)
                .and(Predicate::eq("CollegeCourses.course_id", 1)),
        )
        .into();

    // ---- entity writes ----------------------------------------------------
    pub static ref INSERT_STUDENT: Statement = Insert::into(STUDENT, &STUDENT_COLUMNS).into();
    pub static ref INSERT_COLLEGE: Statement = Insert::into(COLLEGE, &COLLEGE_COLUMNS).into();
    pub static ref INSERT_COURSE: Statement = Insert::into(COURSES, &COURSE_COLUMNS).into();
    pub static ref DELETE_STUDENT: Statement = Delete::from(STUDENT)
        .filter(Predicate::eq("student_id", 0))
        .into();
    pub static ref DELETE_COLLEGE: Statement = Delete::from(COLLEGE)
        .filter(Predicate::eq("college_id", 0))
        .into();
    pub static ref DELETE_COURSE: Statement = Delete::from(COURSES)
        .filter(Predicate::eq("course_id", 0))
        .into();
    /// `$1` is the college id, or NULL to clear the choice
    pub static ref SET_COLLEGE_CHOICE: Statement = Update::table(STUDENT)
        .set("college_id_choice", 0)
        .filter(Predicate::eq("student_id", 1))
        .into();

    // ---- association writes -----------------------------------------------
    pub static ref INSERT_OFFERING: Statement =
        Insert::into(COLLEGE_COURSES, &["college_id", "course_id"]).into();
    pub static ref DELETE_OFFERING: Statement = Delete::from(COLLEGE_COURSES)
        .filter(Predicate::eq("college_id", 0).and(Predicate::eq("course_id", 1)))
        .into();
    pub static ref INSERT_ENROLLMENT: Statement =
        Insert::into(STUDENT_COURSES, &["student_id", "course_id"]).into();
    pub static ref DELETE_ENROLLMENT: Statement = Delete::from(STUDENT_COURSES)
        .filter(Predicate::eq("student_id", 0).and(Predicate::eq("course_id", 1)))
        .into();

    // ---- listings and reports ---------------------------------------------
    pub static ref ALL_STUDENTS: Statement = Select::from(STUDENT)
        .columns(&STUDENT_COLUMNS)
        .order_by("student_id")
        .into();
    pub static ref ALL_COLLEGES: Statement = Select::from(COLLEGE)
        .columns(&COLLEGE_COLUMNS)
        .order_by("college_id")
        .into();
    pub static ref ALL_COURSES: Statement = Select::from(COURSES)
        .columns(&COURSE_COLUMNS)
        .order_by("course_id")
        .into();
    pub static ref STUDENTS_BY_NAME: Statement = Select::from(STUDENT)
        .columns(&STUDENT_COLUMNS)
        .filter(Predicate::contains("student_name", 0))
        .order_by("student_id")
        .into();
    pub static ref STUDENTS_OF_COLLEGE: Statement = Select::from(STUDENT)
        .columns(&STUDENT_COLUMNS)
        .filter(Predicate::eq("college_id_choice", 0))
        .order_by("student_id")
        .into();
    pub static ref COURSES_OF_COLLEGE: Statement = Select::from(COLLEGE_COURSES)
        .join(COURSES, "CollegeCourses.course_id", "Courses.course_id")
        .columns(&["Courses.course_id", "Courses.course_name", "Courses.course_duration"])
        .filter(Predicate::eq("CollegeCourses.college_id", 0))
        .order_by("Courses.course_id")
        .into();
    pub static ref COURSES_OF_STUDENT: Statement = Select::from(STUDENT_COURSES)
        .join(COURSES, "StudentCourses.course_id", "Courses.course_id")
        .columns(&["Courses.course_id", "Courses.course_name", "Courses.course_duration"])
        .filter(Predicate::eq("StudentCourses.student_id", 0))
        .order_by("Courses.course_id")
        .into();
    pub static ref STUDENTS_PER_COLLEGE: Statement =
        Aggregate::count(STUDENT, "college_id_choice", "num_students")
            .filter(Predicate::is_not_null("college_id_choice"))
            .into();
    pub static ref AVERAGE_AGE_PER_COLLEGE: Statement =
        Aggregate::avg(STUDENT, "college_id_choice", "student_age", "avg_age")
            .filter(Predicate::is_not_null("college_id_choice"))
            .into();
}

/// Assemble `UPDATE table SET <supplied columns> WHERE key = $n`.
/// The key is always bound last.
fn partial_update(
    table: &str,
    key_column: &str,
    key: Value,
    fields: Vec<(&str, Option<Value>)>,
) -> (Statement, Vec<Value>) {
    let mut update = Update::table(table);
    let mut args = Vec::new();
    for (column, value) in fields {
        if let Some(value) = value {
            update = update.set(column, args.len());
            args.push(value);
        }
    }
    let update = update.filter(Predicate::eq(key_column, args.len()));
    args.push(key);
    (update.into(), args)
}

pub fn update_student(id: Value, changes: &StudentUpdate) -> (Statement, Vec<Value>) {
    partial_update(
        STUDENT,
        "student_id",
        id,
        vec![
            ("student_name", changes.name.clone().map(Value::from)),
            ("student_age", changes.age.map(Value::from)),
        ],
    )
}

pub fn update_college(id: Value, changes: &CollegeUpdate) -> (Statement, Vec<Value>) {
    partial_update(
        COLLEGE,
        "college_id",
        id,
        vec![
            ("college_name", changes.name.clone().map(Value::from)),
            ("college_fees", changes.fees.map(Value::from)),
        ],
    )
}

pub fn update_course(id: Value, changes: &CourseUpdate) -> (Statement, Vec<Value>) {
    partial_update(
        COURSES,
        "course_id",
        id,
        vec![
            ("course_name", changes.name.clone().map(Value::from)),
            ("course_duration", changes.duration.map(Value::from)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_binds_only_supplied_fields() {
        let (stmt, args) = update_student(
            Value::Integer(10),
            &StudentUpdate {
                name: None,
                age: Some(21),
            },
        );
        assert_eq!(
            stmt.to_string(),
            "UPDATE Student SET student_age = $1 WHERE student_id = $2"
        );
        assert_eq!(args, vec![Value::Integer(21), Value::Integer(10)]);
    }

    #[test]
    fn test_partial_update_with_both_fields() {
        let (stmt, args) = update_course(
            Value::Integer(5),
            &CourseUpdate {
                name: Some("CS102".into()),
                duration: Some(0),
            },
        );
        assert_eq!(
            stmt.to_string(),
            "UPDATE Courses SET course_name = $1, course_duration = $2 WHERE course_id = $3"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_catalogue_is_read_only_where_expected() {
        assert!(ALL_STUDENTS.is_read_only());
        assert!(AVERAGE_AGE_PER_COLLEGE.is_read_only());
        assert!(!SET_COLLEGE_CHOICE.is_read_only());
        assert_eq!(INSERT_ENROLLMENT.table(), STUDENT_COURSES);
    }
}
