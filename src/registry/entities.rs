// ============================================================================
// Entity Operations
// ============================================================================
//
// Add / update / delete for Student, College and Course, plus the student's
// college choice. Every write is preceded by the existence checks it needs;
// a failed check is a `Rejection`, a store failure is an `Err`.
//
// ============================================================================

use super::model::{
    CollegeChoice, CollegeId, CollegeUpdate, CourseId, CourseUpdate, NewCollege, NewCourse,
    NewStudent, StudentId, StudentUpdate,
};
use super::outcome::{Outcome, Rejection};
use super::statements::{self, DELETE_COLLEGE, DELETE_COURSE, DELETE_STUDENT};
use super::statements::{INSERT_COLLEGE, INSERT_COURSE, INSERT_STUDENT, SET_COLLEGE_CHOICE};
use super::validator;
use crate::core::{Result, Value};
use crate::interface::StoreGateway;
use tracing::debug;

// ----------------------------------------------------------------------------
// Student
// ----------------------------------------------------------------------------

pub async fn add_student<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: &NewStudent,
) -> Result<Outcome> {
    if validator::student_exists(gateway, student.id).await? {
        return Ok(Rejection::StudentExists.into());
    }
    if let Some(college) = student.college_choice {
        if !validator::college_exists(gateway, college).await? {
            return Ok(Rejection::CollegeNotFound.into());
        }
    }

    gateway
        .execute(
            &INSERT_STUDENT,
            &[
                student.id.into(),
                student.name.as_str().into(),
                student.age.into(),
                student.college_choice.into(),
            ],
        )
        .await?;
    debug!(student = %student.id, "student added");
    Ok(Outcome::succeeded())
}

pub async fn delete_student<G: StoreGateway + ?Sized>(gateway: &G, id: StudentId) -> Result<Outcome> {
    if !validator::student_exists(gateway, id).await? {
        return Ok(Rejection::StudentNotFound.into());
    }
    gateway.execute(&DELETE_STUDENT, &[id.into()]).await?;
    Ok(Outcome::succeeded())
}

pub async fn update_student<G: StoreGateway + ?Sized>(
    gateway: &G,
    id: StudentId,
    changes: &StudentUpdate,
) -> Result<Outcome> {
    if !validator::student_exists(gateway, id).await? {
        return Ok(Rejection::StudentNotFound.into());
    }
    if changes.is_empty() {
        return Ok(Rejection::NoUpdatesProvided.into());
    }
    let (stmt, args) = statements::update_student(id.into(), changes);
    gateway.execute(&stmt, &args).await?;
    Ok(Outcome::succeeded())
}

/// Point the student at a college, or clear the reference
pub async fn set_college_choice<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    choice: CollegeChoice,
) -> Result<Outcome> {
    if !validator::student_exists(gateway, student).await? {
        return Ok(Rejection::StudentNotFound.into());
    }
    let college = match choice {
        CollegeChoice::Set(college) => {
            if !validator::college_exists(gateway, college).await? {
                return Ok(Rejection::CollegeNotFound.into());
            }
            Value::from(college)
        }
        CollegeChoice::Clear => Value::Null,
    };

    gateway
        .execute(&SET_COLLEGE_CHOICE, &[college, student.into()])
        .await?;
    Ok(Outcome::succeeded())
}

// ----------------------------------------------------------------------------
// College
// ----------------------------------------------------------------------------

pub async fn add_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: &NewCollege,
) -> Result<Outcome> {
    if validator::college_exists(gateway, college.id).await? {
        return Ok(Rejection::CollegeExists.into());
    }
    gateway
        .execute(
            &INSERT_COLLEGE,
            &[
                college.id.into(),
                college.name.as_str().into(),
                college.fees.into(),
            ],
        )
        .await?;
    debug!(college = %college.id, "college added");
    Ok(Outcome::succeeded())
}

/// Offerings cascade; students who chose the college keep no choice
pub async fn delete_college<G: StoreGateway + ?Sized>(gateway: &G, id: CollegeId) -> Result<Outcome> {
    if !validator::college_exists(gateway, id).await? {
        return Ok(Rejection::CollegeNotFound.into());
    }
    gateway.execute(&DELETE_COLLEGE, &[id.into()]).await?;
    Ok(Outcome::succeeded())
}

pub async fn update_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    id: CollegeId,
    changes: &CollegeUpdate,
) -> Result<Outcome> {
    if !validator::college_exists(gateway, id).await? {
        return Ok(Rejection::CollegeNotFound.into());
    }
    if changes.is_empty() {
        return Ok(Rejection::NoUpdatesProvided.into());
    }
    let (stmt, args) = statements::update_college(id.into(), changes);
    gateway.execute(&stmt, &args).await?;
    Ok(Outcome::succeeded())
}

/// Add a college, then make it the student's choice.
///
/// The steps share the caller's transaction. An existing college id stops
/// here with `CollegeExists` and the student is left alone, where the old
/// console tool went on to reassign the student regardless. When the student
/// is missing the new college stays pending and the result is
/// `PartiallyApplied(StudentNotFound)`; only a rollback removes it.
pub async fn add_college_then_assign_student<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: &NewCollege,
    student: StudentId,
) -> Result<Outcome> {
    let added = add_college(gateway, college).await?;
    if !added.is_success() {
        return Ok(added);
    }
    if !validator::student_exists(gateway, student).await? {
        return Ok(Outcome::PartiallyApplied(Rejection::StudentNotFound));
    }

    gateway
        .execute(&SET_COLLEGE_CHOICE, &[college.id.into(), student.into()])
        .await?;
    Ok(Outcome::succeeded())
}

// ----------------------------------------------------------------------------
// Course
// ----------------------------------------------------------------------------

pub async fn add_course<G: StoreGateway + ?Sized>(gateway: &G, course: &NewCourse) -> Result<Outcome> {
    if validator::course_exists(gateway, course.id).await? {
        return Ok(Rejection::CourseExists.into());
    }
    gateway
        .execute(
            &INSERT_COURSE,
            &[
                course.id.into(),
                course.name.as_str().into(),
                course.duration.into(),
            ],
        )
        .await?;
    debug!(course = %course.id, "course added");
    Ok(Outcome::succeeded())
}

/// Offerings and enrollments of the course cascade
pub async fn delete_course<G: StoreGateway + ?Sized>(gateway: &G, id: CourseId) -> Result<Outcome> {
    if !validator::course_exists(gateway, id).await? {
        return Ok(Rejection::CourseNotFound.into());
    }
    gateway.execute(&DELETE_COURSE, &[id.into()]).await?;
    Ok(Outcome::succeeded())
}

pub async fn update_course<G: StoreGateway + ?Sized>(
    gateway: &G,
    id: CourseId,
    changes: &CourseUpdate,
) -> Result<Outcome> {
    if !validator::course_exists(gateway, id).await? {
        return Ok(Rejection::CourseNotFound.into());
    }
    if changes.is_empty() {
        return Ok(Rejection::NoUpdatesProvided.into());
    }
    let (stmt, args) = statements::update_course(id.into(), changes);
    gateway.execute(&stmt, &args).await?;
    Ok(Outcome::succeeded())
}
