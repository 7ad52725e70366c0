//! Existence checks run before every mutation. One typed lookup per key
//! kind, each a fixed parameterized statement.

use super::model::{CollegeId, CourseId, StudentId};
use super::statements::{
    COLLEGE_BY_ID, COURSE_BY_ID, ENROLLMENT_BY_KEY, OFFERED_BY_CHOICE, OFFERING_BY_KEY,
    STUDENT_BY_ID,
};
use crate::core::{Result, Value};
use crate::interface::StoreGateway;
use crate::statement::Statement;

async fn any_row<G: StoreGateway + ?Sized>(
    gateway: &G,
    stmt: &Statement,
    args: &[Value],
) -> Result<bool> {
    Ok(!gateway.query(stmt, args).await?.is_empty())
}

pub async fn student_exists<G: StoreGateway + ?Sized>(gateway: &G, id: StudentId) -> Result<bool> {
    any_row(gateway, &STUDENT_BY_ID, &[id.into()]).await
}

pub async fn college_exists<G: StoreGateway + ?Sized>(gateway: &G, id: CollegeId) -> Result<bool> {
    any_row(gateway, &COLLEGE_BY_ID, &[id.into()]).await
}

pub async fn course_exists<G: StoreGateway + ?Sized>(gateway: &G, id: CourseId) -> Result<bool> {
    any_row(gateway, &COURSE_BY_ID, &[id.into()]).await
}

pub async fn offering_exists<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
    course: CourseId,
) -> Result<bool> {
    any_row(gateway, &OFFERING_BY_KEY, &[college.into(), course.into()]).await
}

pub async fn enrollment_exists<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    course: CourseId,
) -> Result<bool> {
    any_row(gateway, &ENROLLMENT_BY_KEY, &[student.into(), course.into()]).await
}

/// False as well when the student has no college choice
pub async fn course_offered_by_choice<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    course: CourseId,
) -> Result<bool> {
    any_row(gateway, &OFFERED_BY_CHOICE, &[student.into(), course.into()]).await
}
