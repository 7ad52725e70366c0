//! Read-only listings and reports. No validation gate, except that the
//! per-record listings report a missing parent record.

use super::model::{
    College, CollegeAverageAge, CollegeHeadcount, CollegeId, Course, Student, StudentId,
};
use super::outcome::{Lookup, Rejection};
use super::statements::{
    ALL_COLLEGES, ALL_COURSES, ALL_STUDENTS, AVERAGE_AGE_PER_COLLEGE, COURSES_OF_COLLEGE,
    COURSES_OF_STUDENT, STUDENTS_BY_NAME, STUDENTS_OF_COLLEGE, STUDENTS_PER_COLLEGE,
};
use super::validator;
use crate::core::{Result, Value};
use crate::interface::StoreGateway;
use crate::statement::Statement;

async fn fetch<G, T>(
    gateway: &G,
    stmt: &Statement,
    args: &[Value],
    decode: fn(&[Value]) -> Result<T>,
) -> Result<Vec<T>>
where
    G: StoreGateway + ?Sized,
{
    let result = gateway.query(stmt, args).await?;
    result.rows().iter().map(|row| decode(row)).collect()
}

pub async fn list_students<G: StoreGateway + ?Sized>(gateway: &G) -> Result<Vec<Student>> {
    fetch(gateway, &ALL_STUDENTS, &[], Student::from_row).await
}

pub async fn list_colleges<G: StoreGateway + ?Sized>(gateway: &G) -> Result<Vec<College>> {
    fetch(gateway, &ALL_COLLEGES, &[], College::from_row).await
}

pub async fn list_courses<G: StoreGateway + ?Sized>(gateway: &G) -> Result<Vec<Course>> {
    fetch(gateway, &ALL_COURSES, &[], Course::from_row).await
}

/// Case-sensitive substring match on the student name
pub async fn search_students_by_name<G: StoreGateway + ?Sized>(
    gateway: &G,
    fragment: &str,
) -> Result<Vec<Student>> {
    fetch(gateway, &STUDENTS_BY_NAME, &[fragment.into()], Student::from_row).await
}

pub async fn students_of_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
) -> Result<Lookup<Vec<Student>>> {
    if !validator::college_exists(gateway, college).await? {
        return Ok(Err(Rejection::CollegeNotFound));
    }
    fetch(gateway, &STUDENTS_OF_COLLEGE, &[college.into()], Student::from_row)
        .await
        .map(Ok)
}

pub async fn courses_of_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
) -> Result<Lookup<Vec<Course>>> {
    if !validator::college_exists(gateway, college).await? {
        return Ok(Err(Rejection::CollegeNotFound));
    }
    fetch(gateway, &COURSES_OF_COLLEGE, &[college.into()], Course::from_row)
        .await
        .map(Ok)
}

pub async fn courses_of_student<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
) -> Result<Lookup<Vec<Course>>> {
    if !validator::student_exists(gateway, student).await? {
        return Ok(Err(Rejection::StudentNotFound));
    }
    fetch(gateway, &COURSES_OF_STUDENT, &[student.into()], Course::from_row)
        .await
        .map(Ok)
}

/// Students grouped by college choice; students without one are left out
pub async fn students_per_college<G: StoreGateway + ?Sized>(
    gateway: &G,
) -> Result<Vec<CollegeHeadcount>> {
    fetch(gateway, &STUDENTS_PER_COLLEGE, &[], CollegeHeadcount::from_row).await
}

pub async fn average_age_per_college<G: StoreGateway + ?Sized>(
    gateway: &G,
) -> Result<Vec<CollegeAverageAge>> {
    fetch(gateway, &AVERAGE_AGE_PER_COLLEGE, &[], CollegeAverageAge::from_row).await
}
