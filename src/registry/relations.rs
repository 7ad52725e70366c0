// ============================================================================
// Relationship Operations
// ============================================================================
//
// Offerings (College <-> Course) and enrollments (Student <-> Course).
// Both endpoints must exist; whether the student's college offers the course
// is only advisory unless the policy is strict.
//
// ============================================================================

use super::model::{CollegeId, CourseId, EnrollmentPolicy, StudentId};
use super::outcome::{Advisory, Outcome, Rejection};
use super::statements::{DELETE_ENROLLMENT, DELETE_OFFERING, INSERT_ENROLLMENT, INSERT_OFFERING};
use super::validator;
use crate::core::Result;
use crate::interface::StoreGateway;
use tracing::warn;

/// Hard preconditions shared by both offering operations
async fn offering_endpoints<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
    course: CourseId,
) -> Result<Option<Rejection>> {
    if !validator::college_exists(gateway, college).await? {
        return Ok(Some(Rejection::CollegeNotFound));
    }
    if !validator::course_exists(gateway, course).await? {
        return Ok(Some(Rejection::CourseNotFound));
    }
    Ok(None)
}

async fn enrollment_endpoints<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    course: CourseId,
) -> Result<Option<Rejection>> {
    if !validator::student_exists(gateway, student).await? {
        return Ok(Some(Rejection::StudentNotFound));
    }
    if !validator::course_exists(gateway, course).await? {
        return Ok(Some(Rejection::CourseNotFound));
    }
    Ok(None)
}

pub async fn offer_course_at_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
    course: CourseId,
) -> Result<Outcome> {
    if let Some(reason) = offering_endpoints(gateway, college, course).await? {
        return Ok(reason.into());
    }
    if validator::offering_exists(gateway, college, course).await? {
        return Ok(Rejection::OfferingExists.into());
    }
    gateway
        .execute(&INSERT_OFFERING, &[college.into(), course.into()])
        .await?;
    Ok(Outcome::succeeded())
}

pub async fn withdraw_course_from_college<G: StoreGateway + ?Sized>(
    gateway: &G,
    college: CollegeId,
    course: CourseId,
) -> Result<Outcome> {
    if let Some(reason) = offering_endpoints(gateway, college, course).await? {
        return Ok(reason.into());
    }
    let removed = gateway
        .execute(&DELETE_OFFERING, &[college.into(), course.into()])
        .await?;
    if removed == 0 {
        return Ok(Rejection::OfferingNotFound.into());
    }
    Ok(Outcome::succeeded())
}

pub async fn enroll_student_in_course<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    course: CourseId,
    policy: EnrollmentPolicy,
) -> Result<Outcome> {
    if let Some(reason) = enrollment_endpoints(gateway, student, course).await? {
        return Ok(reason.into());
    }

    let mut warnings = Vec::new();
    if !validator::course_offered_by_choice(gateway, student, course).await? {
        match policy {
            EnrollmentPolicy::Strict => return Ok(Rejection::CourseNotOffered.into()),
            EnrollmentPolicy::Advisory => {
                warn!(%student, %course, "course not offered by the student's college");
                warnings.push(Advisory::CourseNotOfferedByChoice);
            }
        }
    }

    if validator::enrollment_exists(gateway, student, course).await? {
        return Ok(Rejection::EnrollmentExists.into());
    }
    gateway
        .execute(&INSERT_ENROLLMENT, &[student.into(), course.into()])
        .await?;
    Ok(Outcome::Succeeded { warnings })
}

pub async fn unenroll_student_from_course<G: StoreGateway + ?Sized>(
    gateway: &G,
    student: StudentId,
    course: CourseId,
) -> Result<Outcome> {
    if let Some(reason) = enrollment_endpoints(gateway, student, course).await? {
        return Ok(reason.into());
    }
    let removed = gateway
        .execute(&DELETE_ENROLLMENT, &[student.into(), course.into()])
        .await?;
    if removed == 0 {
        return Ok(Rejection::EnrollmentNotFound.into());
    }
    Ok(Outcome::succeeded())
}
