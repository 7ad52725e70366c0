//! Results of registry operations that reached the store without a fault.

use std::fmt;

/// Why an operation declined to mutate anything. Expected, user-facing, and
/// never a reason to roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StudentExists,
    StudentNotFound,
    CollegeExists,
    CollegeNotFound,
    CourseExists,
    CourseNotFound,
    OfferingExists,
    OfferingNotFound,
    EnrollmentExists,
    EnrollmentNotFound,
    NoUpdatesProvided,
    /// Strict enrollment policy only
    CourseNotOffered,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::StudentExists => "Student ID already exists.",
            Self::StudentNotFound => "Student not found.",
            Self::CollegeExists => "College ID already exists.",
            Self::CollegeNotFound => "College not found.",
            Self::CourseExists => "Course ID already exists.",
            Self::CourseNotFound => "Course not found.",
            Self::OfferingExists => "Course already added to college.",
            Self::OfferingNotFound => "Association not found.",
            Self::EnrollmentExists => "Student already enrolled in course.",
            Self::EnrollmentNotFound => "Enrollment not found.",
            Self::NoUpdatesProvided => "No updates provided.",
            Self::CourseNotOffered => "Course is not offered by student's college.",
        };
        f.write_str(message)
    }
}

/// Informational note attached to a successful operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    CourseNotOfferedByChoice,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CourseNotOfferedByChoice => {
                f.write_str("Warning: Course may not be offered by student's college.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { warnings: Vec<Advisory> },
    Rejected(Rejection),
    /// A multi-step operation wrote its first step, then declined the rest.
    /// The write stays pending like any other.
    PartiallyApplied(Rejection),
}

impl Outcome {
    pub fn succeeded() -> Self {
        Outcome::Succeeded {
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    /// True when the store was mutated, fully or in part
    pub fn has_written(&self) -> bool {
        !matches!(self, Outcome::Rejected(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Outcome::Rejected(reason) | Outcome::PartiallyApplied(reason) => Some(*reason),
            Outcome::Succeeded { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[Advisory] {
        match self {
            Outcome::Succeeded { warnings } => warnings,
            Outcome::Rejected(_) | Outcome::PartiallyApplied(_) => &[],
        }
    }
}

impl From<Rejection> for Outcome {
    fn from(reason: Rejection) -> Self {
        Outcome::Rejected(reason)
    }
}

/// Result of a lookup scoped to one parent record, such as the courses of
/// a college: the parent may be absent, which is not a fault.
pub type Lookup<T> = Result<T, Rejection>;
