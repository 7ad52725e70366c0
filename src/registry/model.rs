//! Domain records, their inputs and partial updates.

use crate::core::{DbError, Result, Value};
use std::fmt;
use std::str::FromStr;

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for Value {
            fn from(id: $name) -> Self {
                Value::Integer(id.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                $name(id)
            }
        }
    };
}

key_type!(
    /// Caller-supplied Student key
    StudentId
);
key_type!(
    /// Caller-supplied College key
    CollegeId
);
key_type!(
    /// Caller-supplied Course key
    CourseId
);

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub age: i64,
    pub college_choice: Option<CollegeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct College {
    pub id: CollegeId,
    pub name: String,
    pub fees: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub duration: i64,
}

pub type NewStudent = Student;
pub type NewCollege = College;
pub type NewCourse = Course;

/// Fields left as `None` keep their stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollegeUpdate {
    pub name: Option<String>,
    pub fees: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseUpdate {
    pub name: Option<String>,
    pub duration: Option<i64>,
}

impl StudentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none()
    }
}

impl CollegeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.fees.is_none()
    }
}

impl CourseUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.duration.is_none()
    }
}

/// Target of a college-choice write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollegeChoice {
    Set(CollegeId),
    /// Write a null reference; the college is not looked up
    Clear,
}

/// What enrolling a student in a course their chosen college does not
/// offer leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrollmentPolicy {
    /// Enroll anyway and attach an advisory
    #[default]
    Advisory,
    /// Refuse with `Rejection::CourseNotOffered`
    Strict,
}

impl fmt::Display for EnrollmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisory => write!(f, "advisory"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for EnrollmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "strict" => Ok(Self::Strict),
            other => Err(format!("Unknown enrollment policy '{}'", other)),
        }
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn int(row: &[Value], idx: usize) -> Result<i64> {
    match row.get(idx) {
        Some(Value::Integer(i)) => Ok(*i),
        other => Err(DbError::TypeMismatch(format!(
            "Expected INTEGER at position {}, got {}",
            idx,
            other.map(Value::type_name).unwrap_or("nothing")
        ))),
    }
}

fn opt_int(row: &[Value], idx: usize) -> Result<Option<i64>> {
    match row.get(idx) {
        Some(Value::Null) => Ok(None),
        _ => int(row, idx).map(Some),
    }
}

fn text(row: &[Value], idx: usize) -> Result<String> {
    match row.get(idx) {
        Some(Value::Text(s)) => Ok(s.clone()),
        other => Err(DbError::TypeMismatch(format!(
            "Expected TEXT at position {}, got {}",
            idx,
            other.map(Value::type_name).unwrap_or("nothing")
        ))),
    }
}

fn float(row: &[Value], idx: usize) -> Result<f64> {
    row.get(idx).and_then(Value::as_f64).ok_or_else(|| {
        DbError::TypeMismatch(format!("Expected a number at position {}", idx))
    })
}

impl Student {
    /// Decode `student_id, student_name, student_age, college_id_choice`
    pub fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            id: StudentId(int(row, 0)?),
            name: text(row, 1)?,
            age: int(row, 2)?,
            college_choice: opt_int(row, 3)?.map(CollegeId),
        })
    }
}

impl College {
    /// Decode `college_id, college_name, college_fees`
    pub fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            id: CollegeId(int(row, 0)?),
            name: text(row, 1)?,
            fees: int(row, 2)?,
        })
    }
}

impl Course {
    /// Decode `course_id, course_name, course_duration`
    pub fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            id: CourseId(int(row, 0)?),
            name: text(row, 1)?,
            duration: int(row, 2)?,
        })
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}, Name: {}, Age: {}, College: ", self.id, self.name, self.age)?;
        match self.college_choice {
            Some(college) => write!(f, "{}", college),
            None => write!(f, "null"),
        }
    }
}

impl fmt::Display for College {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}, Name: {}, Fees: {}", self.id, self.name, self.fees)
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}, Name: {}, Duration: {}", self.id, self.name, self.duration)
    }
}

/// One row of the students-per-college report
#[derive(Debug, Clone, PartialEq)]
pub struct CollegeHeadcount {
    pub college: CollegeId,
    pub students: i64,
}

/// One row of the average-age report
#[derive(Debug, Clone, PartialEq)]
pub struct CollegeAverageAge {
    pub college: CollegeId,
    pub avg_age: f64,
}

impl CollegeHeadcount {
    pub fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            college: CollegeId(int(row, 0)?),
            students: int(row, 1)?,
        })
    }
}

impl CollegeAverageAge {
    pub fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            college: CollegeId(int(row, 0)?),
            avg_age: float(row, 1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_from_row_with_null_choice() {
        let row = vec![
            Value::Integer(10),
            Value::Text("Amy".into()),
            Value::Integer(20),
            Value::Null,
        ];
        let student = Student::from_row(&row).unwrap();
        assert_eq!(student.id, StudentId(10));
        assert_eq!(student.college_choice, None);
        assert_eq!(student.to_string(), "ID: 10, Name: Amy, Age: 20, College: null");
    }

    #[test]
    fn test_from_row_rejects_wrong_types() {
        let row = vec![Value::Text("x".into()), Value::Text("Tech".into()), Value::Integer(1)];
        assert!(matches!(College::from_row(&row), Err(DbError::TypeMismatch(_))));
        assert!(Course::from_row(&[]).is_err());
    }

    #[test]
    fn test_update_emptiness() {
        assert!(StudentUpdate::default().is_empty());
        assert!(!CourseUpdate {
            duration: Some(0),
            ..Default::default()
        }
        .is_empty());
        assert!(!CollegeUpdate {
            name: Some(String::new()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("STRICT".parse::<EnrollmentPolicy>().unwrap(), EnrollmentPolicy::Strict);
        assert_eq!(EnrollmentPolicy::default().to_string(), "advisory");
        assert!("lenient".parse::<EnrollmentPolicy>().is_err());
    }
}
