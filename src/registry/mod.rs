// ============================================================================
// Student / College / Course Registry
// ============================================================================
//
// The guarded operations over the five registry tables:
// - validator: existence checks, one typed lookup per key kind
// - entities / relations: mutations, each gated by the validator
// - reports: read-only listings and aggregates
// - session: the caller-controlled unit of work that exposes all of them
//
// Everything here talks to the store only through `StoreGateway`.
//
// ============================================================================

pub mod entities;
pub mod model;
pub mod outcome;
pub mod relations;
pub mod reports;
pub mod schema;
pub mod session;
pub mod statements;
pub mod validator;

pub use model::{
    College, CollegeAverageAge, CollegeChoice, CollegeHeadcount, CollegeId, CollegeUpdate,
    Course, CourseId, CourseUpdate, EnrollmentPolicy, NewCollege, NewCourse, NewStudent, Student,
    StudentId, StudentUpdate,
};
pub use outcome::{Advisory, Lookup, Outcome, Rejection};
pub use schema::{connect, provision};
pub use session::{Session, SessionError, SessionResult, SessionState};
