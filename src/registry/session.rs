// ============================================================================
// Registry Session
// ============================================================================
//
// One long-lived unit of work over one gateway. The caller decides where
// commit and rollback points go; operations never commit on their own.
//
// ```text
// Open ──commit──> Committed ──next write──> Open
//   │                                         ▲
//   └──rollback──> RolledBack ──next write────┘
//
// any state ──store fault in a write──> Terminated (rolled back, final)
// ```
//
// ============================================================================

use super::model::{
    College, CollegeAverageAge, CollegeChoice, CollegeHeadcount, CollegeId, CollegeUpdate,
    Course, CourseId, CourseUpdate, EnrollmentPolicy, NewCollege, NewCourse, NewStudent,
    Student, StudentId, StudentUpdate,
};
use super::outcome::{Lookup, Outcome};
use super::{entities, relations, reports};
use crate::core::{DbError, Result};
use crate::interface::StoreGateway;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Writes are accumulating in the pending transaction
    Open,
    /// The last boundary was a commit and nothing has been written since
    Committed,
    /// The last boundary was a rollback and nothing has been written since
    RolledBack,
    /// A store fault ended the session; everything uncommitted was discarded
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Open => write!(f, "OPEN"),
            SessionState::Committed => write!(f, "COMMITTED"),
            SessionState::RolledBack => write!(f, "ROLLED BACK"),
            SessionState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// A write or transaction boundary hit a store fault. The pending
    /// transaction has been rolled back and the session is over.
    #[error("store fault, session rolled back and terminated: {0}")]
    Fatal(#[source] DbError),

    /// A read failed; nothing was rolled back
    #[error("query failed: {0}")]
    Query(#[source] DbError),

    #[error("session has been terminated")]
    Terminated,
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Fatal(_) | SessionError::Terminated)
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

pub struct Session<G: StoreGateway> {
    id: Uuid,
    gateway: G,
    state: SessionState,
    policy: EnrollmentPolicy,
}

impl<G: StoreGateway> Session<G> {
    /// Open the session's first transaction on `gateway`
    pub async fn start(gateway: G) -> SessionResult<Self> {
        Self::start_with_policy(gateway, EnrollmentPolicy::default()).await
    }

    pub async fn start_with_policy(mut gateway: G, policy: EnrollmentPolicy) -> SessionResult<Self> {
        gateway.begin().await.map_err(SessionError::Fatal)?;
        let id = Uuid::new_v4();
        info!(session = %id, %policy, "session started");
        Ok(Self {
            id,
            gateway,
            state: SessionState::Open,
            policy,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> EnrollmentPolicy {
        self.policy
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    // ========================================================================
    // Transaction boundaries
    // ========================================================================

    /// Make every write since the last boundary durable and open a new
    /// transaction for what follows.
    pub async fn commit(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        if let Err(err) = self.gateway.commit().await {
            return Err(self.abort(err).await);
        }
        if let Err(err) = self.gateway.begin().await {
            return Err(self.abort(err).await);
        }
        self.state = SessionState::Committed;
        info!(session = %self.id, "committed");
        Ok(())
    }

    /// Discard every write since the last boundary
    pub async fn rollback(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        if let Err(err) = self.gateway.rollback().await {
            return Err(self.abort(err).await);
        }
        if let Err(err) = self.gateway.begin().await {
            return Err(self.abort(err).await);
        }
        self.state = SessionState::RolledBack;
        info!(session = %self.id, "rolled back to last commit");
        Ok(())
    }

    /// End the session, discarding uncommitted writes, and hand back the gateway
    pub async fn finish(mut self) -> SessionResult<G> {
        if self.state != SessionState::Terminated && self.gateway.in_transaction() {
            self.gateway.rollback().await.map_err(SessionError::Fatal)?;
        }
        debug!(session = %self.id, "session finished");
        Ok(self.gateway)
    }

    fn ensure_live(&self) -> SessionResult<()> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::Terminated);
        }
        Ok(())
    }

    /// Route a write's result: outcomes pass through, faults end the session
    async fn settle(&mut self, result: Result<Outcome>) -> SessionResult<Outcome> {
        match result {
            Ok(outcome) => {
                if outcome.has_written() {
                    self.state = SessionState::Open;
                }
                Ok(outcome)
            }
            Err(err) => Err(self.abort(err).await),
        }
    }

    async fn abort(&mut self, err: DbError) -> SessionError {
        error!(session = %self.id, error = %err, "store fault, rolling back");
        if self.gateway.in_transaction() {
            if let Err(rollback_err) = self.gateway.rollback().await {
                warn!(session = %self.id, error = %rollback_err, "rollback after fault failed");
            }
        }
        self.state = SessionState::Terminated;
        SessionError::Fatal(err)
    }

    fn read<T>(&self, result: Result<T>) -> SessionResult<T> {
        result.map_err(|err| {
            warn!(session = %self.id, error = %err, "query failed");
            SessionError::Query(err)
        })
    }

    // ========================================================================
    // Entity operations
    // ========================================================================

    pub async fn add_student(&mut self, student: &NewStudent) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::add_student(&self.gateway, student).await;
        self.settle(result).await
    }

    pub async fn delete_student(&mut self, id: StudentId) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::delete_student(&self.gateway, id).await;
        self.settle(result).await
    }

    pub async fn update_student(
        &mut self,
        id: StudentId,
        changes: &StudentUpdate,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::update_student(&self.gateway, id, changes).await;
        self.settle(result).await
    }

    pub async fn set_college_choice(
        &mut self,
        student: StudentId,
        choice: CollegeChoice,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::set_college_choice(&self.gateway, student, choice).await;
        self.settle(result).await
    }

    pub async fn add_college(&mut self, college: &NewCollege) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::add_college(&self.gateway, college).await;
        self.settle(result).await
    }

    pub async fn delete_college(&mut self, id: CollegeId) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::delete_college(&self.gateway, id).await;
        self.settle(result).await
    }

    pub async fn update_college(
        &mut self,
        id: CollegeId,
        changes: &CollegeUpdate,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::update_college(&self.gateway, id, changes).await;
        self.settle(result).await
    }

    pub async fn add_college_then_assign_student(
        &mut self,
        college: &NewCollege,
        student: StudentId,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::add_college_then_assign_student(&self.gateway, college, student).await;
        self.settle(result).await
    }

    pub async fn add_course(&mut self, course: &NewCourse) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::add_course(&self.gateway, course).await;
        self.settle(result).await
    }

    pub async fn delete_course(&mut self, id: CourseId) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::delete_course(&self.gateway, id).await;
        self.settle(result).await
    }

    pub async fn update_course(
        &mut self,
        id: CourseId,
        changes: &CourseUpdate,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = entities::update_course(&self.gateway, id, changes).await;
        self.settle(result).await
    }

    // ========================================================================
    // Relationship operations
    // ========================================================================

    pub async fn offer_course_at_college(
        &mut self,
        college: CollegeId,
        course: CourseId,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = relations::offer_course_at_college(&self.gateway, college, course).await;
        self.settle(result).await
    }

    pub async fn withdraw_course_from_college(
        &mut self,
        college: CollegeId,
        course: CourseId,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = relations::withdraw_course_from_college(&self.gateway, college, course).await;
        self.settle(result).await
    }

    pub async fn enroll_student_in_course(
        &mut self,
        student: StudentId,
        course: CourseId,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result =
            relations::enroll_student_in_course(&self.gateway, student, course, self.policy).await;
        self.settle(result).await
    }

    pub async fn unenroll_student_from_course(
        &mut self,
        student: StudentId,
        course: CourseId,
    ) -> SessionResult<Outcome> {
        self.ensure_live()?;
        let result = relations::unenroll_student_from_course(&self.gateway, student, course).await;
        self.settle(result).await
    }

    // ========================================================================
    // Listings and reports
    // ========================================================================

    pub async fn list_students(&self) -> SessionResult<Vec<Student>> {
        self.ensure_live()?;
        self.read(reports::list_students(&self.gateway).await)
    }

    pub async fn list_colleges(&self) -> SessionResult<Vec<College>> {
        self.ensure_live()?;
        self.read(reports::list_colleges(&self.gateway).await)
    }

    pub async fn list_courses(&self) -> SessionResult<Vec<Course>> {
        self.ensure_live()?;
        self.read(reports::list_courses(&self.gateway).await)
    }

    pub async fn search_students_by_name(&self, fragment: &str) -> SessionResult<Vec<Student>> {
        self.ensure_live()?;
        self.read(reports::search_students_by_name(&self.gateway, fragment).await)
    }

    pub async fn students_of_college(
        &self,
        college: CollegeId,
    ) -> SessionResult<Lookup<Vec<Student>>> {
        self.ensure_live()?;
        self.read(reports::students_of_college(&self.gateway, college).await)
    }

    pub async fn courses_of_college(&self, college: CollegeId) -> SessionResult<Lookup<Vec<Course>>> {
        self.ensure_live()?;
        self.read(reports::courses_of_college(&self.gateway, college).await)
    }

    pub async fn courses_of_student(&self, student: StudentId) -> SessionResult<Lookup<Vec<Course>>> {
        self.ensure_live()?;
        self.read(reports::courses_of_student(&self.gateway, student).await)
    }

    pub async fn students_per_college(&self) -> SessionResult<Vec<CollegeHeadcount>> {
        self.ensure_live()?;
        self.read(reports::students_per_college(&self.gateway).await)
    }

    pub async fn average_age_per_college(&self) -> SessionResult<Vec<CollegeAverageAge>> {
        self.ensure_live()?;
        self.read(reports::average_age_per_college(&self.gateway).await)
    }
}
