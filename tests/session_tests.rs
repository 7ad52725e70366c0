use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use campusdb::registry::{College, Course, Student};
use campusdb::{
    CollegeId, Connection, CourseId, DbError, EnrollmentPolicy, Outcome, QueryResult, Rejection,
    Result, Session, SessionError, SessionState, Statement, StoreConfig, StoreGateway, StudentId,
    Value,
};

/// Passes everything through to a connection until told to fail
struct FaultyGateway {
    inner: Connection,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

#[async_trait]
impl StoreGateway for FaultyGateway {
    async fn execute(&self, stmt: &Statement, args: &[Value]) -> Result<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::ExecutionError("disk unplugged".into()));
        }
        self.inner.execute(stmt, args).await
    }

    async fn query(&self, stmt: &Statement, args: &[Value]) -> Result<QueryResult> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::ExecutionError("network timeout".into()));
        }
        self.inner.query(stmt, args).await
    }

    async fn begin(&mut self) -> Result<()> {
        self.inner.begin().await
    }

    async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.inner.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }
}

struct Switches {
    writes: Arc<AtomicBool>,
    reads: Arc<AtomicBool>,
}

async fn faulty_session() -> (Session<FaultyGateway>, Switches) {
    let inner = campusdb::registry::connect(&StoreConfig::in_memory())
        .await
        .unwrap();
    let switches = Switches {
        writes: Arc::new(AtomicBool::new(false)),
        reads: Arc::new(AtomicBool::new(false)),
    };
    let gateway = FaultyGateway {
        inner,
        fail_writes: switches.writes.clone(),
        fail_reads: switches.reads.clone(),
    };
    (Session::start(gateway).await.unwrap(), switches)
}

async fn session_with(policy: EnrollmentPolicy) -> Session<Connection> {
    let config = StoreConfig::in_memory().enrollment_policy(policy);
    campusdb::open_session(&config).await.unwrap()
}

async fn rows(conn: &Connection, table: &str) -> usize {
    conn.database().read().await.row_count(table).unwrap()
}

fn college(id: i64, name: &str) -> College {
    College {
        id: CollegeId(id),
        name: name.into(),
        fees: 1000,
    }
}

fn student(id: i64, choice: Option<i64>) -> Student {
    Student {
        id: StudentId(id),
        name: format!("S{}", id),
        age: 20,
        college_choice: choice.map(CollegeId),
    }
}

fn course(id: i64) -> Course {
    Course {
        id: CourseId(id),
        name: format!("C{}", id),
        duration: 3,
    }
}

#[tokio::test]
async fn test_state_follows_boundaries() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    assert_eq!(s.state(), SessionState::Open);

    s.add_college(&college(1, "Tech")).await.unwrap();
    s.commit().await.unwrap();
    assert_eq!(s.state(), SessionState::Committed);

    // rejected writes do not count as new work
    s.add_college(&college(1, "Tech")).await.unwrap();
    assert_eq!(s.state(), SessionState::Committed);

    s.add_course(&course(5)).await.unwrap();
    assert_eq!(s.state(), SessionState::Open);

    s.rollback().await.unwrap();
    assert_eq!(s.state(), SessionState::RolledBack);
    assert!(s.gateway().in_transaction());
}

#[tokio::test]
async fn test_rollback_restores_last_commit() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.commit().await.unwrap();

    s.add_college(&college(2, "Arts")).await.unwrap();
    s.add_student(&student(10, Some(2))).await.unwrap();
    s.add_course(&course(5)).await.unwrap();
    s.offer_course_at_college(CollegeId(2), CourseId(5)).await.unwrap();
    s.rollback().await.unwrap();

    let colleges = s.list_colleges().await.unwrap();
    assert_eq!(colleges, vec![college(1, "Tech")]);
    assert!(s.list_students().await.unwrap().is_empty());
    assert!(s.list_courses().await.unwrap().is_empty());
    assert_eq!(rows(s.gateway(), "CollegeCourses").await, 0);
}

#[tokio::test]
async fn test_rollback_undoes_updates_and_deletes() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.add_student(&student(10, Some(1))).await.unwrap();
    s.commit().await.unwrap();

    s.delete_college(CollegeId(1)).await.unwrap();
    assert_eq!(s.list_students().await.unwrap()[0].college_choice, None);
    s.rollback().await.unwrap();

    assert_eq!(s.list_colleges().await.unwrap().len(), 1);
    assert_eq!(
        s.list_students().await.unwrap()[0].college_choice,
        Some(CollegeId(1))
    );
}

#[tokio::test]
async fn test_write_fault_rolls_back_and_terminates() {
    let (mut s, switches) = faulty_session().await;
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.commit().await.unwrap();
    s.add_course(&course(5)).await.unwrap();

    switches.writes.store(true, Ordering::SeqCst);
    let err = s.add_course(&course(6)).await.unwrap_err();
    assert!(matches!(err, SessionError::Fatal(DbError::ExecutionError(_))));
    assert!(err.is_fatal());
    assert_eq!(s.state(), SessionState::Terminated);

    // the pending course 5 went with the rollback, the committed college stayed
    let conn = &s.gateway().inner;
    assert!(!conn.is_in_transaction());
    assert_eq!(rows(conn, "Courses").await, 0);
    assert_eq!(rows(conn, "College").await, 1);

    switches.writes.store(false, Ordering::SeqCst);
    assert!(matches!(
        s.add_course(&course(7)).await,
        Err(SessionError::Terminated)
    ));
    assert!(matches!(s.list_courses().await, Err(SessionError::Terminated)));
    assert!(matches!(s.commit().await, Err(SessionError::Terminated)));
}

#[tokio::test]
async fn test_read_fault_keeps_pending_work() {
    let (mut s, switches) = faulty_session().await;
    s.add_course(&course(5)).await.unwrap();

    switches.reads.store(true, Ordering::SeqCst);
    let err = s.list_courses().await.unwrap_err();
    assert!(matches!(err, SessionError::Query(_)));
    assert!(!err.is_fatal());
    assert_eq!(s.state(), SessionState::Open);

    switches.reads.store(false, Ordering::SeqCst);
    s.commit().await.unwrap();
    assert_eq!(s.list_courses().await.unwrap(), vec![course(5)]);
}

#[tokio::test]
async fn test_finish_discards_uncommitted_work() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    s.add_course(&course(5)).await.unwrap();
    s.commit().await.unwrap();
    s.add_course(&course(6)).await.unwrap();

    let conn = s.finish().await.unwrap();
    assert!(!conn.is_in_transaction());
    assert_eq!(rows(&conn, "Courses").await, 1);
}

#[tokio::test]
async fn test_strict_policy_refuses_unoffered_course() {
    let mut s = session_with(EnrollmentPolicy::Strict).await;
    assert_eq!(s.policy(), EnrollmentPolicy::Strict);
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.add_student(&student(10, Some(1))).await.unwrap();
    s.add_student(&student(11, None)).await.unwrap();
    s.add_course(&course(5)).await.unwrap();
    s.add_course(&course(6)).await.unwrap();
    s.offer_course_at_college(CollegeId(1), CourseId(5)).await.unwrap();

    let outcome = s
        .enroll_student_in_course(StudentId(10), CourseId(5))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(outcome.warnings().is_empty());

    assert_eq!(
        s.enroll_student_in_course(StudentId(10), CourseId(6))
            .await
            .unwrap()
            .rejection(),
        Some(Rejection::CourseNotOffered)
    );
    assert_eq!(
        s.enroll_student_in_course(StudentId(11), CourseId(5))
            .await
            .unwrap()
            .rejection(),
        Some(Rejection::CourseNotOffered)
    );
    assert_eq!(rows(s.gateway(), "StudentCourses").await, 1);
}

#[tokio::test]
async fn test_add_college_then_assign_student() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.add_student(&student(10, Some(1))).await.unwrap();

    let outcome = s
        .add_college_then_assign_student(&college(2, "Arts"), StudentId(10))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        s.list_students().await.unwrap()[0].college_choice,
        Some(CollegeId(2))
    );

    // an existing college stops before the student is touched
    let outcome = s
        .add_college_then_assign_student(&college(1, "Tech"), StudentId(10))
        .await
        .unwrap();
    assert_eq!(outcome.rejection(), Some(Rejection::CollegeExists));
    assert_eq!(
        s.list_students().await.unwrap()[0].college_choice,
        Some(CollegeId(2))
    );

    // a missing student is reported, the new college stays pending
    let outcome = s
        .add_college_then_assign_student(&college(3, "Law"), StudentId(99))
        .await
        .unwrap();
    assert_eq!(outcome.rejection(), Some(Rejection::StudentNotFound));
    assert_eq!(s.list_colleges().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_partial_composite_reopens_committed_session() {
    let mut s = session_with(EnrollmentPolicy::Advisory).await;
    s.add_college(&college(1, "Tech")).await.unwrap();
    s.commit().await.unwrap();
    assert_eq!(s.state(), SessionState::Committed);

    let outcome = s
        .add_college_then_assign_student(&college(3, "Law"), StudentId(99))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::PartiallyApplied(Rejection::StudentNotFound));
    assert!(outcome.has_written());
    assert!(!outcome.is_success());
    assert_eq!(s.state(), SessionState::Open);

    // the pending college is real uncommitted work
    s.rollback().await.unwrap();
    assert_eq!(s.list_colleges().await.unwrap(), vec![college(1, "Tech")]);

    // an existing college writes nothing and leaves the state alone
    let outcome = s
        .add_college_then_assign_student(&college(1, "Tech"), StudentId(99))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Rejected(Rejection::CollegeExists));
    assert_eq!(s.state(), SessionState::RolledBack);
}

#[tokio::test]
async fn test_sessions_have_distinct_ids() {
    let a = session_with(EnrollmentPolicy::Advisory).await;
    let b = session_with(EnrollmentPolicy::Advisory).await;
    assert_ne!(a.id(), b.id());
}
