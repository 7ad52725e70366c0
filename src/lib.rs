// ============================================================================
// CampusDB Library
// ============================================================================
//
// A student / college / course registry over a small transactional
// in-memory relational store with optional write-ahead logging.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod facade;
pub mod interface;
pub mod registry;
pub mod statement;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use connection::{Connection, StoreConfig};
pub use crate::core::{DataType, DbError, Result, Value};
pub use facade::Database;
pub use interface::StoreGateway;
pub use statement::{QueryResult, Statement};
pub use storage::DurabilityMode;

pub use registry::{
    Advisory, CollegeChoice, CollegeId, CourseId, EnrollmentPolicy, Outcome, Rejection, Session,
    SessionError, SessionState, StudentId,
};

/// Open (or recover) a store from `config`, provision the registry tables and
/// start a session on a fresh connection to it.
///
/// # Examples
///
/// ```
/// use campusdb::registry::College;
/// use campusdb::{CollegeId, StoreConfig};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut session = campusdb::open_session(&StoreConfig::in_memory()).await.unwrap();
/// let tech = College { id: CollegeId(1), name: "Tech".into(), fees: 1000 };
/// assert!(session.add_college(&tech).await.unwrap().is_success());
/// session.commit().await.unwrap();
/// # });
/// ```
pub async fn open_session(
    config: &StoreConfig,
) -> std::result::Result<Session<Connection>, SessionError> {
    let conn = registry::connect(config)
        .await
        .map_err(SessionError::Fatal)?;
    Session::start_with_policy(conn, config.enrollment_policy).await
}
