// ============================================================================
// Statements
// ============================================================================
//
// Prepared statement plans with positional parameters, their executor, and
// the tabular result they produce. Statement text is fixed at build time;
// caller data only ever arrives as bound `Value`s.
//
// ============================================================================

pub mod executor;
pub mod plan;
pub mod result;

pub use plan::{
    Aggregate, AggregateFunction, Delete, Insert, Join, Param, Predicate, Select, Statement,
    Update,
};
pub use result::QueryResult;
