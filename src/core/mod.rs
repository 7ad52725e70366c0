pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{Column, ForeignKey, OnDelete, Row, Schema};
pub use value::{DataType, Value};
