//! Query generation, gatekeeping and execution.

pub mod executor;
pub mod generator;
pub mod validator;

pub use executor::{
    format_results, format_results_as_maps, ExecutionError, QueryExecutor, DEFAULT_MAX_ROWS,
};
pub use generator::QueryGenerator;
pub use validator::{clean_sql, sanitize, validate, ValidationError};
