//! Test execution seam.
//!
//! The workflow hands every test case, together with its table context, to a
//! [`TestExecutor`]. [`ValidatorRegistry`] is the executor shipped with the
//! binary; it evaluates test definitions against the profile stored on the
//! table.

pub mod validators;

use crate::context::TableContext;
use async_trait::async_trait;
use catalog::{TestCase, TestCaseResult};
use thiserror::Error;

pub use validators::{Validator, ValidatorRegistry};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Test case {test_case} references no test definition")]
    MissingDefinition { test_case: String },

    #[error("Unknown test definition: {name}")]
    UnknownDefinition { name: String },

    #[error("Missing parameter {parameter} for test case {test_case}")]
    MissingParameter {
        test_case: String,
        parameter: String,
    },

    #[error("Invalid value {value:?} for parameter {parameter} of test case {test_case}")]
    InvalidParameter {
        test_case: String,
        parameter: String,
        value: String,
    },

    #[error("Test case {test_case} does not target a column")]
    MissingColumn { test_case: String },

    #[error("Column {column} not found on table {table}")]
    ColumnNotFound { table: String, column: String },

    #[error("No profile available for {target}")]
    MissingProfile { target: String },

    #[error("Execution failed: {message}")]
    Failed { message: String },
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Evaluate one test case. `Ok(None)` means there is nothing to report.
    async fn run(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<Option<TestCaseResult>>;

    fn executor_name(&self) -> &str;
}
