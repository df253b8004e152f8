use super::{ExecutionError, ExecutionResult, TestExecutor};
use crate::context::TableContext;
use async_trait::async_trait;
use catalog::entity_link;
use catalog::{ColumnProfile, TableProfile, TestCase, TestCaseResult, TestCaseStatus, TestResultValue};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Evaluates one kind of test definition against stored profile data.
pub trait Validator: Send + Sync {
    /// Test definition name this validator handles.
    fn name(&self) -> &str;

    fn validate(&self, context: &TableContext, test_case: &TestCase)
        -> ExecutionResult<TestCaseResult>;
}

pub struct ValidatorRegistry {
    validators: HashMap<String, Box<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Registry with every built-in validator.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TableRowCountToBeBetween));
        registry.register(Box::new(TableRowCountToEqual));
        registry.register(Box::new(TableColumnCountToEqual));
        registry.register(Box::new(TableColumnCountToBeBetween));
        registry.register(Box::new(ColumnValuesToBeNotNull));
        registry.register(Box::new(ColumnValuesToBeUnique));
        registry.register(Box::new(ColumnValuesToBeBetween));
        registry
    }

    pub fn register(&mut self, validator: Box<dyn Validator>) {
        let name = validator.name().to_string();
        self.validators.insert(name, validator);
    }

    pub fn get_validator(&self, name: &str) -> Option<&dyn Validator> {
        self.validators.get(name).map(|v| v.as_ref())
    }

    pub fn list_validators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[async_trait]
impl TestExecutor for ValidatorRegistry {
    async fn run(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<Option<TestCaseResult>> {
        let definition =
            test_case
                .test_definition_name()
                .ok_or_else(|| ExecutionError::MissingDefinition {
                    test_case: test_case.fqn().to_string(),
                })?;
        let validator =
            self.get_validator(definition)
                .ok_or_else(|| ExecutionError::UnknownDefinition {
                    name: definition.to_string(),
                })?;

        debug!("Running {} for {}", definition, test_case.fqn());
        validator.validate(context, test_case).map(Some)
    }

    fn executor_name(&self) -> &str {
        "validator-registry"
    }
}

/// Inclusive bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl Bounds {
    fn from_parameters(test_case: &TestCase, min: &str, max: &str) -> ExecutionResult<Self> {
        let bounds = Self {
            min: number_parameter(test_case, min)?,
            max: number_parameter(test_case, max)?,
        };
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err(ExecutionError::MissingParameter {
                test_case: test_case.fqn().to_string(),
                parameter: format!("{} or {}", min, max),
            });
        }
        Ok(bounds)
    }

    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (Some(min), None) => write!(f, "[{}, inf)", min),
            (None, Some(max)) => write!(f, "(-inf, {}]", max),
            (None, None) => write!(f, "(-inf, inf)"),
        }
    }
}

fn number_parameter(test_case: &TestCase, name: &str) -> ExecutionResult<Option<f64>> {
    test_case
        .parameter(name)
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| ExecutionError::InvalidParameter {
                    test_case: test_case.fqn().to_string(),
                    parameter: name.to_string(),
                    value: value.to_string(),
                })
        })
        .transpose()
}

fn required_number(test_case: &TestCase, name: &str) -> ExecutionResult<f64> {
    number_parameter(test_case, name)?.ok_or_else(|| ExecutionError::MissingParameter {
        test_case: test_case.fqn().to_string(),
        parameter: name.to_string(),
    })
}

fn table_profile(context: &TableContext) -> ExecutionResult<&TableProfile> {
    context
        .table
        .profile
        .as_ref()
        .ok_or_else(|| ExecutionError::MissingProfile {
            target: context.table_fqn().to_string(),
        })
}

fn row_count(context: &TableContext) -> ExecutionResult<f64> {
    table_profile(context)?
        .row_count
        .ok_or_else(|| ExecutionError::MissingProfile {
            target: format!("row count of {}", context.table_fqn()),
        })
}

/// Column count from the profile, else from the table's column list.
fn column_count(context: &TableContext) -> ExecutionResult<f64> {
    let profiled = context.table.profile.as_ref().and_then(|p| p.column_count);
    match profiled {
        Some(count) => Ok(count),
        None if !context.table.columns.is_empty() => Ok(context.table.columns.len() as f64),
        None => Err(ExecutionError::MissingProfile {
            target: format!("column count of {}", context.table_fqn()),
        }),
    }
}

fn column_profile<'a>(
    context: &'a TableContext,
    test_case: &TestCase,
) -> ExecutionResult<(String, &'a ColumnProfile)> {
    let column_name = entity_link::column_name(&test_case.entity_link).ok_or_else(|| {
        ExecutionError::MissingColumn {
            test_case: test_case.fqn().to_string(),
        }
    })?;
    let column =
        context
            .table
            .column(&column_name)
            .ok_or_else(|| ExecutionError::ColumnNotFound {
                table: context.table_fqn().to_string(),
                column: column_name.clone(),
            })?;
    let profile = column
        .profile
        .as_ref()
        .ok_or_else(|| ExecutionError::MissingProfile {
            target: format!("{}.{}", context.table_fqn(), column_name),
        })?;
    Ok((column_name, profile))
}

fn profile_metric(metric: Option<f64>, target: &str, name: &str) -> ExecutionResult<f64> {
    metric.ok_or_else(|| ExecutionError::MissingProfile {
        target: format!("{} of {}", name, target),
    })
}

fn profile_number(value: Option<&Value>, target: &str, name: &str) -> ExecutionResult<f64> {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    number.ok_or_else(|| ExecutionError::MissingProfile {
        target: format!("numeric {} of {}", name, target),
    })
}

fn test_result(success: bool, message: String, values: &[(&str, f64)]) -> TestCaseResult {
    TestCaseResult {
        timestamp: chrono::Utc::now().timestamp(),
        test_case_status: if success {
            TestCaseStatus::Success
        } else {
            TestCaseStatus::Failed
        },
        result: Some(message),
        test_result_value: values
            .iter()
            .map(|(name, value)| TestResultValue {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

pub struct TableRowCountToBeBetween;

impl Validator for TableRowCountToBeBetween {
    fn name(&self) -> &str {
        "tableRowCountToBeBetween"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let bounds = Bounds::from_parameters(test_case, "minValue", "maxValue")?;
        let rows = row_count(context)?;
        Ok(test_result(
            bounds.contains(rows),
            format!("Found {} rows vs. the expected range {}.", rows, bounds),
            &[("rowCount", rows)],
        ))
    }
}

pub struct TableRowCountToEqual;

impl Validator for TableRowCountToEqual {
    fn name(&self) -> &str {
        "tableRowCountToEqual"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let expected = required_number(test_case, "value")?;
        let rows = row_count(context)?;
        Ok(test_result(
            rows == expected,
            format!("Found {} rows vs. the expected {}.", rows, expected),
            &[("rowCount", rows)],
        ))
    }
}

pub struct TableColumnCountToEqual;

impl Validator for TableColumnCountToEqual {
    fn name(&self) -> &str {
        "tableColumnCountToEqual"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let expected = required_number(test_case, "columnCount")?;
        let columns = column_count(context)?;
        Ok(test_result(
            columns == expected,
            format!("Found {} columns vs. the expected {}.", columns, expected),
            &[("columnCount", columns)],
        ))
    }
}

pub struct TableColumnCountToBeBetween;

impl Validator for TableColumnCountToBeBetween {
    fn name(&self) -> &str {
        "tableColumnCountToBeBetween"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let bounds = Bounds::from_parameters(test_case, "minColValue", "maxColValue")?;
        let columns = column_count(context)?;
        Ok(test_result(
            bounds.contains(columns),
            format!("Found {} columns vs. the expected range {}.", columns, bounds),
            &[("columnCount", columns)],
        ))
    }
}

pub struct ColumnValuesToBeNotNull;

impl Validator for ColumnValuesToBeNotNull {
    fn name(&self) -> &str {
        "columnValuesToBeNotNull"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let (column, profile) = column_profile(context, test_case)?;
        let nulls = profile_metric(profile.null_count, &column, "null count")?;
        Ok(test_result(
            nulls == 0.0,
            format!("Found {} null values in column {}.", nulls, column),
            &[("nullCount", nulls)],
        ))
    }
}

pub struct ColumnValuesToBeUnique;

impl Validator for ColumnValuesToBeUnique {
    fn name(&self) -> &str {
        "columnValuesToBeUnique"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let (column, profile) = column_profile(context, test_case)?;
        let values = profile_metric(profile.values_count, &column, "values count")?;
        let unique = profile_metric(profile.unique_count, &column, "unique count")?;
        Ok(test_result(
            values == unique,
            format!(
                "Found {} unique values out of {} in column {}.",
                unique, values, column
            ),
            &[("valuesCount", values), ("uniqueCount", unique)],
        ))
    }
}

pub struct ColumnValuesToBeBetween;

impl Validator for ColumnValuesToBeBetween {
    fn name(&self) -> &str {
        "columnValuesToBeBetween"
    }

    fn validate(
        &self,
        context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<TestCaseResult> {
        let bounds = Bounds::from_parameters(test_case, "minValue", "maxValue")?;
        let (column, profile) = column_profile(context, test_case)?;
        let min = profile_number(profile.min.as_ref(), &column, "min")?;
        let max = profile_number(profile.max.as_ref(), &column, "max")?;
        Ok(test_result(
            bounds.contains(min) && bounds.contains(max),
            format!(
                "Found min={} and max={} in column {} vs. the expected range {}.",
                min, max, column, bounds
            ),
            &[("min", min), ("max", max)],
        ))
    }
}
