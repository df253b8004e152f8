use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Query-string style filter passed to list operations (e.g. `testSuiteId`).
pub type ListFilter = BTreeMap<String, String>;

/// Kinds of catalog entities this workspace reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    TestSuite,
    TestCase,
    TestDefinition,
    Table,
    DatabaseService,
}

impl EntityKind {
    /// REST collection path, relative to the versioned API root.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::TestSuite => "testSuite",
            EntityKind::TestCase => "testCase",
            EntityKind::TestDefinition => "testDefinition",
            EntityKind::Table => "tables",
            EntityKind::DatabaseService => "services/databaseServices",
        }
    }

    /// Value of the `type` field in an [`EntityReference`].
    pub fn reference_type(&self) -> &'static str {
        match self {
            EntityKind::TestSuite => "testSuite",
            EntityKind::TestCase => "testCase",
            EntityKind::TestDefinition => "testDefinition",
            EntityKind::Table => "table",
            EntityKind::DatabaseService => "databaseService",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference_type())
    }
}

/// Kind of service whose connection is retrieved through the secrets-aware path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceKind {
    DatabaseService,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::DatabaseService => write!(f, "databaseservice"),
        }
    }
}

/// A typed catalog entity that can be fetched, listed or created.
pub trait CatalogEntity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    fn fully_qualified_name(&self) -> Option<&str>;

    fn entity_reference(&self) -> EntityReference {
        EntityReference {
            id: self.id(),
            entity_type: Self::KIND.reference_type().to_string(),
            name: Some(self.name().to_string()),
            fully_qualified_name: self.fully_qualified_name().map(str::to_string),
            description: None,
        }
    }
}

/// Lightweight pointer to a catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityHeader {
    id: Uuid,
    name: String,
    #[serde(default)]
    fully_qualified_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl EntityReference {
    /// Build a reference from the raw JSON of any entity of `kind`.
    pub fn from_entity_value(
        kind: EntityKind,
        value: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let header: EntityHeader = serde_json::from_value(value.clone())?;
        Ok(Self {
            id: header.id,
            entity_type: kind.reference_type().to_string(),
            name: Some(header.name),
            fully_qualified_name: header.fully_qualified_name,
            description: header.description,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

/// A named parameter of a test case. Values are carried as strings; numbers
/// and booleans in input documents are accepted and stringified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseParameterValue {
    pub name: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub value: String,
}

impl TestCaseParameterValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "parameter value must be a string, number or boolean, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entity_link: String,
    pub test_suite: EntityReference,
    pub test_definition: EntityReference,
    #[serde(default)]
    pub parameter_values: Vec<TestCaseParameterValue>,
}

impl TestCase {
    /// Key used for status bookkeeping: the FQN, or the bare name when the
    /// catalog did not return one.
    pub fn fqn(&self) -> &str {
        self.fully_qualified_name.as_deref().unwrap_or(&self.name)
    }

    /// Name of the referenced test definition.
    pub fn test_definition_name(&self) -> Option<&str> {
        self.test_definition
            .fully_qualified_name
            .as_deref()
            .or(self.test_definition.name.as_deref())
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameter_values
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum IntervalType {
    TimeUnit,
    IntegerRange,
    IngestionTime,
    ColumnValue,
    #[serde(other)]
    Other,
}

impl IntervalType {
    /// Only time-based partitions can be turned into a partition filter.
    pub fn is_time_based(&self) -> bool {
        matches!(self, IntervalType::TimeUnit | IntervalType::IngestionTime)
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntervalType::TimeUnit => "TIME-UNIT",
            IntervalType::IntegerRange => "INTEGER-RANGE",
            IntervalType::IngestionTime => "INGESTION-TIME",
            IntervalType::ColumnValue => "COLUMN-VALUE",
            IntervalType::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePartition {
    #[serde(default)]
    pub columns: Vec<String>,
    pub interval_type: IntervalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfilerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_sample: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ColumnProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_profiler_config: Option<TableProfilerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_partition: Option<TablePartition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<TableProfile>,
}

impl Table {
    pub fn profile_sample(&self) -> Option<f64> {
        self.table_profiler_config
            .as_ref()
            .and_then(|c| c.profile_sample)
    }

    pub fn profile_query(&self) -> Option<&str> {
        self.table_profiler_config
            .as_ref()
            .and_then(|c| c.profile_query.as_deref())
            .filter(|q| !q.trim().is_empty())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Opaque connection settings of a service, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConnection {
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseService {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ServiceConnection>,
}

macro_rules! impl_catalog_entity {
    ($ty:ty, $kind:expr) => {
        impl CatalogEntity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn fully_qualified_name(&self) -> Option<&str> {
                self.fully_qualified_name.as_deref()
            }
        }
    };
}

impl_catalog_entity!(TestSuite, EntityKind::TestSuite);
impl_catalog_entity!(TestCase, EntityKind::TestCase);
impl_catalog_entity!(TestDefinition, EntityKind::TestDefinition);
impl_catalog_entity!(Table, EntityKind::Table);
impl_catalog_entity!(DatabaseService, EntityKind::DatabaseService);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestSuiteRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestCaseRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entity_link: String,
    pub test_definition: EntityReference,
    pub test_suite: EntityReference,
    #[serde(default)]
    pub parameter_values: Vec<TestCaseParameterValue>,
}

/// Body of a create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CreateRequest {
    TestSuite(CreateTestSuiteRequest),
    TestCase(CreateTestCaseRequest),
}

impl CreateRequest {
    pub fn kind(&self) -> EntityKind {
        match self {
            CreateRequest::TestSuite(_) => EntityKind::TestSuite,
            CreateRequest::TestCase(_) => EntityKind::TestCase,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CreateRequest::TestSuite(r) => &r.name,
            CreateRequest::TestCase(r) => &r.name,
        }
    }
}

impl From<CreateTestSuiteRequest> for CreateRequest {
    fn from(request: CreateTestSuiteRequest) -> Self {
        CreateRequest::TestSuite(request)
    }
}

impl From<CreateTestCaseRequest> for CreateRequest {
    fn from(request: CreateTestCaseRequest) -> Self {
        CreateRequest::TestCase(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestCaseStatus {
    Success,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResultValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub test_case_status: TestCaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub test_result_value: Vec<TestResultValue>,
}
