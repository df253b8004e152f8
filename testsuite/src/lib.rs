pub mod config;
pub mod context;
pub mod executor;
pub mod reconcile;
pub mod sink;
pub mod status;
pub mod workflow;

pub use config::{
    ConfigError, ConfigFormat, ConfigResult, LogLevel, ProcessorConfig, SinkConfig, SinkSettings,
    SourceConfig, TestCaseDefinition, TestSuiteDefinition, WorkflowConfig, WorkflowSettings,
};
pub use context::{
    ContextError, ContextResult, DataScope, TableContext, TableContextBuilder,
    TablePartitionConfig,
};
pub use executor::{ExecutionError, ExecutionResult, TestExecutor, Validator, ValidatorRegistry};
pub use reconcile::{declared_test_cases, pending_test_cases, DeclaredTestCase, TestCaseReconciler};
pub use sink::{
    build_sink, FileSink, MetadataRestSink, Sink, SinkError, SinkResult, TestCaseResultRecord,
};
pub use status::Status;
pub use workflow::{TableGroups, TestSuiteWorkflow, WorkflowError, WorkflowResult};
