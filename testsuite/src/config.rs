//! Workflow configuration file.
//!
//! The file is parsed according to its extension (`.yaml`/`.yml`, `.json`,
//! `.toml`). Keys are camelCase in every format.

use catalog::{CatalogConfig, EntityLink, TestCaseParameterValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SINK_METADATA_REST: &str = "metadata-rest";
pub const SINK_FILE: &str = "file";

const SAMPLE_SOURCES: [&str; 2] = ["sample-data", "sample-usage"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported config format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkConfig>,
    #[serde(default)]
    pub workflow_config: WorkflowSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: String,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
    #[serde(rename = "type", default = "default_processor_type")]
    pub processor_type: String,
    #[serde(default)]
    pub config: ProcessorSettings,
}

fn default_processor_type() -> String {
    "orm-test-runner".to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            processor_type: default_processor_type(),
            config: ProcessorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSettings {
    #[serde(default)]
    pub test_suites: Vec<TestSuiteDefinition>,
}

/// A test suite declared in the workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCaseDefinition>,
}

/// A test case declared in the workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseDefinition {
    pub name: String,
    pub test_definition_name: String,
    pub entity_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameter_values: Vec<TestCaseParameterValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    #[serde(rename = "type")]
    pub sink_type: String,
    #[serde(default)]
    pub config: SinkSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(default)]
    pub logger_level: LogLevel,
    #[serde(default)]
    pub open_metadata_server_config: CatalogConfig,
}

impl WorkflowConfig {
    pub fn new(source_type: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            source: SourceConfig {
                source_type: source_type.into(),
                service_name: service_name.into(),
            },
            processor: ProcessorConfig::default(),
            sink: None,
            workflow_config: WorkflowSettings::default(),
        }
    }

    pub fn with_test_suite(mut self, suite: TestSuiteDefinition) -> Self {
        self.processor.config.test_suites.push(suite);
        self
    }

    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_catalog_config(mut self, config: CatalogConfig) -> Self {
        self.workflow_config.open_metadata_server_config = config;
        self
    }

    /// Read and parse a workflow file. The result is not validated.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Self> {
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(config)
    }

    /// Parse and validate in one step.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Sample sources carry their own data and need no service connection.
    pub fn is_sample_source(&self) -> bool {
        let source_type = self.source.source_type.to_ascii_lowercase();
        SAMPLE_SOURCES.contains(&source_type.as_str())
    }

    pub fn test_suites(&self) -> &[TestSuiteDefinition] {
        &self.processor.config.test_suites
    }

    pub fn catalog_config(&self) -> &CatalogConfig {
        &self.workflow_config.open_metadata_server_config
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.source.service_name.trim().is_empty() {
            return Err(invalid("source.serviceName cannot be empty"));
        }

        let mut suite_names = HashSet::new();
        for suite in self.test_suites() {
            if suite.name.trim().is_empty() {
                return Err(invalid("test suite name cannot be empty"));
            }
            if !suite_names.insert(suite.name.as_str()) {
                return Err(invalid(format!("duplicate test suite {}", suite.name)));
            }
            for test_case in &suite.test_cases {
                test_case.validate(&suite.name)?;
            }
        }

        if let Some(sink) = &self.sink {
            match sink.sink_type.as_str() {
                SINK_METADATA_REST => {}
                SINK_FILE if sink.config.filename.is_none() => {
                    return Err(invalid("file sink requires config.filename"));
                }
                SINK_FILE => {}
                other => return Err(invalid(format!("unknown sink type {}", other))),
            }
        }

        self.catalog_config().validate().map_err(invalid)
    }
}

impl TestCaseDefinition {
    fn validate(&self, suite: &str) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid(format!("test case without name in suite {}", suite)));
        }
        if self.test_definition_name.trim().is_empty() {
            return Err(invalid(format!(
                "test case {} has no testDefinitionName",
                self.name
            )));
        }
        EntityLink::parse(&self.entity_link)
            .map_err(|e| invalid(format!("test case {}: {}", self.name, e)))?;
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
