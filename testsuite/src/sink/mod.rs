//! Output sinks for test case results.

mod file;
mod metadata_rest;

pub use file::FileSink;
pub use metadata_rest::MetadataRestSink;

use crate::config::{SinkConfig, SINK_FILE, SINK_METADATA_REST};
use crate::status::Status;
use async_trait::async_trait;
use catalog::{CatalogClient, CatalogError, TestCaseResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown sink type: {sink_type}")]
    UnknownSink { sink_type: String },

    #[error("Invalid sink configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Sink is closed")]
    Closed,
}

pub type SinkResult<T> = Result<T, SinkError>;

/// One test case outcome forwarded to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResultRecord {
    pub test_case_fqn: String,
    pub table_fqn: String,
    pub test_case_result: TestCaseResult,
}

/// Destination of test case results.
///
/// A sink keeps its own [`Status`]: successful writes are recorded as
/// processed, failed writes as failures, before the error is returned.
#[async_trait]
pub trait Sink: Send {
    async fn write_record(&mut self, record: &TestCaseResultRecord) -> SinkResult<()>;

    fn status(&self) -> &Status;

    async fn close(&mut self) -> SinkResult<()>;

    fn sink_name(&self) -> &str;
}

/// Build the sink described by `config`.
pub async fn build_sink(
    config: &SinkConfig,
    client: Arc<dyn CatalogClient>,
) -> SinkResult<Box<dyn Sink>> {
    match config.sink_type.as_str() {
        SINK_METADATA_REST => Ok(Box::new(MetadataRestSink::new(client))),
        SINK_FILE => {
            let path = config
                .config
                .filename
                .clone()
                .ok_or_else(|| SinkError::InvalidConfig {
                    message: "file sink requires config.filename".to_string(),
                })?;
            Ok(Box::new(FileSink::create(path).await?))
        }
        other => Err(SinkError::UnknownSink {
            sink_type: other.to_string(),
        }),
    }
}
