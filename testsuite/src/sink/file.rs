use super::{Sink, SinkError, SinkResult, TestCaseResultRecord};
use crate::config::SINK_FILE;
use crate::status::Status;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// Appends each record as one JSON line to a file.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    status: Status,
}

impl FileSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: impl Into<PathBuf>) -> SinkResult<Self> {
        let path = path.into();
        let file = File::create(&path).await.map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Writing test case results to {}", path.display());
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            status: Status::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&mut self, record: &TestCaseResultRecord) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        writer.write_all(&line).await.map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write_record(&mut self, record: &TestCaseResultRecord) -> SinkResult<()> {
        match self.append(record).await {
            Ok(()) => {
                self.status.processed(record.test_case_fqn.clone());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to write result of {}: {}", record.test_case_fqn, e);
                self.status.failure(record.test_case_fqn.clone());
                Err(e)
            }
        }
    }

    fn status(&self) -> &Status {
        &self.status
    }

    async fn close(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
            debug!("Closed {}", self.path.display());
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        SINK_FILE
    }
}
