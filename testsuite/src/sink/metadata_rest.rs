use super::{Sink, SinkResult, TestCaseResultRecord};
use crate::config::SINK_METADATA_REST;
use crate::status::Status;
use async_trait::async_trait;
use catalog::CatalogClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes results back to the catalog, on the test case they belong to.
pub struct MetadataRestSink {
    client: Arc<dyn CatalogClient>,
    status: Status,
}

impl MetadataRestSink {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self {
            client,
            status: Status::new(),
        }
    }
}

#[async_trait]
impl Sink for MetadataRestSink {
    async fn write_record(&mut self, record: &TestCaseResultRecord) -> SinkResult<()> {
        match self
            .client
            .add_test_case_result(&record.test_case_fqn, &record.test_case_result)
            .await
        {
            Ok(()) => {
                debug!("Stored result of {}", record.test_case_fqn);
                self.status.processed(record.test_case_fqn.clone());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to store result of {}: {}", record.test_case_fqn, e);
                self.status.failure(record.test_case_fqn.clone());
                Err(e.into())
            }
        }
    }

    fn status(&self) -> &Status {
        &self.status
    }

    async fn close(&mut self) -> SinkResult<()> {
        // The catalog client is shared with the workflow, which closes it.
        debug!("Closing {} sink", SINK_METADATA_REST);
        Ok(())
    }

    fn sink_name(&self) -> &str {
        SINK_METADATA_REST
    }
}
