//! Test suite workflow orchestration.
//!
//! The workflow resolves the test suites to run, reconciles the test cases
//! declared in the configuration with the ones stored in the catalog, groups
//! them by table and runs every test case with its table context:
//!
//! 1. Test suites: the suite named after the source service, else the
//!    declared suites (created when missing)
//! 2. Test cases: every stored case of those suites, plus the declared cases
//!    missing from the catalog
//! 3. Per table: derive the context, then run each test case and forward its
//!    result to the sink
//!
//! A table whose context cannot be derived fails all of its test cases. A
//! test case that errors fails alone. Neither aborts the run.

use crate::config::{ConfigError, WorkflowConfig};
use crate::context::{TableContext, TableContextBuilder};
use crate::executor::{TestExecutor, ValidatorRegistry};
use crate::reconcile::TestCaseReconciler;
use crate::sink::{build_sink, Sink, SinkError, TestCaseResultRecord};
use crate::status::Status;
use catalog::entity_link;
use catalog::{
    CatalogClient, CatalogError, CreateTestSuiteRequest, EntityResolver, ListFilter,
    RestCatalogClient, TestCase, TestSuite,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Fields requested when listing the test cases of a suite.
pub const TEST_CASE_FIELDS: [&str; 3] = ["testSuite", "entityLink", "testDefinition"];

const PROCESSOR_STAGE: &str = "Processor";

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("{stage} reported {failures} failures and {warnings} warnings")]
    Execution {
        stage: String,
        failures: usize,
        warnings: usize,
    },
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Test cases grouped by the FQN of the table they target.
#[derive(Debug, Default)]
pub struct TableGroups {
    pub tables: BTreeMap<String, Vec<TestCase>>,
    /// Test cases whose entity link names no table.
    pub unlinked: Vec<TestCase>,
}

impl TableGroups {
    pub fn from_test_cases(test_cases: Vec<TestCase>) -> Self {
        let mut groups = Self::default();
        for test_case in test_cases {
            match entity_link::table_fqn(&test_case.entity_link) {
                Some(table) => groups.tables.entry(table).or_default().push(test_case),
                None => groups.unlinked.push(test_case),
            }
        }
        groups
    }
}

pub struct TestSuiteWorkflow {
    config: WorkflowConfig,
    client: Arc<dyn CatalogClient>,
    resolver: EntityResolver,
    executor: Box<dyn TestExecutor>,
    sink: Option<Box<dyn Sink>>,
    status: Status,
}

impl TestSuiteWorkflow {
    pub fn new(
        config: WorkflowConfig,
        client: Arc<dyn CatalogClient>,
        executor: Box<dyn TestExecutor>,
        sink: Option<Box<dyn Sink>>,
    ) -> Self {
        Self {
            config,
            resolver: EntityResolver::new(client.clone()),
            client,
            executor,
            sink,
            status: Status::new(),
        }
    }

    /// Build a workflow from its configuration: REST catalog client,
    /// built-in validators and the configured sink.
    pub async fn create(config: WorkflowConfig) -> WorkflowResult<Self> {
        config.validate()?;
        let client: Arc<dyn CatalogClient> =
            Arc::new(RestCatalogClient::new(config.catalog_config().clone())?);
        let sink = match &config.sink {
            Some(sink_config) => Some(build_sink(sink_config, client.clone()).await?),
            None => None,
        };
        info!(
            "Created workflow for {} with catalog {}",
            config.source.service_name,
            client.client_name()
        );
        Ok(Self::new(
            config,
            client,
            Box::new(ValidatorRegistry::with_builtin()),
            sink,
        ))
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn sink_status(&self) -> Option<&Status> {
        self.sink.as_ref().map(|sink| sink.status())
    }

    /// The suite named after the source service, if it exists.
    pub async fn get_test_suite_entity_for_ui_workflow(
        &self,
    ) -> WorkflowResult<Option<Vec<TestSuite>>> {
        let name = &self.config.source.service_name;
        let suite: Option<TestSuite> = self.resolver.get_by_name(name, &[]).await?;
        match &suite {
            Some(suite) => info!("Found test suite {} ({})", suite.name, suite.id),
            None => debug!("No test suite named {}", name),
        }
        Ok(suite.map(|suite| vec![suite]))
    }

    /// Every declared suite, created when missing from the catalog.
    pub async fn get_or_create_test_suite_entity_for_cli_workflow(
        &self,
    ) -> WorkflowResult<Vec<TestSuite>> {
        let mut suites = Vec::new();
        for declared in self.config.test_suites() {
            let existing: Option<TestSuite> =
                self.resolver.get_by_name(&declared.name, &[]).await?;
            let suite = match existing {
                Some(suite) => suite,
                None => {
                    info!("Creating test suite {}", declared.name);
                    self.resolver
                        .create_or_update(CreateTestSuiteRequest {
                            name: declared.name.clone(),
                            description: declared.description.clone(),
                        })
                        .await?
                }
            };
            suites.push(suite);
        }
        Ok(suites)
    }

    pub async fn get_test_suite_entities(&self) -> WorkflowResult<Vec<TestSuite>> {
        match self.get_test_suite_entity_for_ui_workflow().await? {
            Some(suites) => Ok(suites),
            None => self.get_or_create_test_suite_entity_for_cli_workflow().await,
        }
    }

    pub async fn get_test_cases_from_test_suite(
        &self,
        suites: &[TestSuite],
    ) -> WorkflowResult<Vec<TestCase>> {
        let mut test_cases = Vec::new();
        for suite in suites {
            let filter = ListFilter::from([("testSuiteId".to_string(), suite.id.to_string())]);
            let stored: Vec<TestCase> = self
                .resolver
                .list_entities(&TEST_CASE_FIELDS, &filter)
                .await?;
            debug!("Test suite {} has {} test cases", suite.name, stored.len());
            test_cases.extend(stored);
        }
        Ok(test_cases)
    }

    /// Stored test cases of `suites`, completed with the declared ones.
    pub async fn get_test_cases(&self, suites: &[TestSuite]) -> WorkflowResult<Vec<TestCase>> {
        let stored = self.get_test_cases_from_test_suite(suites).await?;
        let declared = self.config.test_suites();
        if declared.is_empty() {
            return Ok(stored);
        }
        let reconciler = TestCaseReconciler::new(self.resolver.clone());
        Ok(reconciler.reconcile(declared, stored).await)
    }

    pub async fn execute(&mut self) -> WorkflowResult<()> {
        let suites = self.get_test_suite_entities().await?;
        if suites.is_empty() {
            warn!(
                "No test suite found for {} and none declared",
                self.config.source.service_name
            );
        }

        let test_cases = self.get_test_cases(&suites).await?;
        let groups = TableGroups::from_test_cases(test_cases);
        info!(
            "Running test cases on {} tables",
            groups.tables.len()
        );

        for test_case in &groups.unlinked {
            warn!(
                "Test case {} has no table in its entity link {}",
                test_case.fqn(),
                test_case.entity_link
            );
            self.status.failure(test_case.fqn());
        }

        let mut builder = TableContextBuilder::new(self.resolver.clone());
        if self.config.is_sample_source() {
            builder = builder.without_connections();
        }

        for (table_fqn, test_cases) in &groups.tables {
            match builder.build(table_fqn).await {
                Ok(context) => {
                    for test_case in test_cases {
                        self.run_test_case(&context, test_case).await;
                    }
                }
                Err(e) => {
                    warn!("Skipping table {}: {}", table_fqn, e);
                    debug!("Context failure for {}: {:?}", table_fqn, e);
                    for test_case in test_cases {
                        self.status.failure(test_case.fqn());
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_test_case(&mut self, context: &TableContext, test_case: &TestCase) {
        let key = test_case.fqn();
        match self.executor.run(context, test_case).await {
            Ok(Some(result)) => {
                if let Some(sink) = self.sink.as_mut() {
                    let record = TestCaseResultRecord {
                        test_case_fqn: key.to_string(),
                        table_fqn: context.table_fqn().to_string(),
                        test_case_result: result,
                    };
                    if let Err(e) = sink.write_record(&record).await {
                        warn!("Sink {} rejected result of {}: {}", sink.sink_name(), key, e);
                    }
                }
                self.status.processed(key);
            }
            Ok(None) => {
                debug!("No result to report for {}", key);
                self.status.processed(key);
            }
            Err(e) => {
                warn!("Test case {} failed to execute: {}", key, e);
                debug!("Execution failure for {}: {:?}", key, e);
                self.status.failure(key);
            }
        }
    }

    /// Close the sink and the catalog client. Both are attempted; the first
    /// error is returned.
    pub async fn stop(&mut self) -> WorkflowResult<()> {
        let sink_closed = match self.sink.as_mut() {
            Some(sink) => sink.close().await.map_err(WorkflowError::from),
            None => Ok(()),
        };
        let client_closed = self.client.close().await.map_err(WorkflowError::from);
        sink_closed.and(client_closed)
    }

    /// Execute then stop, stopping even when execution failed.
    pub async fn run(&mut self) -> WorkflowResult<()> {
        let executed = self.execute().await;
        let stopped = self.stop().await;
        if let Err(e) = &stopped {
            error!("Failed to stop workflow: {}", e);
        }
        executed.and(stopped)
    }

    pub fn failed(&self, raise_warnings: bool) -> bool {
        self.status.is_failed(raise_warnings)
            || self
                .sink_status()
                .is_some_and(|status| status.is_failed(raise_warnings))
    }

    pub fn exit_code(&self, raise_warnings: bool) -> i32 {
        if self.failed(raise_warnings) {
            1
        } else {
            0
        }
    }

    /// Print processor and sink status, returning the process exit code.
    pub fn print_status(&self, raise_warnings: bool) -> i32 {
        println!("Processor Status:");
        println!("{}", self.status);
        if let Some(sink) = &self.sink {
            println!("Sink Status ({}):", sink.sink_name());
            println!("{}", sink.status());
        }

        let code = self.exit_code(raise_warnings);
        if code == 0 {
            println!("Workflow finished successfully");
        } else {
            println!("Workflow finished with failures");
        }
        code
    }

    /// Fail on any stage with failures first, then on warnings when
    /// `raise_warnings` is set.
    pub fn raise_from_status(&self, raise_warnings: bool) -> WorkflowResult<()> {
        let stages: Vec<(&str, &Status)> = std::iter::once((PROCESSOR_STAGE, &self.status))
            .chain(
                self.sink
                    .as_ref()
                    .map(|sink| (sink.sink_name(), sink.status())),
            )
            .collect();

        let failed = stages
            .iter()
            .find(|(_, status)| status.has_failures())
            .or_else(|| {
                raise_warnings
                    .then(|| stages.iter().find(|(_, status)| status.has_warnings()))
                    .flatten()
            });
        match failed {
            Some((stage, status)) => Err(WorkflowError::Execution {
                stage: stage.to_string(),
                failures: status.failures.len(),
                warnings: status.warnings.len(),
            }),
            None => Ok(()),
        }
    }
}
