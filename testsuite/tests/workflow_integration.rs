use async_trait::async_trait;
use catalog::{
    CatalogEntity, DatabaseService, EntityKind, InMemoryCatalog, Table, TestCase,
    TestCaseParameterValue, TestCaseResult, TestCaseStatus, TestDefinition, TestSuite,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use testsuite::{
    ExecutionError, ExecutionResult, Sink, SinkError, SinkResult, Status, TableContext,
    TestCaseDefinition, TestCaseResultRecord, TestExecutor, TestSuiteDefinition,
    TestSuiteWorkflow, ValidatorRegistry, WorkflowConfig, WorkflowError,
};
use uuid::Uuid;

const ORDERS: &str = "<#E::table::svc.db.sch.orders>";
const EVENTS: &str = "<#E::table::svc.db.sch.events>";

/// Executor returning a fixed outcome per test case name.
#[derive(Default)]
struct ScriptedExecutor {
    failing: HashSet<String>,
    empty: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    fn empty(mut self, name: &str) -> Self {
        self.empty.insert(name.to_string());
        self
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn run(
        &self,
        _context: &TableContext,
        test_case: &TestCase,
    ) -> ExecutionResult<Option<TestCaseResult>> {
        self.calls.lock().unwrap().push(test_case.name.clone());
        if self.failing.contains(&test_case.name) {
            return Err(ExecutionError::Failed {
                message: format!("{} exploded", test_case.name),
            });
        }
        if self.empty.contains(&test_case.name) {
            return Ok(None);
        }
        Ok(Some(TestCaseResult {
            timestamp: 1_700_000_000,
            test_case_status: TestCaseStatus::Success,
            result: Some("ok".to_string()),
            test_result_value: vec![],
        }))
    }

    fn executor_name(&self) -> &str {
        "scripted"
    }
}

/// Sink keeping records in memory, rejecting the ones listed.
#[derive(Default)]
struct RecordingSink {
    rejected: HashSet<String>,
    records: Arc<Mutex<Vec<TestCaseResultRecord>>>,
    closed: Arc<Mutex<bool>>,
    status: Status,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn write_record(&mut self, record: &TestCaseResultRecord) -> SinkResult<()> {
        if self.rejected.contains(&record.test_case_fqn) {
            self.status.failure(record.test_case_fqn.clone());
            return Err(SinkError::InvalidConfig {
                message: "rejected".to_string(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        self.status.processed(record.test_case_fqn.clone());
        Ok(())
    }

    fn status(&self) -> &Status {
        &self.status
    }

    async fn close(&mut self) -> SinkResult<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "recording"
    }
}

fn entity<T: CatalogEntity>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

fn table(fqn: &str, partition: Value) -> Table {
    entity(json!({
        "id": Uuid::new_v4(),
        "name": fqn.rsplit('.').next().unwrap(),
        "fullyQualifiedName": fqn,
        "tablePartition": partition,
        "profile": {"rowCount": 100}
    }))
}

async fn seed_catalog() -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let service: DatabaseService = entity(json!({
        "id": Uuid::new_v4(),
        "name": "svc",
        "fullyQualifiedName": "svc",
        "connection": {"config": {"type": "Postgres", "hostPort": "db:5432"}}
    }));
    catalog.insert(&service).await.unwrap();
    catalog
        .insert(&table("svc.db.sch.orders", Value::Null))
        .await
        .unwrap();
    for name in ["tableRowCountToEqual", "tableRowCountToBeBetween"] {
        let definition: TestDefinition = entity(json!({
            "id": Uuid::new_v4(),
            "name": name,
            "fullyQualifiedName": name
        }));
        catalog.insert(&definition).await.unwrap();
    }
    catalog
}

async fn insert_suite(catalog: &InMemoryCatalog, name: &str) -> TestSuite {
    let suite: TestSuite = entity(json!({
        "id": Uuid::new_v4(),
        "name": name,
        "fullyQualifiedName": name
    }));
    catalog.insert(&suite).await.unwrap();
    suite
}

async fn insert_test_case(catalog: &InMemoryCatalog, suite: &TestSuite, name: &str, link: &str) {
    let table = catalog::entity_link::table_fqn(link).unwrap();
    let test_case: TestCase = entity(json!({
        "id": Uuid::new_v4(),
        "name": name,
        "fullyQualifiedName": format!("{}.{}", table, name),
        "entityLink": link,
        "testSuite": suite.entity_reference(),
        "testDefinition": {
            "id": Uuid::new_v4(),
            "type": "testDefinition",
            "name": "tableRowCountToEqual",
            "fullyQualifiedName": "tableRowCountToEqual"
        },
        "parameterValues": [{"name": "value", "value": "100"}]
    }));
    catalog.insert(&test_case).await.unwrap();
}

fn declared(name: &str, link: &str) -> TestCaseDefinition {
    TestCaseDefinition {
        name: name.to_string(),
        test_definition_name: "tableRowCountToEqual".to_string(),
        entity_link: link.to_string(),
        description: Some(format!("{} check", name)),
        parameter_values: vec![TestCaseParameterValue::new("value", "100")],
    }
}

fn suite_definition(name: &str, cases: Vec<TestCaseDefinition>) -> TestSuiteDefinition {
    TestSuiteDefinition {
        name: name.to_string(),
        description: Some(format!("{} suite", name)),
        test_cases: cases,
    }
}

fn two_suite_config() -> WorkflowConfig {
    WorkflowConfig::new("TestSuite", "cli_run")
        .with_test_suite(suite_definition(
            "suite_a",
            vec![declared("a_stored", ORDERS), declared("a_new", ORDERS)],
        ))
        .with_test_suite(suite_definition(
            "suite_b",
            vec![declared("b_new", ORDERS)],
        ))
}

#[tokio::test]
async fn test_declared_suites_are_reconciled_and_run() {
    let catalog = seed_catalog().await;
    let suite_a = insert_suite(&catalog, "suite_a").await;
    insert_test_case(&catalog, &suite_a, "a_stored", ORDERS).await;

    let mut workflow = TestSuiteWorkflow::new(
        two_suite_config(),
        catalog.clone(),
        Box::new(ScriptedExecutor::default()),
        None,
    );
    workflow.run().await.unwrap();

    assert_eq!(catalog.created_count(EntityKind::TestCase).await, 2);
    assert_eq!(catalog.created_count(EntityKind::TestSuite).await, 1);
    assert_eq!(workflow.status().records.len(), 3);
    assert!(workflow.status().failures.is_empty());
    assert_eq!(workflow.print_status(false), 0);
    assert!(workflow.raise_from_status(true).is_ok());
    assert!(catalog.is_closed().await);
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let catalog = seed_catalog().await;

    for _ in 0..2 {
        let mut workflow = TestSuiteWorkflow::new(
            two_suite_config(),
            catalog.clone(),
            Box::new(ScriptedExecutor::default()),
            None,
        );
        workflow.execute().await.unwrap();
        assert_eq!(workflow.status().records.len(), 3);
    }

    assert_eq!(catalog.created_count(EntityKind::TestCase).await, 3);
    assert_eq!(catalog.created_count(EntityKind::TestSuite).await, 2);
}

#[tokio::test]
async fn test_failed_creation_is_skipped_and_others_still_run() {
    let catalog = seed_catalog().await;
    let suite_a = insert_suite(&catalog, "suite_a").await;
    insert_test_case(&catalog, &suite_a, "a_stored", ORDERS).await;
    catalog.fail_create("a_new").await;

    let executor = ScriptedExecutor::default();
    let calls = executor.calls.clone();
    let mut workflow = TestSuiteWorkflow::new(
        two_suite_config(),
        catalog.clone(),
        Box::new(executor),
        None,
    );
    workflow.run().await.unwrap();

    let created = catalog.created().await;
    assert!(created
        .iter()
        .any(|(kind, fqn)| *kind == EntityKind::TestCase && fqn.ends_with("b_new")));
    assert!(!created.iter().any(|(_, fqn)| fqn.ends_with("a_new")));
    assert_eq!(catalog.created_count(EntityKind::TestCase).await, 1);

    assert_eq!(*calls.lock().unwrap(), vec!["a_stored", "b_new"]);
    assert_eq!(
        workflow.status().records,
        vec!["svc.db.sch.orders.a_stored", "svc.db.sch.orders.b_new"]
    );
    assert!(workflow.status().failures.is_empty());
    assert_eq!(workflow.exit_code(false), 0);
}

#[tokio::test]
async fn test_unsupported_partition_fails_only_its_table() {
    let catalog = seed_catalog().await;
    catalog
        .insert(&table(
            "svc.db.sch.events",
            json!({"columns": ["bucket"], "intervalType": "SIZE-BASED"}),
        ))
        .await
        .unwrap();

    let config = WorkflowConfig::new("TestSuite", "cli_run").with_test_suite(suite_definition(
        "suite_a",
        vec![
            declared("events_one", EVENTS),
            declared("events_two", EVENTS),
            declared("orders_one", ORDERS),
        ],
    ));
    let executor = ScriptedExecutor::default();
    let calls = executor.calls.clone();
    let mut workflow =
        TestSuiteWorkflow::new(config, catalog.clone(), Box::new(executor), None);
    workflow.run().await.unwrap();

    let status = workflow.status();
    assert_eq!(
        status.failures,
        vec![
            "svc.db.sch.events.events_one",
            "svc.db.sch.events.events_two"
        ]
    );
    assert_eq!(status.records, vec!["svc.db.sch.orders.orders_one"]);
    assert_eq!(*calls.lock().unwrap(), vec!["orders_one"]);
    assert_eq!(workflow.exit_code(false), 1);

    match workflow.raise_from_status(false) {
        Err(WorkflowError::Execution { stage, failures, .. }) => {
            assert_eq!(stage, "Processor");
            assert_eq!(failures, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_test_case_does_not_stop_the_batch() {
    let catalog = seed_catalog().await;
    let config = WorkflowConfig::new("TestSuite", "cli_run").with_test_suite(suite_definition(
        "suite_a",
        vec![
            declared("first", ORDERS),
            declared("broken", ORDERS),
            declared("last", ORDERS),
        ],
    ));
    let executor = ScriptedExecutor::default().failing("broken");
    let calls = executor.calls.clone();
    let mut workflow = TestSuiteWorkflow::new(config, catalog, Box::new(executor), None);
    workflow.run().await.unwrap();

    let status = workflow.status();
    assert_eq!(calls.lock().unwrap().len(), 3);
    assert_eq!(status.failures, vec!["svc.db.sch.orders.broken"]);
    assert_eq!(status.records.len(), 3 - status.failures.len());
}

#[tokio::test]
async fn test_missing_table_and_unlinked_cases_are_failures() {
    let catalog = seed_catalog().await;
    let suite = insert_suite(&catalog, "suite_a").await;
    insert_test_case(&catalog, &suite, "ghost", "<#E::table::svc.db.sch.ghost>").await;
    let unlinked: TestCase = entity(json!({
        "id": Uuid::new_v4(),
        "name": "unlinked",
        "fullyQualifiedName": "unlinked",
        "entityLink": "<#E::table>",
        "testSuite": suite.entity_reference(),
        "testDefinition": suite.entity_reference()
    }));
    catalog.insert(&unlinked).await.unwrap();

    let config = WorkflowConfig::new("TestSuite", "suite_a");
    let mut workflow = TestSuiteWorkflow::new(
        config,
        catalog,
        Box::new(ScriptedExecutor::default()),
        None,
    );
    workflow.run().await.unwrap();

    let mut failures = workflow.status().failures.clone();
    failures.sort();
    assert_eq!(failures, vec!["svc.db.sch.ghost.ghost", "unlinked"]);
    assert!(workflow.status().records.is_empty());
}

#[tokio::test]
async fn test_named_suite_is_used_without_declared_suites() {
    let catalog = seed_catalog().await;
    let named = insert_suite(&catalog, "nightly").await;
    insert_test_case(&catalog, &named, "rows", ORDERS).await;
    let other = insert_suite(&catalog, "other").await;
    insert_test_case(&catalog, &other, "other_rows", ORDERS).await;

    let mut workflow = TestSuiteWorkflow::new(
        WorkflowConfig::new("TestSuite", "nightly"),
        catalog.clone(),
        Box::new(ScriptedExecutor::default()),
        None,
    );
    let suites = workflow.get_test_suite_entity_for_ui_workflow().await.unwrap();
    assert_eq!(suites.unwrap()[0].id, named.id);

    workflow.run().await.unwrap();
    assert_eq!(workflow.status().records, vec!["svc.db.sch.orders.rows"]);
    assert!(catalog.created().await.is_empty());
}

#[tokio::test]
async fn test_sample_source_needs_no_service() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog
        .insert(&table("sample.db.sch.orders", Value::Null))
        .await
        .unwrap();
    let suite = insert_suite(&catalog, "samples").await;
    insert_test_case(
        &catalog,
        &suite,
        "rows",
        "<#E::table::sample.db.sch.orders>",
    )
    .await;

    let mut workflow = TestSuiteWorkflow::new(
        WorkflowConfig::new("sample-data", "samples"),
        catalog.clone(),
        Box::new(ScriptedExecutor::default()),
        None,
    );
    workflow.run().await.unwrap();
    assert_eq!(workflow.status().records.len(), 1);

    let mut workflow = TestSuiteWorkflow::new(
        WorkflowConfig::new("TestSuite", "samples"),
        Arc::new(InMemoryCatalog::new()),
        Box::new(ScriptedExecutor::default()),
        None,
    );
    workflow.run().await.unwrap();
    assert!(workflow.status().records.is_empty());
}

#[tokio::test]
async fn test_sink_receives_results_and_failures_decide_exit() {
    let catalog = seed_catalog().await;
    let config = WorkflowConfig::new("TestSuite", "cli_run").with_test_suite(suite_definition(
        "suite_a",
        vec![
            declared("kept", ORDERS),
            declared("silent", ORDERS),
            declared("rejected", ORDERS),
        ],
    ));
    let sink = RecordingSink {
        rejected: HashSet::from(["svc.db.sch.orders.rejected".to_string()]),
        ..Default::default()
    };
    let records = sink.records.clone();
    let closed = sink.closed.clone();

    let mut workflow = TestSuiteWorkflow::new(
        config,
        catalog,
        Box::new(ScriptedExecutor::default().empty("silent")),
        Some(Box::new(sink)),
    );
    workflow.run().await.unwrap();

    assert_eq!(workflow.status().records.len(), 3);
    assert!(workflow.status().failures.is_empty());

    let written: Vec<_> = records
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.test_case_fqn.clone())
        .collect();
    assert_eq!(written, vec!["svc.db.sch.orders.kept"]);
    assert!(*closed.lock().unwrap());

    assert_eq!(
        workflow.sink_status().unwrap().failures,
        vec!["svc.db.sch.orders.rejected"]
    );
    assert_eq!(workflow.print_status(false), 1);
    match workflow.raise_from_status(false) {
        Err(WorkflowError::Execution { stage, .. }) => assert_eq!(stage, "recording"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_metadata_sink_writes_back_to_catalog() {
    let catalog = seed_catalog().await;
    let config = WorkflowConfig::new("TestSuite", "cli_run").with_test_suite(suite_definition(
        "suite_a",
        vec![TestCaseDefinition {
            name: "row_range".to_string(),
            test_definition_name: "tableRowCountToBeBetween".to_string(),
            entity_link: ORDERS.to_string(),
            description: None,
            parameter_values: vec![
                TestCaseParameterValue::new("minValue", "10"),
                TestCaseParameterValue::new("maxValue", "50"),
            ],
        }],
    ));

    let mut workflow = TestSuiteWorkflow::new(
        config,
        catalog.clone(),
        Box::new(ValidatorRegistry::with_builtin()),
        Some(Box::new(testsuite::MetadataRestSink::new(catalog.clone()))),
    );
    workflow.run().await.unwrap();

    let results = catalog.test_case_results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "svc.db.sch.orders.row_range");
    assert_eq!(results[0].1.test_case_status, TestCaseStatus::Failed);
    assert_eq!(workflow.exit_code(true), 0);
}
