//! In-memory catalog implementation (for testing, development and dry runs).

use crate::client::{CatalogClient, CatalogError, CatalogResult};
use crate::entity_link;
use crate::types::{
    CatalogEntity, CreateRequest, DatabaseService, EntityKind, ListFilter, ServiceConnection,
    ServiceKind, TestCase, TestCaseResult, TestSuite,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct CatalogState {
    entities: HashMap<EntityKind, BTreeMap<String, Value>>,
    created: Vec<(EntityKind, String)>,
    test_case_results: Vec<(String, TestCaseResult)>,
    failing_creates: HashSet<String>,
    closed: bool,
}

impl CatalogState {
    fn ensure_open(&self) -> CatalogResult<()> {
        if self.closed {
            return Err(CatalogError::Closed);
        }
        Ok(())
    }
}

/// Catalog that keeps every entity as JSON in memory, keyed by FQN.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity as-is, replacing any entity with the same FQN.
    pub async fn insert<T: CatalogEntity>(&self, entity: &T) -> CatalogResult<()> {
        let key = entity
            .fully_qualified_name()
            .unwrap_or(entity.name())
            .to_string();
        let value = serde_json::to_value(entity)?;
        let mut state = self.state.lock().await;
        state.entities.entry(T::KIND).or_default().insert(key, value);
        Ok(())
    }

    /// Make every later create of an entity named `name` fail.
    pub async fn fail_create(&self, name: impl Into<String>) {
        self.state.lock().await.failing_creates.insert(name.into());
    }

    /// Entities created through [`CatalogClient::create_or_update`], in order.
    pub async fn created(&self) -> Vec<(EntityKind, String)> {
        self.state.lock().await.created.clone()
    }

    pub async fn created_count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .await
            .created
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub async fn test_case_results(&self) -> Vec<(String, TestCaseResult)> {
        self.state.lock().await.test_case_results.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    fn test_case_fqn(name: &str, link: &str) -> CatalogResult<String> {
        let table = entity_link::table_fqn(link).ok_or_else(|| CatalogError::InvalidRequest {
            message: format!("entity link has no table: {}", link),
        })?;
        Ok(match entity_link::column_name(link) {
            Some(column) => format!("{}.{}.{}", table, column, name),
            None => format!("{}.{}", table, name),
        })
    }

    fn existing_id(state: &CatalogState, kind: EntityKind, fqn: &str) -> Option<Uuid> {
        state
            .entities
            .get(&kind)
            .and_then(|entities| entities.get(fqn))
            .and_then(|value| value.get("id"))
            .and_then(|id| serde_json::from_value(id.clone()).ok())
    }

    fn matches_filter(value: &Value, filter: &ListFilter) -> bool {
        filter.iter().all(|(key, expected)| {
            let actual = match key.as_str() {
                "testSuiteId" => value.pointer("/testSuite/id"),
                other => value.get(other),
            };
            actual.and_then(Value::as_str) == Some(expected.as_str())
        })
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
        _fields: &[&str],
    ) -> CatalogResult<Option<Value>> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        Ok(state
            .entities
            .get(&kind)
            .and_then(|entities| entities.get(fqn))
            .cloned())
    }

    async fn list_entities(
        &self,
        kind: EntityKind,
        _fields: &[&str],
        filter: &ListFilter,
    ) -> CatalogResult<Vec<Value>> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        Ok(state
            .entities
            .get(&kind)
            .map(|entities| {
                entities
                    .values()
                    .filter(|value| Self::matches_filter(value, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_or_update(&self, request: CreateRequest) -> CatalogResult<Value> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;

        if state.failing_creates.contains(request.name()) {
            return Err(CatalogError::Api {
                status: 400,
                message: format!("rejected create of {}", request.name()),
            });
        }

        let kind = request.kind();
        let (fqn, value) = match request {
            CreateRequest::TestSuite(request) => {
                let fqn = request.name.clone();
                let suite = TestSuite {
                    id: Self::existing_id(&state, kind, &fqn).unwrap_or_else(Uuid::new_v4),
                    fully_qualified_name: Some(fqn.clone()),
                    name: request.name,
                    description: request.description,
                };
                (fqn, serde_json::to_value(suite)?)
            }
            CreateRequest::TestCase(request) => {
                let fqn = Self::test_case_fqn(&request.name, &request.entity_link)?;
                let test_case = TestCase {
                    id: Self::existing_id(&state, kind, &fqn).unwrap_or_else(Uuid::new_v4),
                    fully_qualified_name: Some(fqn.clone()),
                    name: request.name,
                    description: request.description,
                    entity_link: request.entity_link,
                    test_suite: request.test_suite,
                    test_definition: request.test_definition,
                    parameter_values: request.parameter_values,
                };
                (fqn, serde_json::to_value(test_case)?)
            }
        };

        let previous = state
            .entities
            .entry(kind)
            .or_default()
            .insert(fqn.clone(), value.clone());
        if previous.is_none() {
            debug!("Created {} {}", kind, fqn);
            state.created.push((kind, fqn));
        }
        Ok(value)
    }

    async fn retrieve_service_connection(
        &self,
        service: &DatabaseService,
        _service_kind: ServiceKind,
    ) -> CatalogResult<ServiceConnection> {
        self.state.lock().await.ensure_open()?;
        service
            .connection
            .clone()
            .ok_or_else(|| CatalogError::MissingConnection {
                service: service.name.clone(),
            })
    }

    async fn add_test_case_result(
        &self,
        test_case_fqn: &str,
        result: &TestCaseResult,
    ) -> CatalogResult<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let known = state
            .entities
            .get(&EntityKind::TestCase)
            .is_some_and(|cases| cases.contains_key(test_case_fqn));
        if !known {
            return Err(CatalogError::EntityNotFound {
                kind: EntityKind::TestCase,
                fqn: test_case_fqn.to_string(),
            });
        }
        state
            .test_case_results
            .push((test_case_fqn.to_string(), result.clone()));
        Ok(())
    }

    async fn close(&self) -> CatalogResult<()> {
        self.state.lock().await.closed = true;
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "in-memory"
    }
}
