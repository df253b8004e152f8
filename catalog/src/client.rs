use crate::types::{
    CreateRequest, DatabaseService, EntityKind, EntityReference, ListFilter, ServiceConnection,
    ServiceKind, TestCaseResult,
};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[cfg(feature = "rest")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} not found: {fqn}")]
    EntityNotFound { kind: EntityKind, fqn: String },

    #[error("No connection available for service {service}")]
    MissingConnection { service: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Catalog API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Catalog client is closed")]
    Closed,

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Operations the workflow consumes from the metadata catalog.
///
/// The trait is object safe and speaks raw JSON so implementations stay
/// independent of the entity model; [`crate::EntityResolver`] layers typed
/// access on top of it.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch an entity by fully qualified name. `Ok(None)` when it does not exist.
    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
        fields: &[&str],
    ) -> CatalogResult<Option<Value>>;

    /// List every entity of `kind` matching `filter`.
    async fn list_entities(
        &self,
        kind: EntityKind,
        fields: &[&str],
        filter: &ListFilter,
    ) -> CatalogResult<Vec<Value>>;

    async fn create_or_update(&self, request: CreateRequest) -> CatalogResult<Value>;

    /// Resolve a reference to an existing entity.
    async fn get_entity_reference(
        &self,
        kind: EntityKind,
        fqn: &str,
    ) -> CatalogResult<EntityReference> {
        let value = self
            .get_by_name(kind, fqn, &[])
            .await?
            .ok_or_else(|| CatalogError::EntityNotFound {
                kind,
                fqn: fqn.to_string(),
            })?;
        Ok(EntityReference::from_entity_value(kind, &value)?)
    }

    /// Resolve the connection of a service through the secrets manager.
    async fn retrieve_service_connection(
        &self,
        service: &DatabaseService,
        service_kind: ServiceKind,
    ) -> CatalogResult<ServiceConnection>;

    async fn add_test_case_result(
        &self,
        test_case_fqn: &str,
        result: &TestCaseResult,
    ) -> CatalogResult<()>;

    async fn close(&self) -> CatalogResult<()>;

    fn client_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    struct MockClient {
        suite_id: Uuid,
    }

    #[async_trait]
    impl CatalogClient for MockClient {
        async fn get_by_name(
            &self,
            kind: EntityKind,
            fqn: &str,
            _fields: &[&str],
        ) -> CatalogResult<Option<Value>> {
            if kind == EntityKind::TestSuite && fqn == "known" {
                return Ok(Some(json!({"id": self.suite_id, "name": "known"})));
            }
            Ok(None)
        }

        async fn list_entities(
            &self,
            _kind: EntityKind,
            _fields: &[&str],
            _filter: &ListFilter,
        ) -> CatalogResult<Vec<Value>> {
            Ok(vec![])
        }

        async fn create_or_update(&self, request: CreateRequest) -> CatalogResult<Value> {
            Err(CatalogError::InvalidRequest {
                message: format!("read-only mock cannot create {}", request.name()),
            })
        }

        async fn retrieve_service_connection(
            &self,
            service: &DatabaseService,
            _service_kind: ServiceKind,
        ) -> CatalogResult<ServiceConnection> {
            Err(CatalogError::MissingConnection {
                service: service.name.clone(),
            })
        }

        async fn add_test_case_result(
            &self,
            _test_case_fqn: &str,
            _result: &TestCaseResult,
        ) -> CatalogResult<()> {
            Ok(())
        }

        async fn close(&self) -> CatalogResult<()> {
            Ok(())
        }

        fn client_name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_default_entity_reference() {
        let client = MockClient {
            suite_id: Uuid::new_v4(),
        };

        let reference = client
            .get_entity_reference(EntityKind::TestSuite, "known")
            .await
            .unwrap();
        assert_eq!(reference.id, client.suite_id);
        assert_eq!(reference.entity_type, "testSuite");

        let missing = client
            .get_entity_reference(EntityKind::TestSuite, "unknown")
            .await;
        assert!(matches!(
            missing,
            Err(CatalogError::EntityNotFound {
                kind: EntityKind::TestSuite,
                ..
            })
        ));
        assert_eq!(client.client_name(), "mock");
    }
}
