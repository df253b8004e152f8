//! Typed access to the catalog.
//!
//! [`CatalogClient`] speaks raw JSON so it can stay object safe. The resolver
//! wraps a shared client and converts between JSON and the entity model.

use crate::client::{CatalogClient, CatalogError, CatalogResult};
use crate::types::{
    CatalogEntity, CreateRequest, DatabaseService, EntityReference, ListFilter,
    ServiceConnection, ServiceKind,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct EntityResolver {
    client: Arc<dyn CatalogClient>,
}

impl EntityResolver {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn CatalogClient> {
        &self.client
    }

    pub async fn get_by_name<T: CatalogEntity>(
        &self,
        fqn: &str,
        fields: &[&str],
    ) -> CatalogResult<Option<T>> {
        debug!("Fetching {} by name: {}", T::KIND, fqn);
        match self.client.get_by_name(T::KIND, fqn, fields).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn list_entities<T: CatalogEntity>(
        &self,
        fields: &[&str],
        filter: &ListFilter,
    ) -> CatalogResult<Vec<T>> {
        debug!("Listing {} with filter {:?}", T::KIND, filter);
        self.client
            .list_entities(T::KIND, fields, filter)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CatalogError::from))
            .collect()
    }

    /// Create or update an entity. The request must describe an entity of kind `T`.
    pub async fn create_or_update<T: CatalogEntity>(
        &self,
        request: impl Into<CreateRequest>,
    ) -> CatalogResult<T> {
        let request = request.into();
        if request.kind() != T::KIND {
            return Err(CatalogError::InvalidRequest {
                message: format!(
                    "cannot create a {} from a {} request",
                    T::KIND,
                    request.kind()
                ),
            });
        }
        debug!("Creating or updating {} {}", T::KIND, request.name());
        let value = self.client.create_or_update(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_entity_reference<T: CatalogEntity>(
        &self,
        fqn: &str,
    ) -> CatalogResult<EntityReference> {
        self.client.get_entity_reference(T::KIND, fqn).await
    }

    pub async fn retrieve_service_connection(
        &self,
        service: &DatabaseService,
        service_kind: ServiceKind,
    ) -> CatalogResult<ServiceConnection> {
        self.client
            .retrieve_service_connection(service, service_kind)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;
    use crate::types::{CreateTestCaseRequest, CreateTestSuiteRequest, TestSuite};

    fn resolver() -> (Arc<InMemoryCatalog>, EntityResolver) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let resolver = EntityResolver::new(catalog.clone());
        (catalog, resolver)
    }

    #[tokio::test]
    async fn test_create_then_find_suite() {
        let (_catalog, resolver) = resolver();

        let missing: Option<TestSuite> = resolver.get_by_name("suite_a", &[]).await.unwrap();
        assert!(missing.is_none());

        let created: TestSuite = resolver
            .create_or_update(CreateTestSuiteRequest {
                name: "suite_a".to_string(),
                description: Some("first".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "suite_a");

        let found: TestSuite = resolver
            .get_by_name("suite_a", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        let reference = resolver
            .get_entity_reference::<TestSuite>("suite_a")
            .await
            .unwrap();
        assert_eq!(reference.id, created.id);
        assert_eq!(reference.entity_type, "testSuite");
        assert_eq!(reference.description.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_create_rejects_mismatched_kind() {
        let (_catalog, resolver) = resolver();
        let reference = EntityReference {
            id: uuid::Uuid::new_v4(),
            entity_type: "testSuite".to_string(),
            name: None,
            fully_qualified_name: None,
            description: None,
        };
        let request = CreateTestCaseRequest {
            name: "tc".to_string(),
            description: None,
            entity_link: "<#E::table::svc.db.sch.orders>".to_string(),
            test_definition: reference.clone(),
            test_suite: reference,
            parameter_values: vec![],
        };

        let result = resolver.create_or_update::<TestSuite>(request).await;
        assert!(matches!(result, Err(CatalogError::InvalidRequest { .. })));
    }
}
