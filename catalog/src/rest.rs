use crate::client::{CatalogClient, CatalogError, CatalogResult};
use crate::config::{AuthProvider, CatalogConfig};
use crate::types::{
    CreateRequest, DatabaseService, EntityKind, ListFilter, ServiceConnection, ServiceKind,
    TestCaseResult,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    after: Option<String>,
}

/// Catalog client for the OpenMetadata-style REST API.
pub struct RestCatalogClient {
    http_client: reqwest::Client,
    base_url: Url,
    config: CatalogConfig,
    closed: AtomicBool,
}

impl RestCatalogClient {
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        config
            .validate()
            .map_err(|message| CatalogError::InvalidConfig { message })?;

        let base = format!("{}/v1/", config.host_port.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| CatalogError::InvalidConfig {
            message: format!("Invalid host port {}: {}", config.host_port, e),
        })?;

        let mut headers = HeaderMap::new();
        if config.auth_provider == AuthProvider::Openmetadata {
            let token = config.jwt_token.as_deref().unwrap_or_default();
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                CatalogError::InvalidConfig {
                    message: format!("Invalid JWT token: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| CatalogError::Unknown {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url,
            config,
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_default_config() -> CatalogResult<Self> {
        Self::new(CatalogConfig::default())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build `{base}/{collection}/{segments...}` with every segment percent-encoded.
    fn url(&self, collection: &str, segments: &[&str]) -> CatalogResult<Url> {
        let mut url = self
            .base_url
            .join(collection)
            .map_err(|e| CatalogError::InvalidRequest {
                message: format!("Invalid collection {}: {}", collection, e),
            })?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| CatalogError::InvalidRequest {
                    message: format!("Cannot extend URL of collection {}", collection),
                })?
                .pop_if_empty()
                .extend(segments);
        }
        Ok(url)
    }

    fn ensure_open(&self) -> CatalogResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CatalogError::Closed);
        }
        Ok(())
    }

    fn map_send_error(e: reqwest::Error) -> CatalogError {
        if e.is_timeout() {
            CatalogError::ServiceUnavailable {
                message: "Request timeout".to_string(),
            }
        } else if e.is_connect() {
            CatalogError::ServiceUnavailable {
                message: "Cannot connect to the catalog".to_string(),
            }
        } else {
            CatalogError::Network(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> CatalogResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(CatalogError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_page(
        &self,
        kind: EntityKind,
        fields: &[&str],
        filter: &ListFilter,
        after: Option<&str>,
    ) -> CatalogResult<ListResponse> {
        let mut query: Vec<(&str, String)> = vec![("limit", self.config.page_size.to_string())];
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }
        query.extend(filter.iter().map(|(k, v)| (k.as_str(), v.clone())));
        if let Some(cursor) = after {
            query.push(("after", cursor.to_string()));
        }

        let response = self
            .http_client
            .get(self.url(kind.collection(), &[])?)
            .query(&query)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogClient for RestCatalogClient {
    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
        fields: &[&str],
    ) -> CatalogResult<Option<Value>> {
        self.ensure_open()?;
        debug!("GET {} by name {}", kind, fqn);

        let mut request = self
            .http_client
            .get(self.url(kind.collection(), &["name", fqn])?);
        if !fields.is_empty() {
            request = request.query(&[("fields", fields.join(","))]);
        }

        let response = request.send().await.map_err(Self::map_send_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} {} not found", kind, fqn);
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn list_entities(
        &self,
        kind: EntityKind,
        fields: &[&str],
        filter: &ListFilter,
    ) -> CatalogResult<Vec<Value>> {
        self.ensure_open()?;

        let mut entities = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self
                .fetch_page(kind, fields, filter, after.as_deref())
                .await?;
            entities.extend(page.data);
            after = page.paging.and_then(|p| p.after);
            if after.is_none() {
                break;
            }
        }

        info!("Listed {} {} entities", entities.len(), kind);
        Ok(entities)
    }

    async fn create_or_update(&self, request: CreateRequest) -> CatalogResult<Value> {
        self.ensure_open()?;
        debug!("PUT {} {}", request.kind(), request.name());

        let response = self
            .http_client
            .put(self.url(request.kind().collection(), &[])?)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn retrieve_service_connection(
        &self,
        service: &DatabaseService,
        service_kind: ServiceKind,
    ) -> CatalogResult<ServiceConnection> {
        self.ensure_open()?;

        // Noop secrets manager: the connection lives on the service entity.
        if let Some(connection) = &service.connection {
            return Ok(connection.clone());
        }

        debug!(
            "Connection of {} {} not embedded, fetching it",
            service_kind, service.name
        );
        let fetched = self
            .get_by_name(EntityKind::DatabaseService, &service.name, &["connection"])
            .await?
            .and_then(|mut value| value.get_mut("connection").map(Value::take))
            .filter(|connection| !connection.is_null());

        match fetched {
            Some(connection) => Ok(serde_json::from_value(connection)?),
            None => Err(CatalogError::MissingConnection {
                service: service.name.clone(),
            }),
        }
    }

    async fn add_test_case_result(
        &self,
        test_case_fqn: &str,
        result: &TestCaseResult,
    ) -> CatalogResult<()> {
        self.ensure_open()?;
        debug!("PUT test case result for {}", test_case_fqn);

        let response = self
            .http_client
            .put(self.url(
                EntityKind::TestCase.collection(),
                &[test_case_fqn, "testCaseResult"],
            )?)
            .json(result)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn close(&self) -> CatalogResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed catalog client for {}", self.base_url);
        }
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "rest"
    }
}
