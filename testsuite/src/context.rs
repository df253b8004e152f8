//! Per-table execution context.
//!
//! A context bundles what a test executor needs to evaluate test cases
//! against one table: the service connection, the table entity and the data
//! scope derived from the table's profiler and partition settings.

use catalog::entity_link;
use catalog::{
    CatalogError, DatabaseService, EntityResolver, IntervalType, ServiceConnection, ServiceKind,
    Table, TablePartition,
};
use thiserror::Error;
use tracing::debug;

/// Fields requested when fetching a table for context derivation.
pub const TABLE_FIELDS: [&str; 4] = ["tableProfilerConfig", "tablePartition", "profile", "columns"];

pub const DEFAULT_QUERY_DURATION_DAYS: u32 = 1;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Unsupported partition type {interval_type} on table {table}")]
    UnsupportedPartition {
        table: String,
        interval_type: IntervalType,
    },

    #[error("Partitioned table {table} declares no partition column")]
    MissingPartitionColumn { table: String },

    #[error("Cannot resolve service {service} of table {table}")]
    ServiceUnresolved { table: String, service: String },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type ContextResult<T> = Result<T, ContextError>;

#[derive(Debug, Clone, PartialEq)]
pub struct TablePartitionConfig {
    pub partition_field: String,
    pub interval_type: IntervalType,
    pub query_duration_days: u32,
}

impl TablePartitionConfig {
    /// Only time-based partitions with at least one column are supported.
    /// The first declared column is the partition field.
    pub fn from_partition(table: &str, partition: &TablePartition) -> ContextResult<Self> {
        if !partition.interval_type.is_time_based() {
            return Err(ContextError::UnsupportedPartition {
                table: table.to_string(),
                interval_type: partition.interval_type,
            });
        }
        let partition_field =
            partition
                .columns
                .first()
                .cloned()
                .ok_or_else(|| ContextError::MissingPartitionColumn {
                    table: table.to_string(),
                })?;
        Ok(Self {
            partition_field,
            interval_type: partition.interval_type,
            query_duration_days: DEFAULT_QUERY_DURATION_DAYS,
        })
    }
}

/// Which rows of the table the tests look at.
///
/// A custom query excludes both sampling and partitioning.
#[derive(Debug, Clone, PartialEq)]
pub enum DataScope {
    Query(String),
    Table {
        sample: Option<f64>,
        partition: Option<TablePartitionConfig>,
    },
}

impl DataScope {
    pub fn for_table(table: &Table) -> ContextResult<Self> {
        if let Some(query) = table.profile_query() {
            if table.profile_sample().is_some() {
                debug!(
                    "Table {} has both a profile query and a sample, using the query",
                    table_key(table)
                );
            }
            return Ok(DataScope::Query(query.to_string()));
        }

        let partition = table
            .table_partition
            .as_ref()
            .map(|partition| TablePartitionConfig::from_partition(table_key(table), partition))
            .transpose()?;

        Ok(DataScope::Table {
            sample: table.profile_sample(),
            partition,
        })
    }
}

fn table_key(table: &Table) -> &str {
    table.fully_qualified_name.as_deref().unwrap_or(&table.name)
}

#[derive(Debug, Clone)]
pub struct TableContext {
    /// Absent for sample sources.
    pub service_connection: Option<ServiceConnection>,
    pub table: Table,
    pub scope: DataScope,
}

impl TableContext {
    pub fn table_fqn(&self) -> &str {
        table_key(&self.table)
    }

    pub fn profile_query(&self) -> Option<&str> {
        match &self.scope {
            DataScope::Query(query) => Some(query),
            DataScope::Table { .. } => None,
        }
    }

    pub fn profile_sample(&self) -> Option<f64> {
        match &self.scope {
            DataScope::Table { sample, .. } => *sample,
            DataScope::Query(_) => None,
        }
    }

    pub fn partition(&self) -> Option<&TablePartitionConfig> {
        match &self.scope {
            DataScope::Table { partition, .. } => partition.as_ref(),
            DataScope::Query(_) => None,
        }
    }
}

/// Derives a [`TableContext`] for a table FQN from the catalog.
pub struct TableContextBuilder {
    resolver: EntityResolver,
    resolve_connections: bool,
}

impl TableContextBuilder {
    pub fn new(resolver: EntityResolver) -> Self {
        Self {
            resolver,
            resolve_connections: true,
        }
    }

    /// Skip service connection lookup, as sample sources need none.
    pub fn without_connections(mut self) -> Self {
        self.resolve_connections = false;
        self
    }

    pub async fn build(&self, table_fqn: &str) -> ContextResult<TableContext> {
        let service_connection = if self.resolve_connections {
            Some(self.service_connection(table_fqn).await?)
        } else {
            None
        };

        let table: Table = self
            .resolver
            .get_by_name(table_fqn, &TABLE_FIELDS)
            .await?
            .ok_or_else(|| ContextError::TableNotFound {
                table: table_fqn.to_string(),
            })?;

        let scope = DataScope::for_table(&table)?;
        debug!("Derived scope for {}: {:?}", table_fqn, scope);

        Ok(TableContext {
            service_connection,
            table,
            scope,
        })
    }

    async fn service_connection(&self, table_fqn: &str) -> ContextResult<ServiceConnection> {
        let unresolved = |service: &str| ContextError::ServiceUnresolved {
            table: table_fqn.to_string(),
            service: service.to_string(),
        };

        let service_name = entity_link::service_name(table_fqn).ok_or_else(|| unresolved(""))?;
        let service: DatabaseService = self
            .resolver
            .get_by_name(&service_name, &["connection"])
            .await?
            .ok_or_else(|| unresolved(&service_name))?;

        Ok(self
            .resolver
            .retrieve_service_connection(&service, ServiceKind::DatabaseService)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{InMemoryCatalog, TableProfilerConfig};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn table(config: Option<TableProfilerConfig>, partition: Option<TablePartition>) -> Table {
        Table {
            id: Uuid::new_v4(),
            name: "orders".to_string(),
            fully_qualified_name: Some("svc.db.sch.orders".to_string()),
            columns: vec![],
            table_profiler_config: config,
            table_partition: partition,
            profile: None,
        }
    }

    fn partition(interval_type: IntervalType, columns: &[&str]) -> TablePartition {
        TablePartition {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            interval_type,
            interval: Some(1),
        }
    }

    #[test]
    fn test_query_wins_over_sample_and_partition() {
        let table = table(
            Some(TableProfilerConfig {
                profile_sample: Some(20.0),
                profile_query: Some("select * from orders".to_string()),
            }),
            Some(partition(IntervalType::IntegerRange, &["id"])),
        );
        let scope = DataScope::for_table(&table).unwrap();
        assert_eq!(scope, DataScope::Query("select * from orders".to_string()));
    }

    #[test]
    fn test_sample_with_time_partition() {
        let table = table(
            Some(TableProfilerConfig {
                profile_sample: Some(20.0),
                profile_query: None,
            }),
            Some(partition(IntervalType::TimeUnit, &["created_at", "id"])),
        );
        match DataScope::for_table(&table).unwrap() {
            DataScope::Table { sample, partition } => {
                assert_eq!(sample, Some(20.0));
                let partition = partition.unwrap();
                assert_eq!(partition.partition_field, "created_at");
                assert_eq!(partition.query_duration_days, DEFAULT_QUERY_DURATION_DAYS);
            }
            other => panic!("unexpected scope {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_partitions() {
        for interval_type in [
            IntervalType::IntegerRange,
            IntervalType::ColumnValue,
            IntervalType::Other,
        ] {
            let table = table(None, Some(partition(interval_type, &["id"])));
            assert!(matches!(
                DataScope::for_table(&table),
                Err(ContextError::UnsupportedPartition { .. })
            ));
        }

        let table = table(None, Some(partition(IntervalType::IngestionTime, &[])));
        assert!(matches!(
            DataScope::for_table(&table),
            Err(ContextError::MissingPartitionColumn { .. })
        ));
    }

    async fn builder_with_table(with_service: bool) -> TableContextBuilder {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert(&table(None, None)).await.unwrap();
        if with_service {
            let service: DatabaseService = serde_json::from_value(json!({
                "id": Uuid::new_v4(),
                "name": "svc",
                "fullyQualifiedName": "svc",
                "connection": {"config": {"type": "Postgres"}}
            }))
            .unwrap();
            catalog.insert(&service).await.unwrap();
        }
        TableContextBuilder::new(EntityResolver::new(catalog))
    }

    #[tokio::test]
    async fn test_build_resolves_connection_and_table() {
        let builder = builder_with_table(true).await;
        let context = builder.build("svc.db.sch.orders").await.unwrap();
        assert_eq!(context.table_fqn(), "svc.db.sch.orders");
        assert_eq!(
            context.service_connection.as_ref().unwrap().config["type"],
            "Postgres"
        );
        assert_eq!(context.profile_sample(), None);
        assert!(context.partition().is_none());
    }

    #[tokio::test]
    async fn test_build_errors() {
        let builder = builder_with_table(false).await;
        assert!(matches!(
            builder.build("svc.db.sch.orders").await,
            Err(ContextError::ServiceUnresolved { .. })
        ));

        let builder = builder.without_connections();
        let context = builder.build("svc.db.sch.orders").await.unwrap();
        assert!(context.service_connection.is_none());

        assert!(matches!(
            builder.build("svc.db.sch.missing").await,
            Err(ContextError::TableNotFound { .. })
        ));
    }
}
