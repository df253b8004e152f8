pub mod client;
pub mod config;
pub mod entity_link;
pub mod memory;
pub mod resolver;
#[cfg(feature = "rest")]
pub mod rest;
pub mod types;

pub use client::{CatalogClient, CatalogError, CatalogResult};
pub use config::{AuthProvider, CatalogConfig, SecretsManagerProvider};
pub use entity_link::{EntityLink, EntityLinkError};
pub use memory::InMemoryCatalog;
pub use resolver::EntityResolver;
pub use types::{
    CatalogEntity, Column, ColumnProfile, CreateRequest, CreateTestCaseRequest,
    CreateTestSuiteRequest, DatabaseService, EntityKind, EntityReference, IntervalType,
    ListFilter, ServiceConnection, ServiceKind, Table, TablePartition, TableProfile,
    TableProfilerConfig, TestCase, TestCaseParameterValue, TestCaseResult, TestCaseStatus,
    TestDefinition, TestResultValue, TestSuite,
};

#[cfg(feature = "rest")]
pub use rest::RestCatalogClient;

pub mod prelude {
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::resolver::*;
    pub use crate::types::*;

    #[cfg(feature = "rest")]
    pub use crate::rest::*;
}
