//! Reconciliation of declared test cases against the catalog.

use crate::config::{TestCaseDefinition, TestSuiteDefinition};
use catalog::{
    CatalogResult, CreateTestCaseRequest, EntityResolver, TestCase, TestDefinition, TestSuite,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A declared test case together with the suite declaring it.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredTestCase<'a> {
    pub test_case: &'a TestCaseDefinition,
    pub suite: &'a TestSuiteDefinition,
}

impl<'a> DeclaredTestCase<'a> {
    pub fn name(&self) -> &'a str {
        &self.test_case.name
    }
}

/// Every declared test case in declaration order.
pub fn declared_test_cases(suites: &[TestSuiteDefinition]) -> Vec<DeclaredTestCase<'_>> {
    suites
        .iter()
        .flat_map(|suite| {
            suite
                .test_cases
                .iter()
                .map(move |test_case| DeclaredTestCase { test_case, suite })
        })
        .collect()
}

/// Declared test cases whose name is not stored yet.
///
/// Matching is by name only. When a name is declared more than once, the
/// first declaration is kept.
pub fn pending_test_cases<'a>(
    declared: &[DeclaredTestCase<'a>],
    stored: &[TestCase],
) -> Vec<DeclaredTestCase<'a>> {
    let stored_names: HashSet<&str> = stored.iter().map(|tc| tc.name.as_str()).collect();
    let mut seen = HashSet::new();

    declared
        .iter()
        .filter(|declared| !stored_names.contains(declared.name()))
        .filter(|declared| {
            let first = seen.insert(declared.name());
            if !first {
                debug!(
                    "Test case {} declared again in suite {}, keeping the first declaration",
                    declared.name(),
                    declared.suite.name
                );
            }
            first
        })
        .copied()
        .collect()
}

pub struct TestCaseReconciler {
    resolver: EntityResolver,
}

impl TestCaseReconciler {
    pub fn new(resolver: EntityResolver) -> Self {
        Self { resolver }
    }

    /// Create the declared test cases missing from `stored` and return the
    /// working set: stored test cases followed by the created ones.
    pub async fn reconcile(
        &self,
        suites: &[TestSuiteDefinition],
        mut stored: Vec<TestCase>,
    ) -> Vec<TestCase> {
        let declared = declared_test_cases(suites);
        let pending = pending_test_cases(&declared, &stored);
        if pending.is_empty() {
            debug!("All {} declared test cases already exist", declared.len());
            return stored;
        }

        info!("Creating {} missing test cases", pending.len());
        stored.extend(self.create(&pending).await);
        stored
    }

    /// Create each pending test case. Failures are logged and skipped.
    pub async fn create(&self, pending: &[DeclaredTestCase<'_>]) -> Vec<TestCase> {
        let mut created = Vec::with_capacity(pending.len());
        for declared in pending {
            match self.create_one(declared).await {
                Ok(test_case) => {
                    debug!("Created test case {}", test_case.fqn());
                    created.push(test_case);
                }
                Err(e) => {
                    warn!("Failed to create test case {}: {}", declared.name(), e);
                    debug!("Create failure detail for {}: {:?}", declared.name(), e);
                }
            }
        }
        created
    }

    async fn create_one(&self, declared: &DeclaredTestCase<'_>) -> CatalogResult<TestCase> {
        let definition = declared.test_case;
        let test_definition = self
            .resolver
            .get_entity_reference::<TestDefinition>(&definition.test_definition_name)
            .await?;
        let test_suite = self
            .resolver
            .get_entity_reference::<TestSuite>(&declared.suite.name)
            .await?;

        self.resolver
            .create_or_update(CreateTestCaseRequest {
                name: definition.name.clone(),
                description: definition.description.clone(),
                entity_link: definition.entity_link.clone(),
                test_definition,
                test_suite,
                parameter_values: definition.parameter_values.clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{EntityReference, TestCaseParameterValue};
    use uuid::Uuid;

    fn definition(name: &str) -> TestCaseDefinition {
        TestCaseDefinition {
            name: name.to_string(),
            test_definition_name: "tableRowCountToEqual".to_string(),
            entity_link: "<#E::table::svc.db.sch.orders>".to_string(),
            description: None,
            parameter_values: vec![TestCaseParameterValue::new("value", "1")],
        }
    }

    fn suite(name: &str, cases: &[&str]) -> TestSuiteDefinition {
        TestSuiteDefinition {
            name: name.to_string(),
            description: None,
            test_cases: cases.iter().map(|c| definition(c)).collect(),
        }
    }

    fn stored(name: &str) -> TestCase {
        let reference = EntityReference {
            id: Uuid::new_v4(),
            entity_type: "testSuite".to_string(),
            name: Some("a".to_string()),
            fully_qualified_name: None,
            description: None,
        };
        TestCase {
            id: Uuid::new_v4(),
            name: name.to_string(),
            fully_qualified_name: None,
            description: None,
            entity_link: "<#E::table::svc.db.sch.orders>".to_string(),
            test_suite: reference.clone(),
            test_definition: reference,
            parameter_values: vec![],
        }
    }

    #[test]
    fn test_pending_is_declared_minus_stored() {
        let suites = vec![suite("a", &["one", "two"]), suite("b", &["three"])];
        let declared = declared_test_cases(&suites);
        assert_eq!(declared.len(), 3);

        let pending = pending_test_cases(&declared, &[stored("one")]);
        let names: Vec<_> = pending.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["two", "three"]);
        assert_eq!(pending[1].suite.name, "b");
    }

    #[test]
    fn test_duplicate_declarations_keep_first() {
        let suites = vec![suite("a", &["dup", "x"]), suite("b", &["dup"])];
        let declared = declared_test_cases(&suites);
        let pending = pending_test_cases(&declared, &[]);

        let names: Vec<_> = pending.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["dup", "x"]);
        assert_eq!(pending[0].suite.name, "a");
    }

    #[test]
    fn test_nothing_pending_when_all_stored() {
        let suites = vec![suite("a", &["one"])];
        let declared = declared_test_cases(&suites);
        assert!(pending_test_cases(&declared, &[stored("one"), stored("other")]).is_empty());
    }
}
