use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome bookkeeping for one stage of the workflow (processor or sink).
///
/// Keys are test case fully qualified names. A key reaching execution ends in
/// exactly one of `records` or `failures`; warnings are tracked on the side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub records: Vec<String>,
    pub warnings: Vec<String>,
    pub failures: Vec<String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&mut self, key: impl Into<String>) {
        self.records.push(key.into());
    }

    pub fn warning(&mut self, key: impl Into<String>) {
        self.warnings.push(key.into());
    }

    pub fn failure(&mut self, key: impl Into<String>) {
        self.failures.push(key.into());
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether this stage should fail the run.
    pub fn is_failed(&self, raise_warnings: bool) -> bool {
        self.has_failures() || (raise_warnings && self.has_warnings())
    }

    /// Percentage of keys that were processed, `100.0` when nothing ran.
    pub fn success_rate(&self) -> f64 {
        let total = self.records.len() + self.failures.len();
        if total == 0 {
            return 100.0;
        }
        self.records.len() as f64 * 100.0 / total as f64
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed records: {}", self.records.len())?;
        writeln!(f, "Warnings: {}", self.warnings.len())?;
        for warning in &self.warnings {
            writeln!(f, "  - {}", warning)?;
        }
        writeln!(f, "Failures: {}", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "  - {}", failure)?;
        }
        write!(f, "Success rate: {:.1}%", self.success_rate())
    }
}
