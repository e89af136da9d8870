use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::policy::PolicyDefinition;
use crate::simulator::{RestrictiveMode, Row, SessionContext};

/// A self-contained simulation: mock data, sessions, policies and the
/// assertions to check against them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Mock tables.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<Row>>,
    /// Named sessions assertions can refer to.
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    /// Policies under test.
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    /// Checks to run, in order.
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Fixed clock for `now()` and `current_date`.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    /// How restrictive policies are combined.
    #[serde(default)]
    pub restrictive: RestrictiveMode,
}

impl Scenario {
    /// Parse a scenario from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a scenario file.
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// A [`SessionContext`] with the name assertions use to select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Lookup name.
    pub name: String,
    /// Session identity and settings.
    #[serde(flatten)]
    pub context: SessionContext,
}

/// One expectation about the engine's behaviour under a named context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Free-text label shown in failure reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the context to run under.
    pub context: String,
    /// Table the operation targets.
    pub table: String,
    /// Operation and expected outcome.
    #[serde(flatten)]
    pub check: Check,
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(description) = &self.description {
            return f.write_str(description);
        }
        let operation = match self.check {
            Check::Select { .. } => "select",
            Check::CanWrite { .. } => "can_write",
            Check::CanDelete { .. } => "can_delete",
        };
        write!(f, "{operation} on {} as {}", self.table, self.context)
    }
}

/// The operation an assertion performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Check {
    /// Visible rows: their number, their exact content (order-insensitive), or both.
    Select {
        /// Expected number of visible rows.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
        /// Expected visible rows.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<Vec<Row>>,
    },
    /// Whether `row` may be inserted or updated.
    CanWrite {
        /// Candidate row.
        row: Row,
        /// Expected decision.
        expected: bool,
    },
    /// Whether `row` may be deleted.
    CanDelete {
        /// Candidate row.
        row: Row,
        /// Expected decision.
        expected: bool,
    },
}
