use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::harness::scenario::{Assertion, Check, Scenario};
use crate::policy::build_policy_set;
use crate::simulator::{PolicyEngine, Row, SessionContext};

/// Outcome of running every assertion of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    /// `true` when no assertion failed.
    pub passed: bool,
    /// Number of assertions run.
    pub total: usize,
    /// One entry per failed assertion.
    pub failures: Vec<AssertionFailure>,
}

/// A failed assertion with what was observed and what was expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionFailure {
    /// Label of the assertion.
    pub assertion: String,
    /// Observed value.
    pub actual: Value,
    /// Expected value.
    pub expected: Value,
    /// Human-readable explanation.
    pub message: String,
}

/// A policy engine plus the named sessions and assertions of one scenario.
#[derive(Debug, Clone)]
pub struct TestHarness {
    engine: PolicyEngine,
    contexts: BTreeMap<String, SessionContext>,
    assertions: Vec<Assertion>,
}

impl TestHarness {
    /// Build the engine for a scenario. Invalid policies fail here.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ConfigurationError> {
        let policies = build_policy_set(scenario.policies.iter().cloned())?;
        let mut engine = PolicyEngine::new(policies).with_restrictive_mode(scenario.restrictive);
        for (table, rows) in &scenario.data {
            engine = engine.with_table(table, rows.clone());
        }
        if let Some(now) = scenario.now {
            engine = engine.with_clock(now);
        }
        let contexts = scenario
            .contexts
            .iter()
            .map(|c| (c.name.clone(), c.context.clone()))
            .collect();
        Ok(Self {
            engine,
            contexts,
            assertions: scenario.assertions.clone(),
        })
    }

    /// Run every assertion in order. A reference to an undefined context
    /// is recorded as a failure and the run continues.
    pub fn run(&mut self) -> TestReport {
        let mut failures = Vec::new();
        for assertion in &self.assertions {
            let Some(context) = self.contexts.get(&assertion.context) else {
                failures.push(AssertionFailure {
                    assertion: assertion.to_string(),
                    actual: Value::Null,
                    expected: json!(assertion.context),
                    message: format!("context '{}' is not defined", assertion.context),
                });
                continue;
            };
            self.engine.set_context(context.clone());
            match check(&self.engine, assertion) {
                Some(failure) => {
                    debug!(assertion = %assertion, message = %failure.message, "assertion failed");
                    failures.push(failure);
                }
                None => debug!(assertion = %assertion, "assertion passed"),
            }
        }

        let total = self.assertions.len();
        info!(total, failed = failures.len(), "scenario finished");
        TestReport {
            passed: failures.is_empty(),
            total,
            failures,
        }
    }
}

/// Build a harness for `scenario` and run it.
pub fn run(scenario: &Scenario) -> Result<TestReport, ConfigurationError> {
    Ok(TestHarness::from_scenario(scenario)?.run())
}

fn check(engine: &PolicyEngine, assertion: &Assertion) -> Option<AssertionFailure> {
    let failure = |actual: Value, expected: Value, message: String| AssertionFailure {
        assertion: assertion.to_string(),
        actual,
        expected,
        message,
    };

    match &assertion.check {
        Check::Select { count, rows } => {
            let visible = engine.select(&assertion.table);
            if count.is_none() && rows.is_none() {
                return Some(failure(
                    json!(visible.len()),
                    Value::Null,
                    "select assertion needs 'count' or 'rows'".to_string(),
                ));
            }
            if let Some(count) = *count {
                if visible.len() != count {
                    return Some(failure(
                        json!(visible.len()),
                        json!(count),
                        format!("expected {count} visible row(s), got {}", visible.len()),
                    ));
                }
            }
            if let Some(expected) = rows {
                if canonical(&visible) != canonical(expected) {
                    return Some(failure(
                        json!(visible),
                        json!(expected),
                        "visible rows differ from the expected rows".to_string(),
                    ));
                }
            }
            None
        }
        Check::CanWrite { row, expected } => {
            let actual = engine.can_write(&assertion.table, row);
            (actual != *expected).then(|| {
                failure(
                    json!(actual),
                    json!(expected),
                    format!("expected can_write to be {expected}, got {actual}"),
                )
            })
        }
        Check::CanDelete { row, expected } => {
            let actual = engine.can_delete(&assertion.table, row);
            (actual != *expected).then(|| {
                failure(
                    json!(actual),
                    json!(expected),
                    format!("expected can_delete to be {expected}, got {actual}"),
                )
            })
        }
    }
}

fn canonical(rows: &[Row]) -> Vec<String> {
    let mut out: Vec<String> = rows.iter().map(|r| Value::Object(r.clone()).to_string()).collect();
    out.sort();
    out
}
