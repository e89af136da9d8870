//! Scenario-driven checks of a policy set against mock data.

/// Runs assertions through a [`crate::simulator::PolicyEngine`] and builds a [`runner::TestReport`].
pub mod runner;
/// Scenario file format.
pub mod scenario;

pub use runner::{run, AssertionFailure, TestHarness, TestReport};
pub use scenario::{Assertion, Check, NamedContext, Scenario};
