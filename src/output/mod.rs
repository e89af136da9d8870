/// Rendered policy config: definitions carrying helper calls.
pub mod config;
/// Writes the rendered config, deploy SQL and report to disk.
pub mod formatter;
/// Builds a Markdown confidence-summary report from classified policies.
pub mod report;
