/// DDL rendering: `CREATE POLICY`, `DROP POLICY`, `ENABLE ROW LEVEL SECURITY`.
pub mod ddl;
/// Policy definitions as written in JSON config and scenario files.
pub mod definition;
/// `pg_policies` rows supplied by the introspection layer.
pub mod introspection;
/// Core policy types and the validated policy set.
pub mod model;

pub use definition::{build_policy_set, PolicyDefinition};
pub use introspection::{policies_from_rows, PgPolicyRow};
pub use model::{Policy, PolicyCommand, PolicyMode, PolicySet};
