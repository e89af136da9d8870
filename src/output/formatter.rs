use std::path::{Component, Path};

use crate::classifier::ClassifiedPolicy;
use crate::error::OutputError;
use crate::output::{config, report};
use crate::policy::ddl::deploy_script;
use crate::policy::PolicySet;

/// Write `<name>_policies.json`, `<name>_deploy.sql` and `<name>_report.md`
/// into `output_dir`, creating it when needed.
pub fn write_output(
    output_dir: &Path,
    name: &str,
    policies: &PolicySet,
    classified: &[ClassifiedPolicy],
) -> Result<(), OutputError> {
    validate_output_name(name)?;

    std::fs::create_dir_all(output_dir).map_err(|source| OutputError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let definitions = config::rendered_definitions(classified);
    let mut json = serde_json::to_string_pretty(&definitions)?;
    json.push('\n');
    write_file(output_dir, &format!("{name}_policies.json"), &json)?;
    write_file(output_dir, &format!("{name}_deploy.sql"), &deploy_script(policies))?;
    write_file(
        output_dir,
        &format!("{name}_report.md"),
        &report::build_report(classified),
    )?;

    Ok(())
}

fn write_file(dir: &Path, file_name: &str, contents: &str) -> Result<(), OutputError> {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).map_err(|source| OutputError::Io { path, source })
}

/// Reject names that would escape the output directory.
pub fn validate_output_name(name: &str) -> Result<(), OutputError> {
    let invalid = |reason: &'static str| -> Result<(), OutputError> {
        Err(OutputError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        return invalid("must not be empty");
    }
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return invalid("absolute paths are not allowed");
    }
    if candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return invalid("traversal segments are not allowed");
    }
    if name.contains('/') || name.contains('\\') {
        return invalid("path separators are not allowed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_policies;
    use crate::policy::{Policy, PolicyCommand};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}_{nanos}"))
    }

    fn policies() -> PolicySet {
        PolicySet::new(vec![Policy::new(
            "own",
            "docs",
            PolicyCommand::Select,
            "user_id = current_setting('app.current_user_id')",
        )])
        .unwrap()
    }

    #[test]
    fn write_output_reports_directory_creation_errors() {
        let path = unique_path("rlsctl_formatter_file");
        std::fs::write(&path, "not a directory").expect("should create marker file");

        let err = write_output(&path, "output", &policies(), &[])
            .expect_err("directory creation should fail");
        assert!(matches!(err, OutputError::Io { .. }));
    }

    #[test]
    fn write_output_rejects_unsafe_name_paths() {
        let dir = unique_path("rlsctl_formatter_dir");
        for name in ["nested/output", "../escape", "/abs", "  "] {
            let err = write_output(&dir, name, &policies(), &[])
                .expect_err("unsafe output name should fail validation");
            assert!(matches!(err, OutputError::InvalidName { .. }), "{name}");
        }
    }

    #[test]
    fn write_output_writes_all_artifacts_on_success() {
        let dir = unique_path("rlsctl_formatter_ok");
        let set = policies();
        write_output(&dir, "docs", &set, &classify_policies(&set))
            .expect("write_output should succeed");

        let json = std::fs::read_to_string(dir.join("docs_policies.json"))
            .expect("config file should exist");
        let sql =
            std::fs::read_to_string(dir.join("docs_deploy.sql")).expect("deploy file should exist");
        let report =
            std::fs::read_to_string(dir.join("docs_report.md")).expect("report should exist");

        assert!(json.contains("\"helper\": \"currentUserId()\""));
        assert!(sql.contains("ALTER TABLE docs ENABLE ROW LEVEL SECURITY;"));
        assert!(sql.contains("CREATE POLICY own ON docs FOR SELECT TO public"));
        assert!(report.contains("# rlsctl Classification Report"));
    }
}
