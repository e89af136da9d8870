use crate::classifier::{render, ClassifiedExpression, ClassifiedPolicy, Pattern};

/// Build a markdown report: one row per policy plus a review list of
/// predicates that were not mapped to a single idiom.
pub fn build_report(policies: &[ClassifiedPolicy]) -> String {
    let mut lines = vec![
        "# rlsctl Classification Report".to_string(),
        String::new(),
        "## Confidence Summary".to_string(),
        String::new(),
        "| Table | Policy | Command | Mode | Pattern | Confidence | Helper |".to_string(),
        "|-------|--------|---------|------|---------|------------|--------|".to_string(),
    ];

    for cp in policies {
        let c = &cp.using_classification;
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {:.2} | `{}` |",
            cell(&cp.policy.table),
            cell(&cp.policy.name),
            cp.policy.command,
            cp.policy.mode(),
            c.pattern.name(),
            cp.min_confidence(),
            cell(&render(c)),
        ));
    }

    let review: Vec<(&ClassifiedPolicy, &str, &ClassifiedExpression)> = policies
        .iter()
        .flat_map(|cp| {
            let using = std::iter::once(("USING", &cp.using_classification));
            let check = cp
                .with_check_classification
                .iter()
                .map(|c| ("WITH CHECK", c));
            using.chain(check).map(move |(clause, c)| (cp, clause, c))
        })
        .filter(|(_, _, c)| matches!(c.pattern, Pattern::Custom { .. } | Pattern::Complex { .. }))
        .collect();

    if !review.is_empty() {
        lines.push(String::new());
        lines.push("## Needs review".to_string());
        lines.push(String::new());
        for (cp, clause, c) in review {
            let note = match &c.pattern {
                Pattern::Custom { reason } => reason.clone(),
                Pattern::Complex { op, parts } => format!(
                    "{op} expression, only {} part(s) recognized; the helper keeps the raw SQL",
                    parts.len()
                ),
                _ => String::new(),
            };
            lines.push(format!(
                "- **{}.{}** ({clause}): `{}`: {note}",
                cp.policy.table, cp.policy.name, c.raw
            ));
        }
    }

    let mut report = lines.join("\n");
    report.push('\n');
    report
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
