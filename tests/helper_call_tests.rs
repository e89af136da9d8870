use rlsctl::classifier::helper_call::{canonical_sql, parse};
use rlsctl::classifier::{classify, render, HelperCall, Pattern};
use rlsctl::error::ConfigurationError;

#[test]
fn constant_predicates_render_as_zero_argument_calls() {
    for sql in ["", "true", "TRUE", " (true) "] {
        assert_eq!(render(&classify(sql)), "publicAccess()", "{sql:?}");
    }
    assert_eq!(render(&classify("false")), "noAccess()");
}

#[test]
fn default_arguments_are_omitted() {
    let cases = [
        ("user_id = current_setting('app.current_user_id')::uuid", "currentUserId()"),
        ("tenant_id = current_setting('app.tenant_id')::uuid", "tenantId()"),
        ("created_at >= current_date - interval '90 days'", "recentData()"),
        ("user_id = owner_id", "ownerOnly()"),
    ];
    for (sql, helper) in cases {
        assert_eq!(render(&classify(sql)), helper, "{sql}");
    }
}

#[test]
fn non_default_arguments_are_explicit() {
    let cases = [
        (
            "author_id = current_setting('app.current_user_id')::uuid",
            "currentUserId(\"author_id\")",
        ),
        ("org_id = current_setting('app.tenant_id')::uuid", "tenantId(\"org_id\")"),
        ("current_setting('app.user_role') = 'admin'", "roleCheck(\"admin\")"),
        ("created_at >= current_date - interval '30 days'", "recentData(\"created_at\", 30)"),
        ("published_at >= current_date - interval '90 days'", "recentData(\"published_at\")"),
        ("seen_at >= now() - interval '2 hours'", "timeWindow(\"seen_at\", 2)"),
        ("user_id = creator_id", "ownerOnly(\"user_id\", \"creator_id\")"),
        ("member_id = owner_id", "ownerOnly(\"member_id\")"),
    ];
    for (sql, helper) in cases {
        assert_eq!(render(&classify(sql)), helper, "{sql}");
    }
}

#[test]
fn custom_predicates_pass_through_quoted() {
    let sql = r#"auth.has_permission('docs.read') AND "Title" <> 'x'"#;
    assert_eq!(
        render(&classify(sql)),
        r#""auth.has_permission('docs.read') AND \"Title\" <> 'x'""#
    );
}

#[test]
fn complex_predicates_keep_raw_sql_and_a_marker() {
    let sql = "current_setting('app.user_role') = 'admin' OR is_public";
    let rendered = render(&classify(sql));
    assert!(rendered.starts_with(&format!("\"{sql}\" /* complex: OR of 1")), "{rendered}");

    assert_eq!(parse(&rendered).unwrap(), HelperCall::Raw(sql.to_string()));
}

#[test]
fn canonical_sql_classifies_back_to_the_same_pattern() {
    let patterns = [
        Pattern::PublicAccess,
        Pattern::NoAccess,
        Pattern::CurrentUserId {
            column: "author_id".into(),
        },
        Pattern::TenantId {
            column: "org_id".into(),
        },
        Pattern::RoleCheck {
            role: "O'Brien".into(),
        },
        Pattern::RecentData {
            column: "created_at".into(),
            days: 14,
        },
        Pattern::TimeWindow {
            column: "seen_at".into(),
            hours: 6,
        },
        Pattern::OwnerOnly {
            user_column: "user_id".into(),
            owner_column: "owner_id".into(),
        },
    ];
    for pattern in patterns {
        let sql = canonical_sql(&pattern).unwrap();
        assert_eq!(classify(&sql).pattern, pattern, "{sql}");
    }
}

#[test]
fn rendered_helpers_parse_back() {
    for sql in [
        "author_id = current_setting('app.current_user_id')::uuid",
        "current_setting('app.user_role') = 'support \"tier 2\"'",
        "created_at >= current_date - interval '30 days'",
        "seen_at >= now() - interval '2 hours'",
        "lower(email) = 'x'",
    ] {
        let classified = classify(sql);
        let helper = parse(&render(&classified)).unwrap();
        match helper {
            HelperCall::Idiom(pattern) => assert_eq!(pattern, classified.pattern, "{sql}"),
            HelperCall::Raw(raw) => assert_eq!(raw, sql),
        }
    }
}

#[test]
fn malformed_helpers_are_configuration_errors() {
    for input in [
        "",
        "currentUserId(",
        "roleCheck()",
        "timeWindow(\"seen_at\")",
        "recentData(30)",
        "unknownHelper()",
        "\"unterminated",
        "publicAccess() trailing",
    ] {
        assert!(
            matches!(parse(input), Err(ConfigurationError::InvalidHelper { .. })),
            "{input:?} should be rejected"
        );
    }
}
