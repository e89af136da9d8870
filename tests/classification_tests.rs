use rlsctl::classifier::{classify, classify_policies, BoolOp, Pattern};

mod support;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn recent_data_matches_scenario_d() {
    let c = classify("created_at >= current_date - interval '30 days'");
    assert_eq!(
        c.pattern,
        Pattern::RecentData {
            column: "created_at".to_string(),
            days: 30,
        }
    );
    assert!(approx(c.confidence, 0.8));
    assert_eq!(c.params()["column"], "created_at");
    assert_eq!(c.params()["days"], 30);
}

#[test]
fn every_idiom_is_recognized_with_its_confidence() {
    let cases = [
        ("author_id = current_setting('app.current_user_id')::uuid", "currentUserId", 0.9),
        ("author_id = current_setting('app.current_user_id')::text", "currentUserId", 0.9),
        ("org_id = current_setting('app.tenant_id')::uuid", "tenantId", 0.9),
        ("current_setting('app.user_role') = 'editor'", "roleCheck", 0.9),
        ("created_at >= current_date - INTERVAL '7 days'", "recentData", 0.8),
        ("seen_at >= now() - interval '2 hours'", "timeWindow", 0.8),
        ("user_id = owner_id", "ownerOnly", 0.6),
    ];
    for (sql, name, confidence) in cases {
        let c = classify(sql);
        assert_eq!(c.pattern.name(), name, "{sql}");
        assert!(approx(c.confidence, confidence), "{sql}: {}", c.confidence);
        assert_eq!(c.raw, sql);
    }
}

#[test]
fn keywords_are_case_insensitive_but_identifiers_keep_their_case() {
    let c = classify("\"AuthorId\" = CURRENT_SETTING('app.current_user_id')");
    assert_eq!(
        c.pattern,
        Pattern::CurrentUserId {
            column: "AuthorId".to_string()
        }
    );

    let c = classify("CURRENT_SETTING('app.user_role') = 'Billing Admin'");
    assert_eq!(
        c.pattern,
        Pattern::RoleCheck {
            role: "Billing Admin".to_string()
        }
    );
}

#[test]
fn owner_only_never_preempts_specific_idioms() {
    // Both sides are plain column references only in the last case.
    assert_eq!(
        classify("user_id = current_setting('app.current_user_id')").pattern.name(),
        "currentUserId"
    );
    assert_eq!(
        classify("tenant_id = current_setting('app.tenant_id')::uuid").pattern.name(),
        "tenantId"
    );
    assert_eq!(classify("a.user_id = b.owner_id").pattern.name(), "ownerOnly");
}

#[test]
fn deparsed_forms_from_pg_policies_are_recognized() {
    let cases = [
        (
            "(user_id = (current_setting('app.current_user_id'::text))::uuid)",
            "currentUserId",
        ),
        (
            "(current_setting('app.user_role'::text) = 'admin'::text)",
            "roleCheck",
        ),
        (
            "(created_at >= (CURRENT_DATE - '30 days'::interval))",
            "recentData",
        ),
        ("(seen_at >= (now() - '4 hours'::interval))", "timeWindow"),
        ("((tenant_id = (current_setting('app.tenant_id'::text))::uuid))", "tenantId"),
    ];
    for (sql, name) in cases {
        assert_eq!(classify(sql).pattern.name(), name, "{sql}");
    }
}

#[test]
fn mirrored_operands_are_accepted() {
    assert_eq!(
        classify("current_setting('app.current_user_id') = user_id").pattern,
        Pattern::CurrentUserId {
            column: "user_id".to_string()
        }
    );
    assert_eq!(
        classify("'admin' = current_setting('app.user_role')").pattern,
        Pattern::RoleCheck {
            role: "admin".to_string()
        }
    );
    assert_eq!(
        classify("current_date - interval '10 days' <= created_at").pattern,
        Pattern::RecentData {
            column: "created_at".to_string(),
            days: 10
        }
    );
}

#[test]
fn wrong_units_and_anchors_do_not_match_time_idioms() {
    assert_eq!(
        classify("created_at >= current_date - interval '3 hours'").pattern.name(),
        "custom"
    );
    assert_eq!(
        classify("seen_at >= now() - interval '3 days'").pattern.name(),
        "custom"
    );
    assert_eq!(
        classify("created_at > current_date - interval '3 days'").pattern.name(),
        "custom"
    );
}

#[test]
fn composite_expressions_become_complex() {
    let c = classify(
        "tenant_id = current_setting('app.tenant_id')::uuid OR current_setting('app.user_role') = 'admin'",
    );
    let Pattern::Complex { op, parts } = &c.pattern else {
        panic!("expected complex, got {:?}", c.pattern);
    };
    assert_eq!(*op, BoolOp::Or);
    assert_eq!(parts.len(), 2);
    assert!(approx(c.confidence, 0.9 * 0.8));
}

#[test]
fn chains_of_one_operator_score_as_a_single_composite() {
    let three = classify(
        "a = current_setting('app.current_user_id') AND b = current_setting('app.current_user_id') \
         AND current_setting('app.user_role') = 'x'",
    );
    let Pattern::Complex { parts, .. } = &three.pattern else {
        panic!("expected complex, got {:?}", three.pattern);
    };
    assert_eq!(parts.len(), 3);
    assert!(approx(three.confidence, 0.9 * 0.8));

    let four = classify(
        "a = current_setting('app.current_user_id') AND b = current_setting('app.current_user_id') \
         AND c = current_setting('app.current_user_id') AND d = current_setting('app.current_user_id')",
    );
    let Pattern::Complex { parts, .. } = &four.pattern else {
        panic!("expected complex, got {:?}", four.pattern);
    };
    assert_eq!(parts.len(), 4);
    assert!(four.confidence >= 0.5, "{}", four.confidence);
    assert!(approx(four.confidence, 0.72));
}

#[test]
fn parenthesized_groups_split_at_the_top_level_only() {
    let c = classify(
        "(user_id = current_setting('app.current_user_id') OR is_public) AND seen_at >= now() - interval '1 hours'",
    );
    let Pattern::Complex { op, parts } = &c.pattern else {
        panic!("expected complex, got {:?}", c.pattern);
    };
    assert_eq!(*op, BoolOp::And);
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].pattern.name(), "complex");
    assert_eq!(parts[1].pattern.name(), "timeWindow");
    assert!(approx(parts[0].confidence, 0.9 * 0.8));
    assert!(approx(c.confidence, 0.9 * 0.8 * 0.8));
}

#[test]
fn unmatched_predicates_carry_a_reason() {
    let c = classify("auth.has_permission('invoices.read')");
    let Pattern::Custom { reason } = &c.pattern else {
        panic!("expected custom");
    };
    assert!(!reason.is_empty());
    assert!(approx(c.confidence, 0.0));
}

#[test]
fn classification_serializes_with_pattern_params_and_parts() {
    let value = serde_json::to_value(classify(
        "user_id = current_setting('app.current_user_id') AND is_archived",
    ))
    .unwrap();
    assert_eq!(value["pattern"], "complex");
    assert_eq!(value["params"]["op"], "AND");
    assert_eq!(value["parts"][0]["pattern"], "currentUserId");
    assert_eq!(value["parts"][0]["params"]["column"], "user_id");
}

#[test]
fn fixture_policies_classify_as_expected() {
    let policies = support::load_pg_policies("saas_app");
    let classified = classify_policies(&policies);
    assert_eq!(classified.len(), 7);

    let by_name = |name: &str| {
        classified
            .iter()
            .find(|cp| cp.policy.name == name)
            .unwrap_or_else(|| panic!("missing policy {name}"))
    };

    assert_eq!(by_name("user_isolation").using_classification.pattern.name(), "currentUserId");
    assert_eq!(by_name("tenant_scope").using_classification.pattern.name(), "tenantId");
    assert_eq!(
        by_name("tenant_scope")
            .with_check_classification
            .as_ref()
            .map(|c| c.pattern.name()),
        Some("tenantId")
    );
    assert_eq!(by_name("admins_see_all").using_classification.pattern.name(), "roleCheck");

    let owner = by_name("owner_writes");
    assert_eq!(owner.using_classification.pattern, Pattern::PublicAccess);
    assert_eq!(
        owner.with_check_classification.as_ref().map(|c| &c.pattern),
        Some(&Pattern::OwnerOnly {
            user_column: "user_id".to_string(),
            owner_column: "owner_id".to_string(),
        })
    );
    assert!(approx(owner.min_confidence(), 0.6));

    assert_eq!(
        by_name("recent_events").using_classification.pattern,
        Pattern::RecentData {
            column: "created_at".to_string(),
            days: 30
        }
    );
    assert_eq!(by_name("live_sessions").using_classification.pattern.name(), "complex");
    assert!(!by_name("finance_only").using_classification.is_recognized());
}
