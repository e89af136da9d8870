use sqlparser::ast::{BinaryOperator, Expr};

use crate::classifier::patterns::{
    Pattern, CURRENT_USER_ID_SETTING, TENANT_ID_SETTING, USER_ROLE_SETTING,
};
use crate::parser::expr::{
    current_setting_key, extract_column_name, function_call, interval_literal, split_interval,
    strip_nesting, string_literal,
};

/// A named idiom recognizer with the confidence its matches carry.
#[derive(Debug, Clone, Copy)]
pub struct Idiom {
    /// Pattern name produced on a match.
    pub name: &'static str,
    /// Confidence assigned to every match.
    pub confidence: f64,
    /// Typed matcher over a single expression node.
    pub recognize: fn(&Expr) -> Option<Pattern>,
}

/// Recognized idioms in priority order. The first match wins, so the broad
/// `ownerOnly` matcher must stay last.
pub const IDIOMS: [Idiom; 6] = [
    Idiom {
        name: "currentUserId",
        confidence: 0.9,
        recognize: recognize_current_user_id,
    },
    Idiom {
        name: "tenantId",
        confidence: 0.9,
        recognize: recognize_tenant_id,
    },
    Idiom {
        name: "roleCheck",
        confidence: 0.9,
        recognize: recognize_role_check,
    },
    Idiom {
        name: "recentData",
        confidence: 0.8,
        recognize: recognize_recent_data,
    },
    Idiom {
        name: "timeWindow",
        confidence: 0.8,
        recognize: recognize_time_window,
    },
    Idiom {
        name: "ownerOnly",
        confidence: 0.6,
        recognize: recognize_owner_only,
    },
];

/// Try every idiom in priority order and return the first match.
pub fn match_idiom(expr: &Expr) -> Option<(Pattern, f64)> {
    IDIOMS
        .iter()
        .find_map(|idiom| (idiom.recognize)(expr).map(|pattern| (pattern, idiom.confidence)))
}

/// `col = current_setting('app.current_user_id')[::uuid|::text]`.
pub fn recognize_current_user_id(expr: &Expr) -> Option<Pattern> {
    let column = column_equals_setting(expr, CURRENT_USER_ID_SETTING)?;
    Some(Pattern::CurrentUserId { column })
}

/// `col = current_setting('app.tenant_id')::uuid`.
pub fn recognize_tenant_id(expr: &Expr) -> Option<Pattern> {
    let column = column_equals_setting(expr, TENANT_ID_SETTING)?;
    Some(Pattern::TenantId { column })
}

/// `current_setting('app.user_role') = 'ROLE'`.
pub fn recognize_role_check(expr: &Expr) -> Option<Pattern> {
    let (left, right) = equality_operands(expr)?;
    let literal = if is_setting(left, USER_ROLE_SETTING) {
        right
    } else if is_setting(right, USER_ROLE_SETTING) {
        left
    } else {
        return None;
    };
    let role = string_literal(literal)?;
    Some(Pattern::RoleCheck { role })
}

/// `col >= current_date - interval 'N days'`.
pub fn recognize_recent_data(expr: &Expr) -> Option<Pattern> {
    let (column, amount) = column_since(expr, "current_date", "day")?;
    Some(Pattern::RecentData {
        column,
        days: amount,
    })
}

/// `col >= now() - interval 'N hours'`.
pub fn recognize_time_window(expr: &Expr) -> Option<Pattern> {
    let (column, amount) = column_since(expr, "now", "hour")?;
    Some(Pattern::TimeWindow {
        column,
        hours: amount,
    })
}

/// Bare `colA = colB`.
pub fn recognize_owner_only(expr: &Expr) -> Option<Pattern> {
    let (left, right) = equality_operands(expr)?;
    if !is_column_ref(left) || !is_column_ref(right) {
        return None;
    }
    Some(Pattern::OwnerOnly {
        user_column: extract_column_name(left)?,
        owner_column: extract_column_name(right)?,
    })
}

fn equality_operands(expr: &Expr) -> Option<(&Expr, &Expr)> {
    match strip_nesting(expr) {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => Some((left.as_ref(), right.as_ref())),
        _ => None,
    }
}

fn is_setting(expr: &Expr, key: &str) -> bool {
    current_setting_key(expr).is_some_and(|k| k == key)
}

fn is_column_ref(expr: &Expr) -> bool {
    matches!(
        strip_nesting(expr),
        Expr::Identifier(_) | Expr::CompoundIdentifier(_)
    )
}

/// Column side of `col = current_setting(key)`, in either operand order.
fn column_equals_setting(expr: &Expr, key: &str) -> Option<String> {
    let (left, right) = equality_operands(expr)?;
    if is_setting(right, key) && !is_setting(left, key) {
        return extract_column_name(left);
    }
    if is_setting(left, key) && !is_setting(right, key) {
        return extract_column_name(right);
    }
    None
}

/// `col >= anchor - interval 'N unit'` (or the mirrored `<=` form) where
/// `anchor` is a zero-argument time function and the interval unit starts
/// with `unit_prefix`. Returns the column and `N`.
fn column_since(expr: &Expr, anchor: &str, unit_prefix: &str) -> Option<(String, i64)> {
    let Expr::BinaryOp { left, op, right } = strip_nesting(expr) else {
        return None;
    };
    let (column_side, bound_side) = match op {
        BinaryOperator::GtEq => (left.as_ref(), right.as_ref()),
        BinaryOperator::LtEq => (right.as_ref(), left.as_ref()),
        _ => return None,
    };
    if !is_column_ref(column_side) {
        return None;
    }

    let Expr::BinaryOp {
        left: base,
        op: BinaryOperator::Minus,
        right: interval,
    } = strip_nesting(bound_side)
    else {
        return None;
    };
    let (name, args) = function_call(base)?;
    if name != anchor || !args.is_empty() {
        return None;
    }

    let (amount, unit) = split_interval(&interval_literal(interval)?)?;
    if !unit.starts_with(unit_prefix) {
        return None;
    }
    Some((extract_column_name(column_side)?, amount))
}
