use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use crate::policy::Policy;

/// Session setting holding the current user's id.
pub const CURRENT_USER_ID_SETTING: &str = "app.current_user_id";
/// Session setting holding the current tenant's id.
pub const TENANT_ID_SETTING: &str = "app.tenant_id";
/// Session setting holding the current application role.
pub const USER_ROLE_SETTING: &str = "app.user_role";

/// Default column for `currentUserId`.
pub const DEFAULT_USER_COLUMN: &str = "user_id";
/// Default column for `tenantId`.
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";
/// Default column for `recentData`.
pub const DEFAULT_RECENT_COLUMN: &str = "created_at";
/// Default look-back window for `recentData`.
pub const DEFAULT_RECENT_DAYS: i64 = 90;
/// Default owner column for `ownerOnly`.
pub const DEFAULT_OWNER_COLUMN: &str = "owner_id";

/// Penalty applied to the weakest child of a composite expression.
pub const COMPLEX_CONFIDENCE_FACTOR: f64 = 0.8;

/// Boolean operator for composite patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// Logical conjunction: all sub-conditions must hold.
    And,
    /// Logical disjunction: at least one sub-condition must hold.
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

/// Semantic shape recognized in a policy predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Literal `true` or an empty predicate.
    PublicAccess,
    /// Literal `false`.
    NoAccess,
    /// `col = current_setting('app.current_user_id')::uuid`.
    CurrentUserId {
        /// Column compared against the session user id.
        column: String,
    },
    /// `col = current_setting('app.tenant_id')::uuid`.
    TenantId {
        /// Column compared against the session tenant id.
        column: String,
    },
    /// `current_setting('app.user_role') = 'ROLE'`.
    RoleCheck {
        /// Required application role.
        role: String,
    },
    /// `col >= current_date - interval 'N days'`.
    RecentData {
        /// Timestamp column.
        column: String,
        /// Look-back window in days.
        days: i64,
    },
    /// `col >= now() - interval 'N hours'`.
    TimeWindow {
        /// Timestamp column.
        column: String,
        /// Look-back window in hours.
        hours: i64,
    },
    /// Bare column equality `colA = colB`.
    OwnerOnly {
        /// Left-hand column.
        user_column: String,
        /// Right-hand column.
        owner_column: String,
    },
    /// AND/OR of sub-expressions, holding only the parts that were recognized.
    Complex {
        /// Connective joining the parts.
        op: BoolOp,
        /// Recognized sub-classifications, in source order.
        parts: Vec<ClassifiedExpression>,
    },
    /// Nothing matched.
    Custom {
        /// Human-readable explanation of why classification failed.
        reason: String,
    },
}

impl Pattern {
    /// Name of the pattern as used in rendered helper calls and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::PublicAccess => "publicAccess",
            Pattern::NoAccess => "noAccess",
            Pattern::CurrentUserId { .. } => "currentUserId",
            Pattern::TenantId { .. } => "tenantId",
            Pattern::RoleCheck { .. } => "roleCheck",
            Pattern::RecentData { .. } => "recentData",
            Pattern::TimeWindow { .. } => "timeWindow",
            Pattern::OwnerOnly { .. } => "ownerOnly",
            Pattern::Complex { .. } => "complex",
            Pattern::Custom { .. } => "custom",
        }
    }

    /// Extracted parameters as a name → value mapping.
    pub fn params(&self) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        match self {
            Pattern::PublicAccess | Pattern::NoAccess => {}
            Pattern::CurrentUserId { column } | Pattern::TenantId { column } => {
                params.insert("column".to_string(), Value::from(column.as_str()));
            }
            Pattern::RoleCheck { role } => {
                params.insert("role".to_string(), Value::from(role.as_str()));
            }
            Pattern::RecentData { column, days } => {
                params.insert("column".to_string(), Value::from(column.as_str()));
                params.insert("days".to_string(), Value::from(*days));
            }
            Pattern::TimeWindow { column, hours } => {
                params.insert("column".to_string(), Value::from(column.as_str()));
                params.insert("hours".to_string(), Value::from(*hours));
            }
            Pattern::OwnerOnly {
                user_column,
                owner_column,
            } => {
                params.insert("userColumn".to_string(), Value::from(user_column.as_str()));
                params.insert("ownerColumn".to_string(), Value::from(owner_column.as_str()));
            }
            Pattern::Complex { op, .. } => {
                params.insert("op".to_string(), Value::from(op.to_string()));
            }
            Pattern::Custom { reason } => {
                params.insert("reason".to_string(), Value::from(reason.as_str()));
            }
        }
        params
    }
}

/// A classified predicate with its pattern, confidence and source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedExpression {
    /// The matched pattern.
    pub pattern: Pattern,
    /// Confidence in `[0, 1]`; `0` for [`Pattern::Custom`].
    pub confidence: f64,
    /// The predicate text that was classified.
    pub raw: String,
}

impl ClassifiedExpression {
    /// Build an unrecognized classification.
    pub fn custom(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Custom {
                reason: reason.into(),
            },
            confidence: 0.0,
            raw: raw.to_string(),
        }
    }

    /// True unless the pattern is [`Pattern::Custom`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self.pattern, Pattern::Custom { .. })
    }

    /// Shorthand for [`Pattern::params`].
    pub fn params(&self) -> BTreeMap<String, Value> {
        self.pattern.params()
    }
}

impl Serialize for ClassifiedExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let parts = match &self.pattern {
            Pattern::Complex { parts, .. } => Some(parts),
            _ => None,
        };
        let mut state = serializer.serialize_struct(
            "ClassifiedExpression",
            if parts.is_some() { 5 } else { 4 },
        )?;
        state.serialize_field("pattern", self.pattern.name())?;
        state.serialize_field("params", &self.params())?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("raw", &self.raw)?;
        if let Some(parts) = parts {
            state.serialize_field("parts", parts)?;
        }
        state.end()
    }
}

/// A policy with classifications for USING and WITH CHECK.
#[derive(Debug, Clone)]
pub struct ClassifiedPolicy {
    /// The policy as loaded.
    pub policy: Policy,
    /// Classification of the USING expression.
    pub using_classification: ClassifiedExpression,
    /// Classification of the WITH CHECK expression, if present.
    pub with_check_classification: Option<ClassifiedExpression>,
}

impl ClassifiedPolicy {
    /// Iterate over all classified policy expressions (`USING` and `WITH CHECK`).
    pub fn classifications(&self) -> impl Iterator<Item = &ClassifiedExpression> {
        std::iter::once(&self.using_classification).chain(self.with_check_classification.as_ref())
    }

    /// Lowest confidence across USING and WITH CHECK.
    pub fn min_confidence(&self) -> f64 {
        self.classifications()
            .map(|c| c.confidence)
            .fold(1.0, f64::min)
    }
}
