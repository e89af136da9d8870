//! Simulated session state for policy evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::patterns::{CURRENT_USER_ID_SETTING, USER_ROLE_SETTING};

/// The identity, role and custom settings a predicate is evaluated under,
/// standing in for a real connection's `SET` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Current user id; default for `app.current_user_id`.
    pub user: String,
    /// Active database role; default for `app.user_role` and `current_user`.
    pub role: String,
    /// Custom settings read by `current_setting`.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl SessionContext {
    /// Create a context with no custom settings.
    pub fn new(user: &str, role: &str) -> Self {
        Self {
            user: user.to_string(),
            role: role.to_string(),
            settings: BTreeMap::new(),
        }
    }

    /// Add or replace a custom setting.
    #[must_use]
    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    /// Resolve a setting the way `current_setting(key)` would.
    ///
    /// Explicit settings win; `app.current_user_id` and `app.user_role` fall
    /// back to the user and role.
    pub fn setting(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.settings.get(key) {
            return Some(value);
        }
        match key {
            CURRENT_USER_ID_SETTING => Some(&self.user),
            USER_ROLE_SETTING => Some(&self.role),
            _ => None,
        }
    }
}
