//! Per-user role lookup

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DirectoryConfig;
use crate::store::DocumentStore;

const ROLE_FIELD: &str = "role";

/// Directory access role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    /// Unknown values fall back to [`Role::Member`]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Member
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the role of `user_id`.
///
/// Never fails: a missing document, a missing `role` field or a store error
/// all resolve to [`Role::Member`].
pub async fn fetch_user_role(
    store: &dyn DocumentStore,
    config: &DirectoryConfig,
    user_id: &str,
) -> Role {
    let path = config.role_path(user_id);

    match store.get(&path).await {
        Ok(Some(doc)) => match doc.fields.get(ROLE_FIELD) {
            Some(Value::String(role)) => Role::parse(role),
            _ => {
                tracing::debug!(user_id = %user_id, "Role document has no role field");
                Role::Member
            }
        },
        Ok(None) => {
            tracing::debug!(user_id = %user_id, "No role document");
            Role::Member
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Role lookup failed, defaulting to member");
            Role::Member
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore, Precondition};
    use serde_json::json;

    async fn store_with_role(config: &DirectoryConfig, user_id: &str, role: Value) -> MemoryStore {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert(ROLE_FIELD.into(), role);
        store
            .put(&config.role_path(user_id), fields, Precondition::Overwrite)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_admin_role() {
        let config = DirectoryConfig::default();
        let store = store_with_role(&config, "u1", json!("admin")).await;

        let role = fetch_user_role(&store, &config, "u1").await;
        assert_eq!(role, Role::Admin);
        assert!(role.is_admin());
    }

    #[tokio::test]
    async fn test_missing_or_unknown_defaults_to_member() {
        let config = DirectoryConfig::default();
        let store = store_with_role(&config, "u1", json!("superuser")).await;

        assert_eq!(fetch_user_role(&store, &config, "u1").await, Role::Member);
        assert_eq!(fetch_user_role(&store, &config, "u2").await, Role::Member);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Admin "), Role::Admin);
        assert_eq!(Role::parse(""), Role::Member);
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
