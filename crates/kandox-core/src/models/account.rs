//! Identity payloads returned by the auth endpoints.
//!
//! The backend serializes ids as numbers for some entities and strings for
//! others, so every id is normalized to a `String` on the way in.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept `"42"`, `42` or `null` and normalize to a string.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// A single API permission granted through a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Permission {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "apiPath", default)]
    pub api_path: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub module: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Role {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Organizational unit type: operations or back office.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum UnitType {
    #[default]
    #[serde(rename = "OPS")]
    Ops,
    #[serde(rename = "BO")]
    BackOffice,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Unit {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub unit_type: UnitType,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Account {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default)]
    pub unit: Option<Unit>,
}

fn default_active() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Account {
    /// Check whether the role grants a permission in `module`, optionally
    /// narrowed by HTTP method (case-insensitive) and exact API path.
    pub fn has_permission(&self, module: &str, method: Option<&str>, api_path: Option<&str>) -> bool {
        self.role.permissions.iter().any(|p| {
            p.module == module
                && method.map_or(true, |m| p.method.eq_ignore_ascii_case(m))
                && api_path.map_or(true, |path| p.api_path == path)
        })
    }

    /// Check whether any permission belongs to `module`.
    pub fn has_module(&self, module: &str) -> bool {
        self.role.permissions.iter().any(|p| p.module == module)
    }

    /// Check for a permission by display name (case-insensitive).
    pub fn has_permission_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.role
            .permissions
            .iter()
            .any(|p| p.name.to_lowercase() == name)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// `data` of `POST /auth/login` and `GET /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<Account>,
}

/// `data` of `GET /auth/account`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountData {
    #[serde(default)]
    pub user: Option<Account>,
}

/// Minimal view of the refresh payload: only the token matters to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}
