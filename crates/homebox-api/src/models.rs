// Homebox wire types
//
// Homebox has shipped several response shapes across releases: bare JSON
// arrays, `{ items, page, pageSize, total }` pages, and `{ data }` wrappers.
// Field names drift between camelCase and snake_case too. These types
// accept all of them; normalization into domain types happens in
// `homebox-core`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// A `{ id, name }` reference to another entity, as embedded in items
/// (`location`) and locations (`parent`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An inventory item ("asset") as returned by `/api/v1/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub location: Option<EntityRef>,
    #[serde(default, alias = "location_id")]
    pub location_id: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
    /// Everything else the server sent (labels, description, custom fields).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemResponse {
    /// The item's location id, preferring the nested object over the flat field.
    pub fn effective_location_id(&self) -> Option<&str> {
        self.location
            .as_ref()
            .map(|l| l.id.as_str())
            .or(self.location_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// A storage location as returned by `/api/v1/locations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<EntityRef>,
    #[serde(default, alias = "parent_id")]
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LocationResponse {
    /// The parent location id, preferring the nested object over the flat field.
    pub fn effective_parent_id(&self) -> Option<&str> {
        self.parent
            .as_ref()
            .map(|p| p.id.as_str())
            .or(self.parent_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// A registered notifier (webhook target).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "is_active")]
    pub is_active: bool,
}

/// Login / refresh response. The token may sit at the top level or under `data`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "expires", alias = "expires_at")]
    pub expires_at: Option<String>,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub data: Option<Box<TokenResponse>>,
}

impl TokenResponse {
    /// Collapse the optional `data` wrapper, top-level fields winning.
    pub(crate) fn flatten(self) -> Self {
        let inner = self.data.map(|d| d.flatten()).unwrap_or_default();
        Self {
            token: self.token.or(inner.token),
            expires_at: self.expires_at.or(inner.expires_at),
            refresh_token: self.refresh_token.or(inner.refresh_token),
            data: None,
        }
    }
}

// ── List envelopes ───────────────────────────────────────────────────

/// One page of a list response, with the server-reported total if any.
#[derive(Debug)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: Option<usize>,
}

impl<T: serde::de::DeserializeOwned> ListPage<T> {
    /// Decode any of the list shapes Homebox produces.
    ///
    /// Accepts a bare array, `{ items: [...] }`, `{ data: [...] }`,
    /// `{ data: { items: [...] } }`, and as a last resort the first
    /// array-valued field of an object.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let Some(array) = find_list(value) else {
            return Err(Error::Deserialization {
                message: "response did not contain a list".into(),
                body: value.to_string(),
            });
        };

        let items = Vec::<T>::deserialize(array).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })?;

        let total = value
            .get("total")
            .and_then(Value::as_u64)
            .and_then(|t| usize::try_from(t).ok());

        Ok(Self { items, total })
    }
}

fn find_list(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(_) => Some(value),
        Value::Object(map) => {
            for key in ["items", "data"] {
                match map.get(key) {
                    Some(v @ Value::Array(_)) => return Some(v),
                    Some(v @ Value::Object(_)) => {
                        if let Some(found) = find_list(v) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            map.values().find(|v| v.is_array())
        }
        _ => None,
    }
}
