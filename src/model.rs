//! Records shown in the policy table

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Policy state values used by Conditional Access
pub const STATE_ENABLED: &str = "enabled";
pub const STATE_DISABLED: &str = "disabled";
pub const STATE_REPORT_ONLY: &str = "enabledForReportingButNotEnforced";

/// A Conditional Access policy as returned by the backend
///
/// Only `id` is interpreted; every other field is kept as raw JSON so the
/// table can sort on any attribute the backend sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyItem {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl PolicyItem {
    /// Build an item from an id and a JSON object of attributes
    ///
    /// Non-object values yield an item without attributes.
    pub fn new(id: impl Into<String>, attributes: Value) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn str_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_attribute("displayName")
    }

    pub fn state(&self) -> Option<&str> {
        self.str_attribute("state")
    }

    pub fn created_date_time(&self) -> Option<&str> {
        self.str_attribute("createdDateTime")
    }

    pub fn modified_date_time(&self) -> Option<&str> {
        self.str_attribute("modifiedDateTime")
    }
}
