//! Security groups the policy framework targets

use crate::api::ApiClient;
use crate::error::Result;
use serde::Deserialize;
use serde_json::json;

/// Tally returned by `POST /api/groups/create-ca-groups`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupCreation {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub message: String,
}

impl GroupCreation {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Create the persona and exclusion groups, skipping ones that exist
///
/// Needs a delegated sign-in on the backend; with client credentials the
/// backend refuses with 400.
pub async fn create_ca_groups(client: &ApiClient) -> Result<GroupCreation> {
    client.post("api/groups/create-ca-groups", &json!({})).await
}
