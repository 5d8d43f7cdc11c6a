//! Conditional Access policy routes of the backend

use crate::api::ApiClient;
use crate::error::Result;
use crate::model::PolicyItem;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct PolicyList {
    #[serde(default)]
    policies: Vec<PolicyItem>,
}

#[derive(Debug, Deserialize)]
struct PolicyDetail {
    policy: Value,
}

/// List all Conditional Access policies
pub async fn list_policies(client: &ApiClient) -> Result<Vec<PolicyItem>> {
    let list: PolicyList = client.get("api/policies").await?;
    tracing::debug!("Loaded {} policies", list.policies.len());
    Ok(list.policies)
}

/// Get a policy's full JSON by ID
pub async fn get_policy(client: &ApiClient, policy_id: &str) -> Result<Value> {
    let detail: PolicyDetail = client.get(&format!("api/policies/{}", policy_id)).await?;
    Ok(detail.policy)
}

/// Delete a policy
pub async fn delete_policy(client: &ApiClient, policy_id: &str) -> Result<()> {
    let _: Value = client.delete(&format!("api/policies/{}", policy_id)).await?;
    Ok(())
}
