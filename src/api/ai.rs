//! AI policy explanations and their usage statistics

use crate::api::ApiClient;
use crate::error::Result;
use serde::Deserialize;

/// AI usage for the backend session
///
/// The stats route and the `session_stats` block of an explanation name
/// the counters differently; both shapes parse into this.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiStats {
    #[serde(default, alias = "total_explanations")]
    pub explanations: u64,
    #[serde(default, alias = "total_tokens")]
    pub tokens_used: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub avg_response_time: f64,
    #[serde(default)]
    pub ai_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyExplanation {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub session_stats: Option<AiStats>,
}

/// Ask the backend's assistant to explain a policy in plain language
pub async fn explain_policy(client: &ApiClient, policy_id: &str) -> Result<PolicyExplanation> {
    client
        .get_plain(&format!("api/policies/{}/explain", policy_id))
        .await
}

pub async fn ai_stats(client: &ApiClient) -> Result<AiStats> {
    client.get_plain("api/ai/stats").await
}
