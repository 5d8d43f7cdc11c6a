//! Policy template catalog served by the backend

use crate::api::ApiClient;
use crate::error::Result;
use serde::Deserialize;
use serde_json::{json, Value};

/// One deployable template
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyTemplate {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: String,
    /// Graph policy body sent back verbatim on deploy
    pub template: Value,
}

impl PolicyTemplate {
    /// Display name, falling back to the catalog key
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Response of `GET /api/templates`
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default)]
    pub templates: Vec<PolicyTemplate>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl TemplateCatalog {
    /// Templates grouped in category order; categories without templates are skipped
    pub fn grouped(&self) -> Vec<(&str, Vec<&PolicyTemplate>)> {
        self.categories
            .iter()
            .filter_map(|category| {
                let members: Vec<&PolicyTemplate> = self
                    .templates
                    .iter()
                    .filter(|t| &t.category == category)
                    .collect();
                (!members.is_empty()).then_some((category.as_str(), members))
            })
            .collect()
    }

    /// Find templates by catalog key or display name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&PolicyTemplate> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name) || t.display_name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Deserialize)]
struct DeployResult {
    #[serde(default)]
    policy: Value,
}

/// Fetch the template catalog
pub async fn list_templates(client: &ApiClient) -> Result<TemplateCatalog> {
    client.get("api/templates").await
}

/// Deploy one template body as a new policy
pub async fn deploy_template(client: &ApiClient, template: &Value) -> Result<Value> {
    let result: DeployResult = client
        .post("api/templates/deploy", &json!({ "template": template }))
        .await?;
    Ok(result.policy)
}
