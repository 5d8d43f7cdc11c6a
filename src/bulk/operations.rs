//! Bulk operations offered by the policy manager
//!
//! Each helper turns its inputs into labelled work items, drives the
//! runner against a `PolicyApi` and returns the tally.

use crate::api::report::Recommendation;
use crate::api::templates::PolicyTemplate;
use crate::api::PolicyApi;
use crate::bulk::{BulkItem, BulkProgress, BulkRunner, BulkSummary};
use crate::error::Result;
use crate::table::TableViewModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    DeletePolicies,
    DeployTemplates,
    DeployRecommendations,
}

impl BulkOperation {
    pub fn verb(&self) -> &'static str {
        match self {
            BulkOperation::DeletePolicies => "delete",
            BulkOperation::DeployTemplates | BulkOperation::DeployRecommendations => "deploy",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            BulkOperation::DeletePolicies => "deleted",
            BulkOperation::DeployTemplates | BulkOperation::DeployRecommendations => "deployed",
        }
    }

    pub fn progressive(&self) -> &'static str {
        match self {
            BulkOperation::DeletePolicies => "Deleting",
            BulkOperation::DeployTemplates | BulkOperation::DeployRecommendations => "Deploying",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            BulkOperation::DeletePolicies => "policies",
            BulkOperation::DeployTemplates => "templates",
            BulkOperation::DeployRecommendations => "recommendations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            BulkOperation::DeletePolicies => "Bulk Delete",
            BulkOperation::DeployTemplates | BulkOperation::DeployRecommendations => "Deployment",
        }
    }
}

/// Delete every selected policy, then refresh the table
///
/// When at least one delete succeeded the selection is cleared and the
/// collection reloaded; a failed reload is returned as an error.
pub async fn delete_selected<A, P>(
    api: &A,
    table: &mut TableViewModel,
    runner: &BulkRunner,
    on_progress: P,
) -> Result<BulkSummary>
where
    A: PolicyApi,
    P: FnMut(&BulkProgress<'_>),
{
    let items: Vec<BulkItem<String>> = table
        .selected_ids()
        .into_iter()
        .map(|id| BulkItem::new(table.label_for(&id), id))
        .collect();

    let summary = runner
        .run(
            items,
            |id: String| async move { api.delete_item(&id).await },
            on_progress,
        )
        .await;

    if summary.succeeded > 0 {
        table.clear_all();
        table.set_items(api.list_items().await?);
    }

    Ok(summary)
}

/// Deploy templates one after another
pub async fn deploy_templates<A, P>(
    api: &A,
    templates: &[&PolicyTemplate],
    runner: &BulkRunner,
    on_progress: P,
) -> BulkSummary
where
    A: PolicyApi,
    P: FnMut(&BulkProgress<'_>),
{
    let items: Vec<BulkItem<serde_json::Value>> = templates
        .iter()
        .map(|t| BulkItem::new(t.label(), t.template.clone()))
        .collect();

    runner
        .run(
            items,
            |body: serde_json::Value| async move { api.deploy_template(&body).await },
            on_progress,
        )
        .await
}

/// Deploy the recommendations at `indices`, in the given order
pub async fn deploy_recommendations<A, P>(
    api: &A,
    recommendations: &[Recommendation],
    indices: &[usize],
    runner: &BulkRunner,
    on_progress: P,
) -> BulkSummary
where
    A: PolicyApi,
    P: FnMut(&BulkProgress<'_>),
{
    let items: Vec<BulkItem<usize>> = indices
        .iter()
        .map(|&index| {
            let label = recommendations
                .get(index)
                .map(|r| r.policy_display_name.clone())
                .unwrap_or_else(|| format!("Recommendation #{}", index));
            BulkItem::new(label, index)
        })
        .collect();

    runner
        .run(
            items,
            |index: usize| async move { api.deploy_recommendation(index).await },
            on_progress,
        )
        .await
}
