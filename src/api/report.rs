//! Security report upload, analysis and recommendation deployment

use crate::api::ApiClient;
use crate::error::{CapmError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Finding {
    pub title: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mapped_policies: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recommendation {
    pub policy_display_name: String,
    #[serde(default)]
    pub policy_category: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub finding_title: String,
}

impl Recommendation {
    pub fn match_percent(&self) -> u32 {
        (self.relevance_score * 100.0).round().max(0.0) as u32
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportStats {
    #[serde(default)]
    pub total_findings: usize,
    #[serde(default)]
    pub by_severity: HashMap<String, usize>,
    #[serde(default)]
    pub by_status: HashMap<String, usize>,
    #[serde(default)]
    pub mapped_policy_types: usize,
}

/// Response of `POST /api/report/analyze`
#[derive(Debug, Clone, Deserialize)]
pub struct ReportAnalysis {
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub stats: ReportStats,
    #[serde(default)]
    pub message: String,
}

impl ReportAnalysis {
    pub fn failed_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.status == "Failed")
    }
}

#[derive(Debug, Deserialize)]
struct DeployRecommendationsResult {
    #[serde(default)]
    deployed: usize,
    #[serde(default)]
    errors: Vec<String>,
}

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Content type for a report file; the backend accepts .html, .csv and .xlsx
pub fn report_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => Ok("text/html"),
        "csv" => Ok("text/csv"),
        "xlsx" => Ok(XLSX_MIME),
        _ => Err(CapmError::InvalidArgument(format!(
            "Unsupported report type '{}': expected .html, .csv or .xlsx",
            path.display()
        ))),
    }
}

/// Upload an assessment report into the backend session
pub async fn upload_report(client: &ApiClient, path: &Path) -> Result<()> {
    let mime = report_mime(path)?;
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CapmError::InvalidArgument(format!("Not a file: {}", path.display())))?
        .to_string();

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let _: Value = client.post_multipart("api/report/upload", form).await?;
    Ok(())
}

/// Analyze the uploaded report into findings and policy recommendations
pub async fn analyze_report(client: &ApiClient) -> Result<ReportAnalysis> {
    client.post("api/report/analyze", &json!({})).await
}

/// Deploy a single recommendation by its index in the last analysis
pub async fn deploy_recommendation(client: &ApiClient, index: usize) -> Result<()> {
    let result: DeployRecommendationsResult = client
        .post("api/report/deploy-recommendations", &json!({ "indices": [index] }))
        .await?;

    if result.deployed == 1 {
        return Ok(());
    }

    Err(CapmError::ApiError(result.errors.into_iter().next().unwrap_or_else(|| {
        format!("Recommendation {} was not deployed (no template or index out of range)", index)
    })))
}

/// Findings workbook downloaded from `GET /api/report/export`
#[derive(Debug, Clone)]
pub struct FindingsExport {
    /// Name suggested by the backend, if any
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Export the analyzed findings and recommendations as an Excel workbook
///
/// The backend only has findings after `analyze_report` ran in the same session.
pub async fn export_findings(client: &ApiClient) -> Result<FindingsExport> {
    let (file_name, bytes) = client.download("api/report/export").await?;
    Ok(FindingsExport { file_name, bytes })
}
