//! Integration tests for the policy manager API client
//!
//! Uses wiremock to simulate the backend and verify envelope handling,
//! retry behavior, session cookies and bulk runs over real HTTP.

use capm::api::ai::{ai_stats, explain_policy};
use capm::api::groups::create_ca_groups;
use capm::api::locations::{get_named_location, list_named_locations};
use capm::api::report::{analyze_report, export_findings, upload_report, XLSX_MIME};
use capm::api::templates::list_templates;
use capm::api::{policies, ApiClient, PolicyApi, RetryPolicy};
use capm::bulk::operations::{delete_selected, deploy_recommendations};
use capm::bulk::{BulkOperation, BulkRunner, RunState};
use capm::config::Credentials;
use capm::error::CapmError;
use capm::table::TableViewModel;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test helper: a client pointed at the mock server that retries quickly
async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::new(&server.uri()).unwrap().with_retry(RetryPolicy {
        max_retries: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
    });
    (server, client)
}

fn policy_list(ids: &[&str]) -> serde_json::Value {
    let policies: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "displayName": format!("Policy {}", id),
                "state": "enabled",
                "createdDateTime": "2024-01-01T00:00:00Z"
            })
        })
        .collect();
    json!({ "success": true, "policies": policies })
}

#[tokio::test]
async fn test_list_policies_reads_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_list(&["a", "b"])))
        .expect(1)
        .mount(&server)
        .await;

    let items = policies::list_policies(&client).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "a");
    assert_eq!(items[1].display_name(), Some("Policy b"));
}

#[tokio::test]
async fn test_success_false_is_an_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "error": "Graph token expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    match policies::list_policies(&client).await {
        Err(CapmError::ApiError(msg)) => assert_eq!(msg, "Graph token expired"),
        other => panic!("expected ApiError, got {:?}", other),
    }
}

/// 503 once, then success: the client retries transparently
#[tokio::test]
async fn test_server_error_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_list(&["a"])))
        .expect(1)
        .mount(&server)
        .await;

    let items = policies::list_policies(&client).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_with_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "connected": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let status = client.health().await.unwrap();
    assert!(status.connected);
}

#[tokio::test]
async fn test_persistent_server_error_gives_up() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "Internal error"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = policies::list_policies(&client).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 500: Internal error"));
}

/// 401 is not transient and must not be retried
#[tokio::test]
async fn test_unauthorized_no_retry() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/policies/p1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "Not connected"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.delete_item("p1").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Not connected"));
    assert!(msg.contains("capm connect"));
}

#[tokio::test]
async fn test_connect_keeps_session_cookie() {
    let (server, client) = setup().await;
    let credentials = Credentials {
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/api/connect"))
        .and(body_json(json!({
            "tenant_id": "tenant",
            "client_id": "client",
            "client_secret": "secret",
            "verify_ssl": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=abc123; Path=/")
                .set_body_json(json!({
                    "success": true,
                    "message": "Connected successfully",
                    "policy_count": 7
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_list(&["a"])))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.connect(&credentials, true).await.unwrap();
    assert_eq!(result.policy_count, 7);

    let items = client.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_template_deploy_conflict() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/templates/deploy"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "error": "Policy already exists"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .deploy_template(&json!({ "displayName": "Block legacy auth" }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Policy already exists"));
}

#[tokio::test]
async fn test_template_catalog() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "categories": ["Identity", "Devices"],
            "templates": [
                {
                    "category": "Identity",
                    "name": "require_mfa",
                    "display_name": "Require MFA for all users",
                    "state": "enabledForReportingButNotEnforced",
                    "template": { "displayName": "Require MFA for all users" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let catalog = list_templates(&client).await.unwrap();
    let grouped = catalog.grouped();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].0, "Identity");
    assert!(catalog.find("REQUIRE_MFA").is_some());
}

#[tokio::test]
async fn test_report_upload_and_analyze() {
    let (server, client) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("assessment.html");
    std::fs::write(&file, "<html><body>report</body></html>").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/report/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "message": "Uploaded" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/report/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Found 2 findings",
            "findings": [
                { "title": "Legacy auth allowed", "severity": "High", "status": "Failed" },
                { "title": "MFA registered", "severity": "Low", "status": "Passed" }
            ],
            "recommendations": [
                {
                    "policy_display_name": "Block legacy authentication",
                    "policy_category": "Identity",
                    "relevance_score": 0.9,
                    "finding_title": "Legacy auth allowed"
                }
            ],
            "stats": { "total_findings": 2, "by_status": { "Failed": 1, "Passed": 1 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    upload_report(&client, &file).await.unwrap();
    let analysis = analyze_report(&client).await.unwrap();
    assert_eq!(analysis.failed_findings().count(), 1);
    assert_eq!(analysis.recommendations[0].match_percent(), 90);
    assert_eq!(analysis.stats.total_findings, 2);
}

#[tokio::test]
async fn test_deploy_recommendations_counts_backend_failures() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/report/deploy-recommendations"))
        .and(body_json(json!({ "indices": [0] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "deployed": 1,
            "errors": []
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/report/deploy-recommendations"))
        .and(body_json(json!({ "indices": [1] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "deployed": 0,
            "errors": ["Require MFA: already exists"]
        })))
        .mount(&server)
        .await;

    let summary = deploy_recommendations(
        &client,
        &[],
        &[0, 1],
        &BulkRunner::new(BulkOperation::DeployRecommendations),
        |_| {},
    )
    .await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.log[1].message.contains("Require MFA: already exists"));
}

/// Delete two selected policies where one is already gone, then reload
#[tokio::test]
async fn test_bulk_delete_against_backend() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_list(&["p1", "p2", "p3"])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_list(&["p2", "p3"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/policies/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/policies/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": "Policy not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut table = TableViewModel::new();
    table.set_items(client.list_items().await.unwrap());
    table.toggle_selection("p1");
    table.toggle_selection("missing");

    let mut seen = Vec::new();
    let summary = delete_selected(
        &client,
        &mut table,
        &BulkRunner::new(BulkOperation::DeletePolicies),
        |progress| seen.push(progress.completed),
    )
    .await
    .unwrap();

    assert_eq!(summary.state, RunState::Complete);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(seen, vec![1, 2]);
    assert!(summary.log[1].message.contains("Policy not found"));

    assert!(table.selection().is_empty());
    assert_eq!(table.items().len(), 2);
    assert!(table.get("p1").is_none());
}

/// A 500 on a create is not replayed: the policy may already exist upstream
#[tokio::test]
async fn test_post_server_error_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/templates/deploy"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "Invalid conditions in template"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .deploy_template(&json!({ "displayName": "Require MFA" }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("HTTP 500: Invalid conditions in template"));
}

#[tokio::test]
async fn test_post_rate_limit_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/report/deploy-recommendations"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/report/deploy-recommendations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "deployed": 1,
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.deploy_recommendation(0).await.unwrap();
}

/// Nothing listens on the address, so the request never reached a backend
#[tokio::test]
async fn test_post_connection_refused_is_retried_then_fails() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ApiClient::new(&uri).unwrap().with_retry(RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(10),
    });
    let err = client.disconnect().await.unwrap_err();
    assert!(matches!(err, CapmError::HttpError(_)));
}

#[tokio::test]
async fn test_disconnect() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/disconnect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Disconnected successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.disconnect().await.unwrap(), "Disconnected successfully");
}

#[tokio::test]
async fn test_named_locations_without_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/named-locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": [
                {
                    "id": "loc-1",
                    "displayName": "Head office",
                    "type": "IP Ranges",
                    "isTrusted": true,
                    "ipRanges": ["203.0.113.0/24"],
                    "countriesAndRegions": [],
                    "includeUnknownCountriesAndRegions": false
                },
                {
                    "id": "loc-2",
                    "displayName": "Blocked countries",
                    "type": "Countries/Regions",
                    "isTrusted": false,
                    "ipRanges": [],
                    "countriesAndRegions": ["KP", "IR"],
                    "includeUnknownCountriesAndRegions": true
                }
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let locations = list_named_locations(&client).await.unwrap();
    assert_eq!(locations.len(), 2);
    assert!(locations[0].is_trusted);

    let blocked = get_named_location(&client, "loc-2").await.unwrap();
    assert_eq!(blocked.countries_and_regions, vec!["KP", "IR"]);
    assert!(blocked.include_unknown_countries_and_regions);
}

#[tokio::test]
async fn test_named_locations_unauthenticated() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/named-locations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Not authenticated" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = list_named_locations(&client).await.unwrap_err();
    assert!(err.to_string().contains("Not authenticated"));
}

#[tokio::test]
async fn test_create_ca_groups_tally() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/groups/create-ca-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "total": 61,
            "created": 58,
            "skipped": 2,
            "errors": ["Failed to create CA-Persona-Guests: 403 - Forbidden"],
            "message": "Created 58 groups, skipped 2 existing groups"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = create_ca_groups(&client).await.unwrap();
    assert_eq!(result.total, 61);
    assert_eq!(result.created, 58);
    assert_eq!(result.skipped, 2);
    assert_eq!(result.failed(), 1);
}

#[tokio::test]
async fn test_create_ca_groups_needs_delegated_auth() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/groups/create-ca-groups"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Group creation requires delegated authentication. Please sign in with Entra ID first."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = create_ca_groups(&client).await.unwrap_err();
    assert!(err.to_string().contains("delegated authentication"));
}

#[tokio::test]
async fn test_export_findings_download() {
    let (server, client) = setup().await;
    let workbook = b"PK\x03\x04fake-xlsx".to_vec();

    Mock::given(method("GET"))
        .and(path("/api/report/export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Content-Disposition",
                    "attachment; filename=security_findings_20240101_120000.xlsx",
                )
                .set_body_raw(workbook.clone(), XLSX_MIME),
        )
        .expect(1)
        .mount(&server)
        .await;

    let export = export_findings(&client).await.unwrap();
    assert_eq!(
        export.file_name.as_deref(),
        Some("security_findings_20240101_120000.xlsx")
    );
    assert_eq!(export.bytes, workbook);
}

#[tokio::test]
async fn test_export_without_findings_is_an_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/report/export"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "No findings available"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = export_findings(&client).await.unwrap_err();
    assert!(err.to_string().contains("No findings available"));
}

#[tokio::test]
async fn test_explain_policy_and_stats() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/policies/p1/explain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "explanation": "Requires MFA for every sign-in",
            "impact": "All users are prompted for a second factor",
            "recommendations": ["Exclude the break-glass group"],
            "ai_enabled": true,
            "session_stats": {
                "total_explanations": 1,
                "total_tokens": 850,
                "total_cost": 0.0042,
                "avg_response_time": 2.1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/ai/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "explanations": 1,
            "tokens_used": 850,
            "total_cost": 0.0042,
            "avg_response_time": 2.1,
            "ai_enabled": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let explanation = explain_policy(&client, "p1").await.unwrap();
    assert!(explanation.ai_enabled);
    assert_eq!(explanation.recommendations, vec!["Exclude the break-glass group"]);
    assert_eq!(explanation.session_stats.unwrap().tokens_used, 850);

    let stats = ai_stats(&client).await.unwrap();
    assert!(stats.ai_enabled);
    assert_eq!(stats.explanations, 1);
}

#[tokio::test]
async fn test_upload_sends_mime_for_extension() {
    let (server, client) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("findings.csv");
    std::fs::write(&file, "title,status\nLegacy auth,Failed\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/report/upload"))
        .and(body_string_contains("Content-Type: text/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    upload_report(&client, &file).await.unwrap();
}
