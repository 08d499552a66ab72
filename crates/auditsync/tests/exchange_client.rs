//! Integration tests for the Exchange admin client using wiremock.
//!
//! Covers the cmdlet request shape, bearer authentication, pagination,
//! status mapping, and a full reconciliation against the mock endpoint.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auditsync::policy::{
    TargetPolicy, DEFAULT_ADMIN_ACTIONS, DEFAULT_DELEGATE_ACTIONS, DEFAULT_OWNER_ACTIONS,
};
use auditsync::remote::{AuditService, ExchangeAdminClient, RemoteError};
use auditsync::summary::FailureCause;
use auditsync::{reconcile_tenant, NoopProgress, PreconditionError, RunOptions, AUDIT_FIELDS};

// =============================================================================
// Test Helpers
// =============================================================================

const TENANT: &str = "contoso.onmicrosoft.com";
const ENDPOINT_PATH: &str = "/adminapi/beta/contoso.onmicrosoft.com/InvokeCommand";
const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> ExchangeAdminClient {
    ExchangeAdminClient::new(&server.uri(), TENANT, SecretString::from(TOKEN)).unwrap()
}

fn cmdlet(name: &str) -> Value {
    json!({ "CmdletInput": { "CmdletName": name } })
}

fn compliant_mailbox_json(identity: &str) -> Value {
    json!({
        "PrimarySmtpAddress": identity,
        "DisplayName": "Alice",
        "AuditEnabled": true,
        "AuditLogAgeLimit": "90.00:00:00",
        "AuditOwner": DEFAULT_OWNER_ACTIONS,
        "AuditAdmin": DEFAULT_ADMIN_ACTIONS,
        "AuditDelegate": DEFAULT_DELEGATE_ACTIONS,
    })
}

async fn mount_org_config(server: &MockServer, audit_disabled: bool) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(cmdlet("Get-OrganizationConfig")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": [{ "AuditDisabled": audit_disabled }] })),
        )
        .mount(server)
        .await;
}

// =============================================================================
// Request Shape
// =============================================================================

#[tokio::test]
async fn test_org_check_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(cmdlet("Get-OrganizationConfig")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": [{ "AuditDisabled": false }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).check_org_audit_enabled().await.unwrap());
}

#[tokio::test]
async fn test_org_check_reports_disabled() {
    let server = MockServer::start().await;
    mount_org_config(&server, true).await;

    assert!(!client(&server).check_org_audit_enabled().await.unwrap());
}

#[tokio::test]
async fn test_bulk_fetch_follows_next_link() {
    let server = MockServer::start().await;
    let next_link = format!("{}/page/2", server.uri());

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "CmdletInput": {
                "CmdletName": "Get-EXOMailbox",
                "Parameters": {
                    "ResultSize": "Unlimited",
                    "RecipientTypeDetails": ["UserMailbox", "SharedMailbox"]
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [compliant_mailbox_json("a@contoso.com")],
            "@odata.nextLink": next_link,
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/page/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "PrimarySmtpAddress": "", "DisplayName": "Blank address" },
                { "PrimarySmtpAddress": "b@contoso.com", "DisplayName": null, "AuditLogAgeLimit": "" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let recipient_types = vec!["UserMailbox".to_string(), "SharedMailbox".to_string()];
    let mailboxes = client(&server)
        .bulk_fetch(&recipient_types, AUDIT_FIELDS)
        .await
        .unwrap();

    assert_eq!(mailboxes.len(), 3);
    assert_eq!(mailboxes[0].identity.as_deref(), Some("a@contoso.com"));
    assert_eq!(mailboxes[0].audit_enabled, Some(true));
    assert!(mailboxes[1].identity.is_none());
    assert_eq!(mailboxes[2].display_name, "");
    assert!(mailboxes[2].age_limit.is_none());
    assert!(mailboxes[2].owner_actions.is_none());
}

#[tokio::test]
async fn test_update_sends_full_target_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(cmdlet("Set-Mailbox")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let policy = TargetPolicy::default();
    client(&server)
        .update("alice@contoso.com", &policy)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    let params = &body["CmdletInput"]["Parameters"];
    assert_eq!(params["Identity"], "alice@contoso.com");
    assert_eq!(params["AuditEnabled"], true);
    assert_eq!(params["AuditLogAgeLimit"], "90.00:00:00");
    assert_eq!(
        params["AuditOwner"].as_array().unwrap().len(),
        DEFAULT_OWNER_ACTIONS.len()
    );
    assert_eq!(
        params["AuditDelegate"].as_array().unwrap().len(),
        DEFAULT_DELEGATE_ACTIONS.len()
    );
}

#[tokio::test]
async fn test_bulk_fetch_follows_relative_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [compliant_mailbox_json("a@contoso.com")],
            "@odata.nextLink": "/page/2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/page/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": [compliant_mailbox_json("b@contoso.com")] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mailboxes = client(&server)
        .bulk_fetch(&["UserMailbox".to_string()], AUDIT_FIELDS)
        .await
        .unwrap();
    assert_eq!(mailboxes.len(), 2);
}

#[tokio::test]
async fn test_next_link_to_another_host_is_refused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [compliant_mailbox_json("a@contoso.com")],
            "@odata.nextLink": "https://collector.example.net/page/2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .bulk_fetch(&["UserMailbox".to_string()], AUDIT_FIELDS)
        .await
        .unwrap_err();

    match err {
        RemoteError::Decode { command, message } => {
            assert_eq!(command, "Get-EXOMailbox");
            assert!(message.contains("https://collector.example.net"));
        }
        other => panic!("expected Decode, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_fetch_keeps_undecodable_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                compliant_mailbox_json("a@contoso.com"),
                { "PrimarySmtpAddress": "b@contoso.com", "AuditOwner": "Update" },
                compliant_mailbox_json("c@contoso.com")
            ]
        })))
        .mount(&server)
        .await;

    let mailboxes = client(&server)
        .bulk_fetch(&["UserMailbox".to_string()], AUDIT_FIELDS)
        .await
        .unwrap();

    assert_eq!(mailboxes.len(), 3);
    assert!(mailboxes[0].decode_error.is_none());
    assert_eq!(mailboxes[1].identity.as_deref(), Some("b@contoso.com"));
    assert!(mailboxes[1].decode_error.is_some());
    assert!(mailboxes[2].decode_error.is_none());
}

// =============================================================================
// Error Mapping
// =============================================================================

#[tokio::test]
async fn test_fetch_empty_result_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("ghost@contoso.com", AUDIT_FIELDS)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(ref id) if id == "ghost@contoso.com"));
}

#[tokio::test]
async fn test_unauthorized_status_is_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let err = client(&server)
        .update("alice@contoso.com", &TargetPolicy::default())
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    match err {
        RemoteError::Status {
            command,
            status,
            body,
        } => {
            assert_eq!(command, "Set-Mailbox");
            assert_eq!(status, 401);
            assert_eq!(body, "token expired");
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn test_long_error_body_is_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("x".repeat(5000)))
        .mount(&server)
        .await;

    let err = client(&server).check_org_audit_enabled().await.unwrap_err();
    assert!(err.is_throttled());
    assert!(err.to_string().len() < 400);
    assert!(err.to_string().ends_with("(truncated)"));
}

#[tokio::test]
async fn test_malformed_age_limit_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "PrimarySmtpAddress": "a@contoso.com", "AuditLogAgeLimit": "ninety days" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("a@contoso.com", AUDIT_FIELDS)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Decode { .. }));
}

// =============================================================================
// Full Run
// =============================================================================

#[tokio::test]
async fn test_reconcile_against_admin_endpoint() {
    let server = MockServer::start().await;
    mount_org_config(&server, false).await;

    // Bulk fetch: one drifted, one compliant mailbox.
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "CmdletInput": { "CmdletName": "Get-EXOMailbox", "Parameters": { "ResultSize": "Unlimited" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "PrimarySmtpAddress": "alice@contoso.com",
                    "DisplayName": "Alice",
                    "AuditEnabled": false,
                    "AuditLogAgeLimit": "30.00:00:00"
                },
                compliant_mailbox_json("bob@contoso.com")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "CmdletInput": { "CmdletName": "Set-Mailbox", "Parameters": { "Identity": "alice@contoso.com" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    // Verification re-read after the write.
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "CmdletInput": { "CmdletName": "Get-EXOMailbox", "Parameters": { "Identity": "alice@contoso.com" } }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": [compliant_mailbox_json("alice@contoso.com")] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = client(&server);
    let summary = reconcile_tenant(
        &service,
        Arc::new(TargetPolicy::default()),
        &RunOptions::default(),
        &NoopProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.is_clean());
    assert_eq!(summary.change_records[0].identity, "alice@contoso.com");
    assert_eq!(summary.change_records[0].diffs.len(), 2);
}

#[tokio::test]
async fn test_unreadable_mailbox_does_not_abort_run() {
    let server = MockServer::start().await;
    mount_org_config(&server, false).await;

    let drifted = |identity: &str| {
        json!({
            "PrimarySmtpAddress": identity,
            "DisplayName": identity,
            "AuditEnabled": false,
            "AuditLogAgeLimit": "90.00:00:00"
        })
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "CmdletInput": { "CmdletName": "Get-EXOMailbox", "Parameters": { "ResultSize": "Unlimited" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                drifted("a@contoso.com"),
                {
                    "PrimarySmtpAddress": "b@contoso.com",
                    "DisplayName": "Bad",
                    "AuditEnabled": false,
                    "AuditLogAgeLimit": "Unlimited"
                },
                drifted("c@contoso.com")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(cmdlet("Set-Mailbox")))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    for identity in ["a@contoso.com", "c@contoso.com"] {
        Mock::given(method("POST"))
            .and(path(ENDPOINT_PATH))
            .and(body_partial_json(json!({
                "CmdletInput": { "CmdletName": "Get-EXOMailbox", "Parameters": { "Identity": identity } }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": [compliant_mailbox_json(identity)] })),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let service = client(&server);
    let summary = reconcile_tenant(
        &service,
        Arc::new(TargetPolicy::default()),
        &RunOptions::default(),
        &NoopProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!((summary.succeeded, summary.skipped, summary.failed), (2, 0, 1));
    let failure = &summary.failures[0];
    assert_eq!(failure.identity.as_deref(), Some("b@contoso.com"));
    assert!(matches!(failure.cause, FailureCause::Unexpected(_)));
}

#[tokio::test]
async fn test_bulk_fetch_failure_aborts_run() {
    let server = MockServer::start().await;
    mount_org_config(&server, false).await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(cmdlet("Get-EXOMailbox")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let service = client(&server);
    let result = reconcile_tenant(
        &service,
        Arc::new(TargetPolicy::default()),
        &RunOptions::default(),
        &NoopProgress,
    )
    .await;

    assert!(matches!(result, Err(PreconditionError::BulkFetchFailed(_))));
}
