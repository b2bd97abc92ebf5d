//! Integration tests for the Graph client and token acquisition
//!
//! Uses wiremock to stand in for Microsoft Graph and the Entra ID token
//! endpoint, covering retry behaviour, pagination and both credential types.

use m365diag::config::{AuthType, ConfigManager, TenantConfig};
use m365diag::error::DiagError;
use m365diag::graph::auth::GraphAuth;
use m365diag::graph::usage::ReportPeriod;
use m365diag::graph::{GraphClient, directory, usage};
use m365diag::report::sources::{AlertsSource, MfaSource, OneDriveSource, TeamsSource, UsersSource};
use m365diag::report::{DataOrigin, DataSource, FallbackPolicy, collect};
use std::path::PathBuf;
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TENANT_ID: &str = "c59151ed-4414-4426-b239-08974ab0e805";
const CLIENT_ID: &str = "3c54f805-db0a-4f83-be24-6744ab9fd758";
const THUMBPRINT: &str = "5A2E1F9B0C3D4E6F7A8B9C0D1E2F3A4B5C6D7E8F";

fn tenant(auth_type: AuthType) -> TenantConfig {
    TenantConfig {
        name: "contoso".into(),
        tenant_id: TENANT_ID.into(),
        client_id: CLIENT_ID.into(),
        auth_type,
        client_secret: (auth_type == AuthType::ClientSecret).then(|| "s3cret-value".to_string()),
        certificate_thumbprint: (auth_type == AuthType::Certificate)
            .then(|| THUMBPRINT.to_string()),
        certificate_key_path: (auth_type == AuthType::Certificate).then(|| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_key.pem")
        }),
        description: None,
    }
}

fn token_body() -> serde_json::Value {
    serde_json::json!({
        "token_type": "Bearer",
        "expires_in": 3599,
        "access_token": "mock-access-token"
    })
}

fn token_path() -> String {
    format!("/{}/oauth2/v2.0/token", TENANT_ID)
}

/// Successful GET, no retry needed
#[tokio::test]
async fn test_get_organization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{
                "id": TENANT_ID,
                "displayName": "Contoso",
                "verifiedDomains": [
                    {"name": "contoso.onmicrosoft.com", "isDefault": false, "isInitial": true},
                    {"name": "contoso.com", "isDefault": true, "isInitial": false}
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("token-123".into(), &server.uri());
    let org = directory::get_organization(&client).await.unwrap().unwrap();

    assert_eq!(org.display_name.as_deref(), Some("Contoso"));
    assert_eq!(org.default_domain(), Some("contoso.com"));
}

/// A 500 is retried and the next success is returned
#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1", "displayName": "Adele Vance", "userPrincipalName": "adelev@contoso.com"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let users = directory::list_users(&client).await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].display_name.as_deref(), Some("Adele Vance"));
}

/// 429 waits for Retry-After, then retries
#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let started = std::time::Instant::now();
    let org = directory::get_organization(&client).await.unwrap();

    assert!(org.is_none());
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

/// 401 fails immediately with the Graph error explained
#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {
                "code": "InvalidAuthenticationToken",
                "message": "Access token has expired or is not yet valid."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("expired".into(), &server.uri());
    let err = directory::list_users(&client).await.unwrap_err();

    match err {
        DiagError::GraphApiError(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("InvalidAuthenticationToken"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// `@odata.nextLink` pages are followed until exhausted
#[tokio::test]
async fn test_pagination_follows_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1", "displayName": "Adele Vance"}],
            "@odata.nextLink": format!("{}/v1.0/users-page-2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {"id": "2", "displayName": "Alex Wilber"},
                {"id": "3", "displayName": "Diego Siciliani"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let users = directory::list_users(&client).await.unwrap();

    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

/// Usage reports come from the beta endpoint as JSON
#[tokio::test]
async fn test_mailbox_usage_uses_beta() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/beta/reports/getMailboxUsageDetail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{
                "userPrincipalName": "adelev@contoso.com",
                "displayName": "Adele Vance",
                "isDeleted": false,
                "recipientType": "User",
                "storageUsedInBytes": 1073741824u64,
                "itemCount": 1200,
                "prohibitSendReceiveQuotaInBytes": 53687091200u64,
                "lastActivityDate": "2024-09-30",
                "hasArchive": true
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let rows = usage::mailbox_usage(&client, ReportPeriod::D7).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].storage_used_in_bytes, Some(1073741824));
    assert_eq!(rows[0].has_archive, Some(true));
}

/// Alerts are filtered server-side on creation time, newest first
#[tokio::test]
async fn test_alerts_source_queries_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/security/alerts_v2"))
        .and(query_param("$orderby", "createdDateTime desc"))
        .and(|req: &Request| {
            req.url.query_pairs().any(|(k, v)| {
                k == "$filter"
                    && v.starts_with("createdDateTime ge ")
                    && v.ends_with('Z')
                    && chrono::DateTime::parse_from_rfc3339(&v["createdDateTime ge ".len()..]).is_ok()
            })
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "da637",
                    "title": "Suspicious inbox forwarding rule",
                    "severity": "high",
                    "status": "new",
                    "category": "Exfiltration",
                    "serviceSource": "microsoftDefenderForOffice365",
                    "createdDateTime": "2024-09-28T10:15:00Z"
                },
                {"id": "da638", "title": "Unfamiliar sign-in properties"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let records = AlertsSource { days: 7 }.fetch_real(&client).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].severity, "high");
    assert_eq!(records[0].service_source.as_deref(), Some("microsoftDefenderForOffice365"));
    assert!(records[0].created.is_some());
    assert_eq!(records[1].severity, "unknown");
    assert_eq!(records[1].status, "unknown");
}

/// An out-of-range window fails before any request is sent
#[tokio::test]
async fn test_alerts_source_rejects_huge_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let err = AlertsSource { days: 1_000_000_000 }.fetch_real(&client).await.unwrap_err();
    assert!(matches!(err, DiagError::ConfigError(_)));
}

/// Teams come from the beta groups endpoint; plain groups are dropped
#[tokio::test]
async fn test_teams_source_keeps_only_teams() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/beta/groups"))
        .and(query_param("$filter", "resourceProvisioningOptions/Any(x:x eq 'Team')"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "g1",
                    "displayName": "Retail",
                    "description": "",
                    "visibility": "Public",
                    "mail": "retail@contoso.com",
                    "createdDateTime": "2022-11-20T09:00:00Z",
                    "resourceProvisioningOptions": ["Team"]
                },
                {
                    "id": "g2",
                    "displayName": "All Company",
                    "resourceProvisioningOptions": []
                },
                {
                    "id": "g3",
                    "displayName": "Leadership",
                    "resourceProvisioningOptions": ["team"]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let records = TeamsSource.fetch_real(&client).await.unwrap();

    let names: Vec<&str> = records.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, vec!["Retail", "Leadership"]);
    assert_eq!(records[0].visibility, "Public");
    assert_eq!(records[0].description, None);
    assert_eq!(records[1].visibility, "Private");
}

/// MFA registration details map to records; a "none" default method is dropped
#[tokio::test]
async fn test_mfa_source_maps_registration_details() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/reports/authenticationMethods/userRegistrationDetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "u1",
                    "userPrincipalName": "adelev@contoso.com",
                    "userDisplayName": "Adele Vance",
                    "isAdmin": true,
                    "isMfaCapable": true,
                    "isMfaRegistered": true,
                    "methodsRegistered": ["microsoftAuthenticatorPush", "mobilePhone"],
                    "defaultMfaMethod": "microsoftAuthenticatorPush"
                },
                {
                    "id": "u2",
                    "userPrincipalName": "gradya@contoso.com",
                    "userDisplayName": "Grady Archie",
                    "isMfaRegistered": false,
                    "methodsRegistered": [],
                    "defaultMfaMethod": "none"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let records = MfaSource.fetch_real(&client).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records[0].is_admin && records[0].mfa_registered);
    assert_eq!(records[0].default_method.as_deref(), Some("microsoftAuthenticatorPush"));
    assert_eq!(records[0].methods, vec!["microsoftAuthenticatorPush", "mobilePhone"]);
    assert!(!records[1].mfa_registered);
    assert!(!records[1].is_admin);
    assert_eq!(records[1].default_method, None);
}

/// OneDrive usage uses the requested period; deleted accounts are dropped
#[tokio::test]
async fn test_onedrive_source_skips_deleted_accounts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(
            r"^/beta/reports/getOneDriveUsageAccountDetail\(period=('|%27)D90('|%27)\)$",
        ))
        .and(query_param("$format", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "ownerPrincipalName": "adelev@contoso.com",
                    "ownerDisplayName": "Adele Vance",
                    "siteUrl": "https://contoso-my.sharepoint.com/personal/adelev_contoso_com",
                    "isDeleted": false,
                    "fileCount": 1204,
                    "activeFileCount": 87,
                    "storageUsedInBytes": 15032385536u64,
                    "storageAllocatedInBytes": 1099511627776u64,
                    "lastActivityDate": "2024-09-30"
                },
                {
                    "ownerPrincipalName": "former@contoso.com",
                    "ownerDisplayName": "Former Employee",
                    "isDeleted": true,
                    "fileCount": 40
                },
                {
                    "ownerPrincipalName": "gradya@contoso.com",
                    "ownerDisplayName": "Grady Archie",
                    "lastActivityDate": ""
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let records = OneDriveSource { period: ReportPeriod::D90 }
        .fetch_real(&client)
        .await
        .unwrap();

    let owners: Vec<&str> = records.iter().map(|r| r.owner_principal_name.as_str()).collect();
    assert_eq!(owners, vec!["adelev@contoso.com", "gradya@contoso.com"]);
    assert_eq!(records[0].file_count, 1204);
    assert_eq!(records[0].storage_used_bytes, 15032385536);
    assert_eq!(records[1].file_count, 0);
    assert_eq!(records[1].last_activity, None);
}

/// Live data is used when Graph answers, sample data when it fails
#[tokio::test]
async fn test_collect_live_and_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1", "displayName": "Adele Vance", "userPrincipalName": "adelev@contoso.com"}]
        })))
        .mount(&server)
        .await;

    let client = GraphClient::with_root("t".into(), &server.uri());
    let live = collect(&UsersSource, Ok(&client), FallbackPolicy::SampleOnError)
        .await
        .unwrap();
    assert_eq!(live.origin, DataOrigin::Live);
    assert_eq!(live.records.len(), 1);

    let broken = GraphClient::with_root("t".into(), &format!("{}/missing", server.uri()));
    let fallback = collect(&UsersSource, Ok(&broken), FallbackPolicy::SampleOnError)
        .await
        .unwrap();
    assert!(fallback.origin.is_sample());
    assert!(fallback.records.len() > 1);

    let strict = collect(&UsersSource, Ok(&broken), FallbackPolicy::FailOnError).await;
    assert!(matches!(strict, Err(DiagError::GraphApiError(_))));
}

/// Client secret credentials are sent in the request body and the token is cached
#[tokio::test]
async fn test_client_secret_token_is_cached() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=s3cret-value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::with_authority(config.clone(), &server.uri());
    let tenant = tenant(AuthType::ClientSecret);

    assert_eq!(auth.acquire_token(&tenant).await.unwrap(), "mock-access-token");
    // Second call is served from the cache
    assert_eq!(auth.acquire_token(&tenant).await.unwrap(), "mock-access-token");

    let cached = config.load_token("contoso").unwrap();
    assert_eq!(cached.tenant_id, TENANT_ID);
}

/// Certificate credentials send a signed client assertion instead of a secret
#[tokio::test]
async fn test_certificate_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_assertion="))
        .and(body_string_contains("jwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::with_authority(config, &server.uri());
    let token = auth.login(&tenant(AuthType::Certificate)).await.unwrap();

    assert_eq!(token.access_token, "mock-access-token");
    assert!(token.expires_at > chrono::Utc::now());
}

/// Token endpoint errors are reported with the AAD error code
#[tokio::test]
async fn test_certificate_login_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS700027: Client assertion contains an invalid signature."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::with_authority(config.clone(), &server.uri());
    let err = auth.login(&tenant(AuthType::Certificate)).await.unwrap_err();

    match err {
        DiagError::AuthError(msg) => assert!(msg.contains("invalid_client")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(config.load_token("contoso").is_err());
}

/// Invalid configuration is rejected before any request is made
#[tokio::test]
async fn test_placeholder_config_never_reaches_the_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(0)
        .mount(&server)
        .await;

    let mut tenant = tenant(AuthType::ClientSecret);
    tenant.client_id = "YOUR-CLIENT-ID".into();

    let auth = GraphAuth::with_authority(config, &server.uri());
    assert!(matches!(
        auth.login(&tenant).await,
        Err(DiagError::InvalidConfig(_))
    ));
}
