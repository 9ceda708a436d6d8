//! `GraphClient` against a mock Graph + identity endpoint.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use doc_courier::error::RemoteError;
use doc_courier::remote::{check_connection, ChunkRange, ChunkStatus, UploadSession};
use doc_courier::{CourierConfig, CourierError, DriveItem, GraphClient, RemoteTree, TenantConfig};
use httpmock::prelude::*;
use serde_json::json;

const SITE_ID: &str = "contoso.sharepoint.com,site-guid,web-guid";
const DRIVE_ID: &str = "b!drive-contabilidad";

fn tenant(server: &MockServer) -> TenantConfig {
    serde_json::from_value(json!({
        "tenant_id": "tenant-1",
        "client_id": "client-1",
        "client_secret": "not-a-real-secret",
        "site_hostname": "contoso.sharepoint.com",
        "site_path": "Finanzas",
        "document_library": "contabilidad",
        "base_path": "LJC/2025",
        "graph_base_url": server.base_url(),
        "login_base_url": server.base_url(),
    }))
    .unwrap()
}

fn jwt(payload: serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// Token, site and drives endpoints for a tenant whose library exists.
async fn mock_setup(server: &MockServer, token: &str) {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/tenant-1/oauth2/v2.0/token")
                .body_includes("grant_type=client_credentials")
                .body_includes("client_id=client-1");
            then.status(200).json_body(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": token,
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/sites/contoso.sharepoint.com:/sites/Finanzas")
                .header("authorization", format!("Bearer {token}"));
            then.status(200).json_body(json!({
                "id": SITE_ID,
                "webUrl": "https://contoso.sharepoint.com/sites/Finanzas",
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/sites/{SITE_ID}/drives"));
            then.status(200).json_body(json!({
                "value": [
                    { "id": "b!drive-docs", "name": "Documents" },
                    { "id": DRIVE_ID, "name": "Contabilidad" },
                ]
            }));
        })
        .await;
}

async fn connected(server: &MockServer) -> GraphClient {
    mock_setup(server, "tok-123").await;
    GraphClient::connect(&tenant(server), &CourierConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn connect_picks_library_case_insensitively() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    assert_eq!(client.site_id(), SITE_ID);
    assert_eq!(client.drive_id(), DRIVE_ID);
}

#[tokio::test]
async fn unknown_library_lists_available_ones() {
    let server = MockServer::start_async().await;
    mock_setup(&server, "tok-123").await;
    let mut t = tenant(&server);
    t.document_library = "Archivo".into();

    let err = GraphClient::connect(&t, &CourierConfig::default())
        .await
        .unwrap_err();
    match err {
        CourierError::SiteOrLibraryNotFound { detail, .. } => {
            assert!(detail.contains("Documents"), "got: {detail}");
            assert!(detail.contains("Contabilidad"), "got: {detail}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credentials_are_auth_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/tenant-1/oauth2/v2.0/token");
            then.status(401).json_body(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided.",
            }));
        })
        .await;

    let err = GraphClient::connect(&tenant(&server), &CourierConfig::default())
        .await
        .unwrap_err();
    match err {
        CourierError::AuthFailure { detail } => {
            assert!(detail.contains("401"), "got: {detail}");
            assert!(detail.contains("invalid_client"), "got: {detail}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn missing_site_is_fatal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/tenant-1/oauth2/v2.0/token");
            then.status(200).json_body(json!({ "access_token": "tok" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/sites/contoso.sharepoint.com:/sites/Finanzas");
            then.status(404)
                .json_body(json!({ "error": { "code": "itemNotFound" } }));
        })
        .await;

    let err = GraphClient::connect(&tenant(&server), &CourierConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::SiteOrLibraryNotFound { .. }));
}

#[tokio::test]
async fn children_follow_next_link() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/drives/{DRIVE_ID}/items/P1/children"))
                .query_param("$select", "id,name,folder,file,size,webUrl");
            then.status(200).json_body(json!({
                "value": [
                    { "id": "a", "name": "0701-0057_BCP", "folder": { "childCount": 2 } },
                ],
                "@odata.nextLink": server.url("/page-2"),
            }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET).path("/page-2");
            then.status(200).json_body(json!({
                "value": [
                    { "id": "b", "name": "0701-0058_BCP", "folder": {} },
                    { "id": "c", "name": "notas.txt", "file": {}, "size": 12 },
                ]
            }));
        })
        .await;

    let children = client
        .list_children(&DriveItem::folder("P1", "JUL"))
        .await
        .unwrap();
    first.assert_async().await;
    second.assert_async().await;

    let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["0701-0057_BCP", "0701-0058_BCP", "notas.txt"]);
    assert!(children[1].is_folder());
    assert!(!children[2].is_folder());
}

#[tokio::test]
async fn small_upload_puts_raw_bytes() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/drives/{DRIVE_ID}/items/F1:/cierre.pdf:/content"))
                .header("authorization", "Bearer tok-123")
                .header("content-type", "application/octet-stream")
                .body("%PDF-1.7 stub");
            then.status(201).json_body(json!({
                "id": "new-file",
                "name": "cierre.pdf",
                "size": 13,
                "file": {},
                "webUrl": "https://contoso.sharepoint.com/x/cierre.pdf",
            }));
        })
        .await;

    let item = client
        .upload_small(
            &DriveItem::folder("F1", "0701-0057_BCP"),
            "cierre.pdf",
            b"%PDF-1.7 stub".to_vec(),
        )
        .await
        .unwrap();
    put.assert_async().await;
    assert_eq!(item.id, "new-file");
    assert_eq!(item.size, Some(13));
}

#[tokio::test]
async fn session_chunks_carry_range_and_no_token() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    let session_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!(
                    "/drives/{DRIVE_ID}/items/F1:/lote.pdf:/createUploadSession"
                ))
                .body_includes("replace");
            then.status(200).json_body(json!({
                "uploadUrl": server.url("/upload/session-1"),
                "expirationDateTime": "2026-10-18T00:00:00Z",
            }));
        })
        .await;
    let first = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/upload/session-1")
                .header("content-range", "bytes 0-5/10")
                .header_missing("authorization");
            then.status(202)
                .json_body(json!({ "nextExpectedRanges": ["6-"] }));
        })
        .await;
    let last = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/upload/session-1")
                .header("content-range", "bytes 6-9/10")
                .header_missing("authorization");
            then.status(201).json_body(json!({
                "id": "big-file",
                "name": "lote.pdf",
                "size": 10,
                "file": {},
            }));
        })
        .await;

    let session: UploadSession = client
        .create_upload_session(&DriveItem::folder("F1", "0701-0057_BCP"), "lote.pdf")
        .await
        .unwrap();
    session_mock.assert_async().await;

    let status = client
        .upload_chunk(
            &session,
            ChunkRange {
                start: 0,
                end: 5,
                total: 10,
            },
            b"012345".to_vec(),
        )
        .await
        .unwrap();
    assert!(matches!(status, ChunkStatus::Accepted));

    let status = client
        .upload_chunk(
            &session,
            ChunkRange {
                start: 6,
                end: 9,
                total: 10,
            },
            b"6789".to_vec(),
        )
        .await
        .unwrap();
    first.assert_async().await;
    last.assert_async().await;
    match status {
        ChunkStatus::Completed(item) => assert_eq!(item.id, "big-file"),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn create_conflict_is_reported() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/drives/{DRIVE_ID}/items/P1/children"))
                .body_includes("\"fail\"");
            then.status(409)
                .json_body(json!({ "error": { "code": "nameAlreadyExists" } }));
        })
        .await;

    let err = client
        .create_folder(&DriveItem::folder("P1", "2025"), "JUL")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::CreationConflict { ref name, ref parent } if name == "JUL" && parent == "2025"
    ));
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/drives/{DRIVE_ID}/root:/LJC/2030"));
            then.status(404)
                .json_body(json!({ "error": { "code": "itemNotFound" } }));
        })
        .await;

    let err = client.get_by_path("/LJC/2030/").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/drives/{DRIVE_ID}/root"));
            then.status(503).body("x".repeat(2000));
        })
        .await;

    match client.root().await.unwrap_err() {
        RemoteError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), 500);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn check_reports_claims_libraries_and_base() {
    let server = MockServer::start_async().await;
    let token = jwt(json!({
        "aud": "https://graph.microsoft.com",
        "roles": ["Sites.ReadWrite.All"],
    }));
    mock_setup(&server, &token).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/drives/{DRIVE_ID}/root:/LJC/2025"));
            then.status(200).json_body(json!({
                "id": "base",
                "name": "2025",
                "folder": {},
                "webUrl": "https://contoso.sharepoint.com/LJC/2025",
            }));
        })
        .await;

    let report = check_connection(&tenant(&server), &CourierConfig::default())
        .await
        .unwrap();

    let claims = report.claims.unwrap();
    assert_eq!(claims.roles, vec!["Sites.ReadWrite.All"]);
    assert_eq!(claims.aud.as_deref(), Some("https://graph.microsoft.com"));
    assert_eq!(report.site_id, SITE_ID);
    assert_eq!(report.libraries, vec!["Documents", "Contabilidad"]);
    assert!(report.library_found);
    let base = report.base_path.unwrap();
    assert!(base.found);
    assert_eq!(
        base.web_url.as_deref(),
        Some("https://contoso.sharepoint.com/LJC/2025")
    );
}

#[tokio::test]
async fn check_reports_missing_base_without_failing() {
    let server = MockServer::start_async().await;
    mock_setup(&server, "opaque-token").await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/drives/{DRIVE_ID}/root:/LJC/2025"));
            then.status(404).json_body(json!({}));
        })
        .await;

    let report = check_connection(&tenant(&server), &CourierConfig::default())
        .await
        .unwrap();
    assert!(report.claims.is_none());
    let base = report.base_path.unwrap();
    assert!(!base.found);
    assert!(base.detail.is_some());
}
