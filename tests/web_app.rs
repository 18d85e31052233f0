#![cfg(feature = "web")]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use daily_report::app::{AppState, router};
use daily_report::config::ServerConfig;
use regex::Regex;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "----daily-report-test-boundary";

const DAILY_CSV: &str = "id,user_id,login,status,registration_date,last_login_date,logged_in_day,have_bet,total_deposit_amount,total_withdrawal_amount,total_release_bonus_amount\n\
2024-03-07,1,ana,active,2024-03-07,2024-03-07 09:30:00,yes,no,0,0,5\n\
2024-03-07,2,beto,active,2024-01-10,,no,yes,20,-10,0\n\
2024-03-07,1,ana,active,2024-03-07,2024-03-07 11:00:00,no,yes,0,0,0\n";

fn state() -> Arc<AppState> {
    Arc::new(AppState::new(ServerConfig::default()).unwrap())
}

fn upload_request(file_name: &str, contents: &str, bet_rule: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    if let Some(rule) = bet_rule {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"bet_rule\"\r\n\r\n{rule}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n--{BOUNDARY}--\r\n"
    ));

    Request::builder()
        .method("POST")
        .uri("/report")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

fn report_id(html: &str) -> String {
    let re = Regex::new(r"/api/reports/([0-9a-f-]{36})").unwrap();
    re.captures(html).unwrap()[1].to_string()
}

#[tokio::test]
async fn test_upload_page() {
    let response = router(state()).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Iniciar procesamiento"));
    assert!(html.contains("name=\"file\""));
    assert!(html.contains(".xlsm,.xlsb,.ods"));
}

#[tokio::test]
async fn test_upload_renders_report_and_exports() {
    let state = state();

    let response = router(state.clone())
        .oneshot(upload_request("resumen.csv", DAILY_CSV, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Usuarios que iniciaron sesión: <b>1</b>"));
    assert!(html.contains("Usuarios que apostaron: <b>2</b>"));
    let id = report_id(&html);

    let response = router(state.clone())
        .oneshot(get(&format!("/api/reports/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["report_date"], "2024-03-07");
    assert_eq!(json["metrics"]["logged_in"], 1);
    assert_eq!(json["metrics"]["new_users"]["total"], 2);

    let response = router(state.clone())
        .oneshot(get(&format!("/reports/{id}/download/new-users")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("nuevos_usuarios.xlsx"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], b"PK");

    let response = router(state.clone())
        .oneshot(get(&format!("/reports/{id}/download/login-no-bet?format=csv")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let csv = body_text(response).await;
    assert!(csv.starts_with("User ID,Login,Hora Login"));
    assert!(csv.contains("1,ana,09:30:00"));

    let response = router(state)
        .oneshot(get(&format!("/reports/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bet_rule_field_overrides_default() {
    let state = state();
    let response = router(state.clone())
        .oneshot(upload_request(
            "resumen.csv",
            DAILY_CSV,
            Some("identifier-difference"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = report_id(&body_text(response).await);

    let response = router(state)
        .oneshot(get(&format!("/api/reports/{id}")))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["bet_rule"], "identifier-difference");
    // user 1 bet on one of its rows, so its logged-in row counts as a bet
    assert_eq!(json["metrics"]["login_without_bet"], 0);
}

#[tokio::test]
async fn test_missing_column_shows_error() {
    let response = router(state())
        .oneshot(upload_request(
            "resumen.csv",
            "id,user_id,logged_in_day\n2024-03-07,1,yes\n",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("have_bet"));
    assert!(html.contains("Iniciar procesamiento"));
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected() {
    let response = router(state())
        .oneshot(upload_request("resumen.pdf", "not a sheet", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_report_and_table() {
    let state = state();
    let response = router(state.clone())
        .oneshot(get(
            "/api/reports/00000000-0000-4000-8000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for uri in [
        "/reports/not-a-report",
        "/api/reports/not-a-report",
        "/reports/not-a-report/download/new-users",
    ] {
        let response = router(state.clone()).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let response = router(state.clone())
        .oneshot(upload_request("resumen.csv", DAILY_CSV, None))
        .await
        .unwrap();
    let id = report_id(&body_text(response).await);

    let response = router(state)
        .oneshot(get(&format!("/reports/{id}/download/everyone")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
