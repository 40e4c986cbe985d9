//! Catalog page, HTMX results and motorcycle detail.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use azmotos_integration_tests::{
    BMW_ID, DUCATI_ID, FakeGateway, TestApp, body_text, bmw_row, ducati_row,
};
use azmotos_storefront::config::CatalogFailureMode;

#[tokio::test]
async fn test_brand_filter_from_url() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(app.get("/catalog?brand=BMW", Some(&cookie)).await).await;
    assert!(body.contains("BMW R 1250 GS Adventure"));
    assert!(!body.contains("Panigale"));
    assert!(body.contains(r#"value="BMW" checked"#));
}

#[tokio::test]
async fn test_unknown_brand_shows_everything() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(app.get("/catalog?brand=Vespa", Some(&cookie)).await).await;
    assert!(body.contains("R 1250 GS Adventure"));
    assert!(body.contains("Panigale V4"));
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_trimmed() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(
        app.get_htmx("/catalog/results?brand=all&q=+PANIGALE+", Some(&cookie))
            .await,
    )
    .await;
    assert!(body.contains("Ducati Panigale V4"));
    assert!(!body.contains("BMW"));
    assert!(body.contains("hx-swap-oob"));
}

#[tokio::test]
async fn test_search_matches_description() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(
        app.get_htmx("/catalog/results?q=adventure+tourer", Some(&cookie))
            .await,
    )
    .await;
    assert!(body.contains("R 1250 GS Adventure"));
    assert!(!body.contains("Panigale"));
}

#[tokio::test]
async fn test_empty_result_state() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(
        app.get_htmx("/catalog/results?brand=Honda", Some(&cookie))
            .await,
    )
    .await;
    assert!(body.contains("No motorcycles match"));
}

#[tokio::test]
async fn test_prices_use_tenge_grouping() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(app.get("/catalog", Some(&cookie)).await).await;
    assert!(body.contains("12 500 000 ₸"));
    assert!(body.contains("14 900 000 ₸"));
    assert!(body.contains("/static/img/default-motorcycle.svg"));
}

#[tokio::test]
async fn test_filter_panel_toggle_keeps_filters() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(app.get("/catalog?brand=BMW&q=gs", Some(&cookie)).await).await;
    assert_eq!(
        toggle_href(&body),
        "/catalog?brand=BMW&q=gs&filters=open"
    );

    let body = body_text(
        app.get("/catalog?brand=BMW&q=gs&filters=open", Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(toggle_href(&body), "/catalog?brand=BMW&q=gs");
}

/// The filter toggle's link, with HTML entities for `&` decoded.
fn toggle_href(body: &str) -> String {
    let marker = r#"class="filter-toggle" href=""#;
    let start = body.find(marker).unwrap() + marker.len();
    let end = start + body[start..].find('"').unwrap();
    body[start..end].replace("&#38;", "&").replace("&amp;", "&")
}

#[tokio::test]
async fn test_query_failure_silent_keeps_results() {
    let gateway = FakeGateway::new().with_rows("motorcycles", [bmw_row()]);
    gateway.add_user("rider@azmotos.kz", "throttle-42");
    let app = TestApp::new(gateway);
    let cookie = app.sign_in_member().await;
    app.gateway.fail_queries(true);

    let response = app.get_htmx("/catalog/results?brand=BMW", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_query_failure_banner_retargets() {
    let gateway = FakeGateway::new().with_rows("motorcycles", [bmw_row()]);
    gateway.add_user("rider@azmotos.kz", "throttle-42");
    let app = TestApp::with_config(gateway, |config| {
        config.catalog_failure_mode = CatalogFailureMode::Banner;
    });
    let cookie = app.sign_in_member().await;
    app.gateway.fail_queries(true);

    let response = app.get_htmx("/catalog/results?brand=BMW", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-retarget"], "#catalog-error");
    assert!(body_text(response).await.contains("banner-error"));
}

#[tokio::test]
async fn test_detail_page_shows_specs_and_price() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let response = app.get(&format!("/motorcycle/{BMW_ID}"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("R 1250 GS Adventure"));
    assert!(body.contains("1254 cc boxer twin"));
    assert!(body.contains("220 km/h"));
    assert!(body.contains("12 500 000 ₸"));
    assert!(body.contains("Back to catalog"));
}

#[tokio::test]
async fn test_detail_page_without_specs_shows_unspecified() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let body = body_text(
        app.get(&format!("/motorcycle/{DUCATI_ID}"), Some(&cookie))
            .await,
    )
    .await;
    assert!(body.contains("unspecified"));
    assert!(body.contains("No description."));
    assert!(body.contains("https://example.supabase.co/storage/v1/object/public/bikes/v4.jpg"));
}

#[tokio::test]
async fn test_unknown_or_malformed_id_is_not_found() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let response = app.get("/motorcycle/not-a-uuid", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.gateway.calls().get_row_by_id, 0);

    let response = app
        .get("/motorcycle/00000000-0000-0000-0000-000000000000", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.gateway.calls().get_row_by_id, 1);
    assert!(body_text(response).await.contains("Back to catalog"));

    let response = app.get("/motorcycle", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_page_without_rows() {
    let gateway = FakeGateway::new().with_rows("motorcycles", [ducati_row()]);
    gateway.add_user("rider@azmotos.kz", "throttle-42");
    let app = TestApp::new(gateway);
    let cookie = app.sign_in_member().await;

    let body = body_text(app.get("/catalog?brand=KTM", Some(&cookie)).await).await;
    assert!(body.contains("No motorcycles match"));
}
