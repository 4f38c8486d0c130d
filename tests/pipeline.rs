mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{harness, record};
use stock_data_viz::database::store::SeriesStore;
use stock_data_viz::processor::ingest::{ingest_symbol, ingest_symbols};
use stock_data_viz::processor::join::rebuild_joined;
use stock_data_viz::server::router;
use stock_data_viz::utils::timestamp::parse_timestamp;
use tower::ServiceExt;

#[tokio::test]
async fn reingesting_same_history_keeps_one_bar_per_day() {
    let h = harness("AAA", "BBB");
    h.provider.set(
        "AAA",
        vec![record(2024, 1, 1, 10.0), record(2024, 1, 2, 11.0), record(2024, 1, 3, 12.0)],
    );

    ingest_symbol(&h.ctx, "AAA").await.unwrap();
    ingest_symbol(&h.ctx, "AAA").await.unwrap();

    assert_eq!(h.store.count_bars("AAA").await.unwrap(), 3);
    assert_eq!(h.store.collections(), vec!["stock_data_AAA".to_string()]);
}

#[tokio::test]
async fn stored_prices_are_rounded_and_volume_kept() {
    let h = harness("AAA", "BBB");
    let mut raw = record(2024, 1, 2, 101.23456);
    raw.open = 99.9996;
    raw.volume = 987_654_321;
    h.provider.set("AAA", vec![raw]);

    let report = ingest_symbol(&h.ctx, "AAA").await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.written, 1);

    let bars = h.store.load_series("AAA").await.unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].timestamp, parse_timestamp("2024-01-02 00:00:00").unwrap());
    assert_eq!(bars[0].close, 101.235);
    assert_eq!(bars[0].open, 100.0);
    assert_eq!(bars[0].volume, 987_654_321);
}

#[tokio::test]
async fn changed_close_is_updated_in_place() {
    let h = harness("AAA", "BBB");
    h.provider.set("AAA", vec![record(2024, 1, 1, 10.0), record(2024, 1, 2, 11.0)]);
    ingest_symbol(&h.ctx, "AAA").await.unwrap();

    h.provider.set("AAA", vec![record(2024, 1, 1, 10.0), record(2024, 1, 2, 11.5)]);
    ingest_symbol(&h.ctx, "AAA").await.unwrap();

    let bars = h.store.load_series("AAA").await.unwrap();
    assert_eq!(bars.len(), 2);
    let updated = bars
        .iter()
        .find(|b| b.timestamp == parse_timestamp("2024-01-02 00:00:00").unwrap())
        .unwrap();
    assert_eq!(updated.close, 11.5);
}

#[tokio::test]
async fn repeated_date_in_one_history_keeps_later_record() {
    let h = harness("AAA", "BBB");
    h.provider.set(
        "AAA",
        vec![record(2024, 1, 1, 10.0), record(2024, 1, 1, 12.0)],
    );

    let report = ingest_symbol(&h.ctx, "AAA").await.unwrap();
    assert_eq!(report.fetched, 2);

    let bars = h.store.load_series("AAA").await.unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].close, 12.0);
}

#[tokio::test]
async fn join_keeps_only_dates_present_in_both_series() {
    let h = harness("AAA", "BBB");
    h.provider.set("AAA", vec![record(2024, 1, 1, 10.0), record(2024, 1, 2, 11.0)]);
    h.provider.set("BBB", vec![record(2024, 1, 1, 20.0)]);

    let symbols = h.ctx.config.ingest.symbols.clone();
    let outcomes = ingest_symbols(&h.ctx, &symbols).await;
    assert!(outcomes.iter().all(|o| o.is_ok()));

    let pair = h.ctx.join_pair().unwrap();
    let report = rebuild_joined(&h.ctx, &pair).await.unwrap();
    assert_eq!(report.left_rows, 2);
    assert_eq!(report.right_rows, 1);
    assert_eq!(report.joined_rows, 1);

    let rows = h.store.load_joined(&pair).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, parse_timestamp("2024-01-01 00:00:00").unwrap());
    assert_eq!(rows[0].left_close, 10.0);
    assert_eq!(rows[0].right_close, 20.0);
}

#[tokio::test]
async fn failing_symbol_does_not_stop_the_rest() {
    let h = harness("AAA", "BBB");
    h.provider.set("BBB", vec![record(2024, 1, 1, 20.0)]);

    let symbols = vec!["MISSING".to_string(), "BBB".to_string()];
    let outcomes = ingest_symbols(&h.ctx, &symbols).await;

    assert_eq!(outcomes.len(), 2);
    let err = outcomes[0].result.as_ref().unwrap_err();
    assert_eq!(err.symbol(), "MISSING");
    assert_eq!(err.stage(), "fetch");
    assert!(outcomes[1].is_ok());
    assert_eq!(h.store.count_bars("BBB").await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_symbol_fails_at_store_stage() {
    let h = harness("AAA", "BBB");
    let outcomes = ingest_symbols(&h.ctx, &["".to_string()]).await;
    assert_eq!(outcomes[0].result.as_ref().unwrap_err().stage(), "store");
}

#[tokio::test]
async fn visualize_serves_embedded_png() {
    let h = harness("AAA", "BBB");
    h.provider.set("AAA", vec![record(2024, 1, 1, 10.0), record(2024, 1, 2, 11.0)]);
    h.provider.set("BBB", vec![record(2024, 1, 1, 20.0), record(2024, 1, 2, 19.0)]);
    let symbols = h.ctx.config.ingest.symbols.clone();
    ingest_symbols(&h.ctx, &symbols).await;
    rebuild_joined(&h.ctx, &h.ctx.join_pair().unwrap()).await.unwrap();

    let response = router(h.ctx.clone())
        .oneshot(Request::builder().uri("/visualize").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    let marker = "data:image/png;base64,";
    let start = html.find(marker).unwrap() + marker.len();
    let encoded: String = html[start..].chars().take_while(|c| *c != '"').collect();
    assert!(!encoded.is_empty());
    // base64 of the PNG signature
    assert!(encoded.starts_with("iVBORw0KGgo"));
}

#[tokio::test]
async fn visualize_accepts_post_and_ignores_body() {
    let h = harness("AAA", "BBB");
    h.provider.set("AAA", vec![record(2024, 1, 1, 10.0)]);
    h.provider.set("BBB", vec![record(2024, 1, 1, 20.0)]);
    let symbols = h.ctx.config.ingest.symbols.clone();
    ingest_symbols(&h.ctx, &symbols).await;
    rebuild_joined(&h.ctx, &h.ctx.join_pair().unwrap()).await.unwrap();

    let response = router(h.ctx.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/visualize")
                .body(Body::from("ignored"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn visualize_without_joined_rows_is_not_found() {
    let h = harness("AAA", "BBB");

    let response = router(h.ctx.clone())
        .oneshot(Request::builder().uri("/visualize").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness("AAA", "BBB");
    let response = router(h.ctx.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
