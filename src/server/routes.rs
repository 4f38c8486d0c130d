use crate::context::AppContext;
use crate::error::AppError;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");
const IMAGE_PLACEHOLDER: &str = "{{ dataframe }}";

pub fn routes() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/visualize", get(visualize).post(visualize))
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Render the joined collection as an inline PNG inside the page template.
async fn visualize(State(ctx): State<Arc<AppContext>>) -> Result<Html<String>, AppError> {
    let pair = ctx.join_pair()?;
    let rows = ctx.store.load_joined(&pair).await?;
    debug!("Loaded {} joined rows for {} and {}", rows.len(), pair.left(), pair.right());

    let renderer = ctx.chart.clone();
    let encoded = tokio::task::spawn_blocking(move || renderer.render_base64(&pair, &rows))
        .await
        .map_err(|e| {
            error!("Chart render task failed: {}", e);
            AppError::Task(e.to_string())
        })??;

    Ok(Html(INDEX_TEMPLATE.replace(IMAGE_PLACEHOLDER, &encoded)))
}
