use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use courier_db::DbPool;

async fn healthz(State(pool): State<DbPool>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => "ok",
        Err(_) => "degraded",
    };
    Json(json!({ "status": "ok", "database": database }))
}

pub fn router(pool: DbPool) -> Router {
    Router::new().route("/healthz", get(healthz)).with_state(pool)
}

pub async fn spawn(bind_address: &str, port: u16, pool: DbPool) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    let app = router(pool);

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "health endpoint stopped");
        }
    });

    tracing::info!(bind_address, port, "health endpoint listening");
    Ok(())
}
