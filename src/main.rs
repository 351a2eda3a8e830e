mod application;
mod config;
mod domain;
mod persistence;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::services::journal_service::JournalService;
use crate::config::JournalConfig;
use crate::domain::entities::settings::SettingsUpdate;
use crate::domain::entities::trade::TradeDraft;
use crate::domain::errors::RiskError;
use crate::domain::services::pattern_detector::{NoopAdvisor, PatternAdvisor, RulePatternDetector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradekeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Tradekeeper journal server starting...");

    let db_config = persistence::DatabaseConfig::from_env();
    let pool = persistence::init_database(&db_config.url).await?;

    let config = JournalConfig::from_env();
    let advisor: Arc<dyn PatternAdvisor> = if config.advisory_enabled {
        Arc::new(RulePatternDetector::default())
    } else {
        Arc::new(NoopAdvisor)
    };

    let bind_addr = config.bind_addr.clone();
    let service = Arc::new(JournalService::new(pool, advisor, config));

    let app = Router::new()
        .route("/", get(|| async { "Tradekeeper journal server is running!" }))
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/settings", get(get_settings))
        .route("/settings", put(update_settings))
        .route("/risk/status", get(risk_status))
        .route("/trades", post(create_trade))
        .route("/trades", get(list_trades))
        .route("/trades/:trade_id", delete(delete_trade))
        .route("/metrics/daily", get(daily_pl))
        .route("/metrics/performance", get(performance))
        .route("/metrics/equity-curve", get(equity_curve))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

type Service = Arc<JournalService>;
type ApiResponse = Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)>;

/// The caller's identity. Authentication itself is an external concern;
/// the glue only requires an x-user-id header.
fn user_id(headers: &HeaderMap) -> Result<String, (StatusCode, Json<serde_json::Value>)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| reject(RiskError::Unauthorized))
}

fn reject(err: RiskError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        RiskError::ConfigurationMissing | RiskError::NotFound => StatusCode::NOT_FOUND,
        RiskError::Unauthorized => StatusCode::UNAUTHORIZED,
        RiskError::ValidationError { .. } => StatusCode::BAD_REQUEST,
        RiskError::DailyLossLimitExceeded { .. }
        | RiskError::MaxTradesReached { .. }
        | RiskError::RewardRatioTooLow { .. }
        | RiskError::RiskPerTradeTooHigh { .. }
        | RiskError::ChecklistIncomplete => StatusCode::UNPROCESSABLE_ENTITY,
        RiskError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::json!({
        "error": err.to_string(),
        "rejection": err,
    });
    (status, Json(body))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn register(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let settings = service.register_user(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}

async fn get_settings(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let settings = service.get_settings(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}

async fn update_settings(
    State(service): State<Service>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> ApiResponse {
    let user = user_id(&headers)?;
    let settings = service.update_settings(&user, update).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}

async fn risk_status(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    match service.is_trade_allowed(&user).await {
        Ok(admission) => Ok(Json(serde_json::json!({
            "allowed": true,
            "admission": admission,
        }))),
        // Risk rejections are a valid answer here, not an HTTP failure.
        Err(
            err @ (RiskError::DailyLossLimitExceeded { .. } | RiskError::MaxTradesReached { .. }),
        ) => Ok(Json(serde_json::json!({
            "allowed": false,
            "reason": err.to_string(),
            "rejection": err,
        }))),
        Err(err) => Err(reject(err)),
    }
}

async fn create_trade(
    State(service): State<Service>,
    headers: HeaderMap,
    Json(draft): Json<TradeDraft>,
) -> ApiResponse {
    let user = user_id(&headers)?;
    let admitted = service.create_trade(&user, draft).await.map_err(reject)?;
    Ok(Json(serde_json::json!({
        "trade": admitted.trade,
        "warning": admitted.warning,
    })))
}

async fn list_trades(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let trades = service.list_trades(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "trades": trades })))
}

async fn delete_trade(
    State(service): State<Service>,
    headers: HeaderMap,
    Path(trade_id): Path<String>,
) -> ApiResponse {
    let user = user_id(&headers)?;
    let trade = service.delete_trade(&user, &trade_id).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "deleted": trade.id })))
}

async fn daily_pl(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let pl = service.daily_pl(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "daily": pl })))
}

async fn performance(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let metrics = service.performance(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "metrics": metrics })))
}

async fn equity_curve(State(service): State<Service>, headers: HeaderMap) -> ApiResponse {
    let user = user_id(&headers)?;
    let curve = service.equity_curve(&user).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "curve": curve })))
}
