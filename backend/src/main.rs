use std::sync::Arc;

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{extract::State, middleware, Router};
use redis::Client as RedisClient;
use shared::prize::PrizeTable;
use shared::rate_limit::RateLimitType;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::games::backend_spin_game::create_router as create_spin_game_router;
use crate::rate_limiter::RateLimitError;
use crate::services::rotation_service::{self, spawn_rotation_task, RotationStore};
use crate::services::spin_recorder::SpinRecorder;

mod config;
mod error;
mod games;
mod logging;
mod rate_limiter;
mod services;

#[derive(Clone)]
pub struct AppState {
    prizes: Arc<PrizeTable>,
    redis: Option<RedisClient>,
    recorder: SpinRecorder,
    receipt_secret: Arc<String>,
    rotation: RotationStore,
    rotation_interval: chrono::Duration,
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prefers "cf-connecting-ip", then the first "x-forwarded-for" hop, then "x-real-ip".
fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header("cf-connecting-ip")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .or_else(|| header("x-real-ip"))
        .unwrap_or("unknown")
        .to_string()
}

async fn api_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: middleware::Next,
) -> Result<Response<Body>, RateLimitError> {
    let ip = client_ip(request.headers());
    rate_limiter::enforce(state.redis.as_ref(), RateLimitType::Api, &ip).await?;
    Ok(next.run(request).await)
}

async fn spin_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: middleware::Next,
) -> Result<Response<Body>, RateLimitError> {
    if request.method() == Method::POST {
        let ip = client_ip(request.headers());
        rate_limiter::enforce(state.redis.as_ref(), RateLimitType::Spin, &ip).await?;
    }
    Ok(next.run(request).await)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-requested-with"),
        ])
}

pub(crate) fn build_router(state: AppState, origins: &[String]) -> Router {
    let spin_routes = create_spin_game_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        spin_rate_limit_middleware,
    ));

    let api_routes = Router::new()
        .route("/health_check", get(health_check))
        .route("/domains/rotation", get(rotation_service::get_rotation))
        .merge(spin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), api_rate_limit_middleware));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors_layer(origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn open_redis(url: Option<&str>) -> Option<RedisClient> {
    let url = url?;
    match RedisClient::open(url) {
        Ok(client) => Some(client),
        Err(e) => {
            error!("Invalid REDIS_URL, continuing without redis: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path(".env").ok();
    logging::setup()?;

    let config = Config::from_env()?;
    let prizes = config.load_prizes()?;

    let redis = open_redis(config.redis_url.as_deref());
    let recorder = match &redis {
        Some(client) => SpinRecorder::Redis(client.clone()),
        None => {
            info!("REDIS_URL not set, spins are logged only and rate limiting is off");
            SpinRecorder::Log
        }
    };

    let rotation = RotationStore::new(config.rotation_file.clone());
    spawn_rotation_task(rotation.clone(), config.rotation_interval);

    let state = AppState {
        prizes: Arc::new(prizes),
        redis,
        recorder,
        receipt_secret: Arc::new(config.receipt_secret.clone()),
        rotation,
        rotation_interval: config.rotation_interval,
    };

    let app = build_router(state, &config.allowed_origins);

    info!("🚀 Retailstar spin service listening on {}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_state(rotation_dir: &std::path::Path) -> AppState {
    AppState {
        prizes: Arc::new(PrizeTable::default()),
        redis: None,
        recorder: SpinRecorder::Log,
        receipt_secret: Arc::new("test_secret".to_string()),
        rotation: RotationStore::new(rotation_dir.join("rotation.json")),
        rotation_interval: chrono::Duration::hours(24),
    }
}
