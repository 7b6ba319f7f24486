//! HTTP route definitions

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::store::skills::BotStats;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Stats requests wait on the tick task, which answers within a tick
const STATS_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // No configured origins means any origin may connect
    let origin = if state.config.client_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let allowed: Vec<HeaderValue> = state
            .config
            .client_origins
            .iter()
            .filter_map(|s| s.parse::<HeaderValue>().ok())
            .collect();
        AllowOrigin::list(allowed)
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let bot_routes = Router::new()
        .route("/bots/stats", get(all_bot_stats_handler))
        .route("/bots/stats/:bot_id", get(bot_stats_handler))
        .layer(TimeoutLayer::new(STATS_TIMEOUT));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .merge(bot_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connected_sessions: usize,
    /// Roster size from `BOT_COUNT`
    configured_bots: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connected_sessions: state.sessions.len(),
        configured_bots: state.config.bot_count,
    })
}

// ============================================================================
// Bot stats endpoints
// ============================================================================

async fn all_bot_stats_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, BotStats>>, AppError> {
    state
        .world
        .bot_stats()
        .await
        .map(Json)
        .ok_or(AppError::Unavailable)
}

async fn bot_stats_handler(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<Json<BotStats>, AppError> {
    let mut stats = state.world.bot_stats().await.ok_or(AppError::Unavailable)?;
    stats
        .remove(&bot_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No profile for {bot_id}")))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Simulation unavailable")]
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::{Config, GameTuning};
    use crate::game::bot::BotStrategyKind;
    use crate::game::map::MapGrid;
    use crate::game::{TickScheduler, World, WorldHandle};
    use crate::store::SkillStore;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            map_path: dir.join("map.json"),
            skill_store_path: dir.join("skills.json"),
            skill_flush_interval: Duration::from_secs(60),
            bot_count: 2,
            bot_strategy: BotStrategyKind::Basic,
            world_seed: Some(1),
            client_origins: Vec::new(),
            tuning: GameTuning::default(),
        }
    }

    fn start(config: &Config) -> WorldHandle {
        let mut world = World::new(
            MapGrid::open(10, 32.0),
            config.tuning,
            SkillStore::new(),
            config.bot_strategy,
            1,
        );
        world.spawn_bots(config.bot_count);
        let (scheduler, handle) = TickScheduler::new(
            world,
            config.skill_store_path.clone(),
            config.skill_flush_interval,
        );
        tokio::spawn(scheduler.run());
        handle
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_and_bot_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let handle = start(&config);
        let router = build_router(AppState::new(config, handle.clone(), "{}".into()));

        let (status, body) = get_json(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connected_sessions"], 0);
        assert_eq!(body["configured_bots"], 2);

        let (status, body) = get_json(router.clone(), "/bots/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_object().unwrap().len(), 2);
        assert_eq!(body["bot_1"]["level"], 1);

        let (status, body) = get_json(router.clone(), "/bots/stats/bot_0").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["kdr"].is_number());

        let (status, body) = get_json(router.clone(), "/bots/stats/bot_9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("bot_9"));

        handle.shutdown();
    }
}
