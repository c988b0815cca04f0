//! 路由配置模块

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{info, warn};

use pin_shared::config::CorsConfig;
use pin_shared::observability::middleware as obs_middleware;

use crate::{handlers, state::AppState};

/// 兑换 API 路由
///
/// 路由上未注册的方法统一返回 405
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/validate",
            post(handlers::redemption::validate_pin)
                .fallback(handlers::redemption::method_not_allowed),
        )
        .route(
            "/api/test",
            post(handlers::redemption::test_endpoint)
                .fallback(handlers::redemption::method_not_allowed),
        )
}

/// 健康检查路由
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(handlers::health::live))
        .route("/health/ready", get(handlers::health::ready))
}

/// 根据配置构建 CORS 层
///
/// 只开放 POST 和 OPTIONS，允许 Content-Type 与 Authorization 请求头
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = config.allowed_origins.trim();
    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let list: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| match s.trim().parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = s, "忽略无效的 CORS 来源");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };
    info!(allowed_origins = origins, "CORS configured");

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// 组装完整应用
pub fn app(state: AppState, cors: &CorsConfig, request_timeout: Duration) -> Router {
    Router::new()
        .merge(api_routes())
        .merge(health_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer(cors))
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
