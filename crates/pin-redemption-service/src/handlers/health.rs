//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

/// 存活探针：进程正常即返回 ok
///
/// GET /health/live
pub async fn live(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
    }))
}

/// 就绪探针：检查凭证存储是否可用
///
/// GET /health/ready
///
/// 存储不可用时返回 503，负载均衡据此摘除实例
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_ok = state.engine.health_check().await.is_ok();
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if store_ok { "ok" } else { "degraded" },
            "service": state.service_name,
            "checks": {
                "store": {
                    "backend": state.engine.backend(),
                    "status": if store_ok { "ok" } else { "fail" },
                }
            }
        })),
    )
}
