//! 应用状态定义

use std::sync::Arc;

use crate::service::RedemptionEngine;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RedemptionEngine>,
    /// 健康检查响应中返回的服务名
    pub service_name: String,
}

impl AppState {
    pub fn new(engine: Arc<RedemptionEngine>, service_name: impl Into<String>) -> Self {
        Self {
            engine,
            service_name: service_name.into(),
        }
    }
}
