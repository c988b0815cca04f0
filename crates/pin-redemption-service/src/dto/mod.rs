//! HTTP 请求与响应 DTO

pub mod request;
pub mod response;

pub use request::RedemptionRequest;
pub use response::{MessageResponse, RedemptionResponse};
