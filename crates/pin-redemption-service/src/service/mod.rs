//! 服务层
//!
//! - `decision`: 兑换决策及其对外表现
//! - `engine`: 兑换引擎（校验、查找、授权、条件核销）
//! - `input`: 兑换输入校验

pub mod decision;
pub mod engine;
mod input;

pub use decision::{PublicOutcome, RedemptionDecision};
pub use engine::RedemptionEngine;
