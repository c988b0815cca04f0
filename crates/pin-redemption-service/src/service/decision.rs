//! 兑换决策
//!
//! 每次兑换请求恰好产生一个决策。内部保留 AlreadyConsumed 与 NotFound 的区分，
//! 对外通过 `public_outcome` 合并，调用方无法据此探测某个 PIN 是否曾经存在。

use std::fmt;

/// 兑换决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionDecision {
    /// 凭证已被本次请求核销
    Granted,
    /// 不存在该 PIN 码
    NotFound,
    /// PIN 码存在但已被核销（仅内部可见）
    AlreadyConsumed,
    /// 凭证的产品类别不包含该应用，凭证未被核销
    Denied(String),
    /// 输入格式不合法，未访问存储
    InvalidInput(String),
    /// 存储不可用，无法确定结果
    StoreUnavailable,
}

/// 对外公开的决策类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicOutcome {
    Granted,
    NotFound,
    Denied,
    InvalidInput,
    StoreUnavailable,
}

impl PublicOutcome {
    /// 对外错误码
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::NotFound => "NOT_FOUND",
            Self::Denied => "DENIED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    /// 对外提示文案
    pub fn message(&self) -> &'static str {
        match self {
            Self::Granted => "Access granted",
            Self::NotFound => "PIN not found.",
            Self::Denied => "Access to this application is denied for this PIN.",
            Self::InvalidInput => "pin_code and app_id are required",
            Self::StoreUnavailable => "An error occurred while validating the PIN.",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl RedemptionDecision {
    /// 内部决策标签（日志和指标）
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyConsumed => "ALREADY_CONSUMED",
            Self::Denied(_) => "DENIED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    /// 对外类别，AlreadyConsumed 合并为 NotFound
    pub fn public_outcome(&self) -> PublicOutcome {
        match self {
            Self::Granted => PublicOutcome::Granted,
            Self::NotFound | Self::AlreadyConsumed => PublicOutcome::NotFound,
            Self::Denied(_) => PublicOutcome::Denied,
            Self::InvalidInput(_) => PublicOutcome::InvalidInput,
            Self::StoreUnavailable => PublicOutcome::StoreUnavailable,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// 是否可以原样重试
    ///
    /// 只有存储不可用时结果未知；其余决策重试也会得到相同或更差的结果
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl fmt::Display for RedemptionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(app) => write!(f, "{} ({})", self.tag(), app),
            Self::InvalidInput(reason) => write!(f, "{} ({})", self.tag(), reason),
            _ => f.write_str(self.tag()),
        }
    }
}
