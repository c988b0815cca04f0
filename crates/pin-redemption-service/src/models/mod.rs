//! 领域模型
//!
//! 凭证实体、状态枚举以及存储查询/核销结果

pub mod credential;
pub mod enums;

pub use credential::{ConsumeOutcome, Credential, CredentialId, Lookup, mask_code};
pub use enums::CredentialStatus;
