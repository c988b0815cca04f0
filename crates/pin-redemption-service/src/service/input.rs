//! 兑换输入校验

use validator::{Validate, ValidationError};

/// 待校验的兑换输入
#[derive(Debug, Validate)]
pub(crate) struct RedemptionInput {
    #[validate(
        length(min = 1, max = 64, message = "PIN 码长度必须在1-64个字符之间"),
        custom(function = "validate_token")
    )]
    code: String,

    #[validate(
        length(min = 1, max = 64, message = "应用 ID 长度必须在1-64个字符之间"),
        custom(function = "validate_token")
    )]
    application_id: String,
}

impl RedemptionInput {
    pub(crate) fn new(code: &str, application_id: &str) -> Self {
        Self {
            code: code.to_string(),
            application_id: application_id.to_string(),
        }
    }

    /// 校验失败的字段名（排序后逗号分隔），校验通过时为 None
    pub(crate) fn invalid_fields(&self) -> Option<String> {
        let errors = self.validate().err()?;
        let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        Some(fields.join(", "))
    }
}

/// 仅允许 ASCII 字母、数字、`_`、`-`，不做任何裁剪
fn validate_token(value: &str) -> Result<(), ValidationError> {
    if value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_charset").with_message("只允许字母、数字、下划线和连字符".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(code: &str, app: &str) -> Option<String> {
        RedemptionInput::new(code, app).invalid_fields()
    }

    #[test]
    fn test_valid_input() {
        assert_eq!(invalid("ABC123", "app1"), None);
        assert_eq!(invalid("a-b_c", "APP-2"), None);
        assert_eq!(invalid(&"A".repeat(64), "app1"), None);
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        assert_eq!(invalid("", "app1").as_deref(), Some("code"));
        assert_eq!(invalid("", "").as_deref(), Some("application_id, code"));
    }

    #[test]
    fn test_whitespace_is_not_trimmed() {
        assert!(invalid(" ABC123", "app1").is_some());
        assert!(invalid("ABC123", "app1\n").is_some());
    }

    #[test]
    fn test_overlong_and_non_ascii_are_rejected() {
        assert!(invalid(&"A".repeat(65), "app1").is_some());
        assert!(invalid("ÄBC123", "app1").is_some());
        assert!(invalid("ABC;123", "app1").is_some());
    }
}
