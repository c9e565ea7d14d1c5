//! 请求载荷校验
//!
//! 命令在构造时对请求载荷执行校验，失败即返回 400 语义的 `TransportError::Validation`，
//! 校验失败的命令不会被发送。
//!
use crate::error::TransportError;
use serde_json::Value;
use thiserror::Error;

/// 校验失败信息
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// 违反约束的字段等附加信息
    pub details: Option<Value>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// 针对单个字段的约束失败
    pub fn field(field: &str, constraint: impl Into<String>) -> Self {
        let constraint = constraint.into();
        Self {
            message: format!("Validation failed: \"{field}\" {constraint}"),
            details: Some(serde_json::json!({ "property": field, "constraint": constraint })),
        }
    }
}

impl From<ValidationError> for TransportError {
    fn from(error: ValidationError) -> Self {
        TransportError::Validation {
            message: error.message,
            details: error.details,
        }
    }
}

/// 带约束的请求载荷
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Value {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl Validate for () {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Some(value) => value.validate(),
            None => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        self.iter().try_for_each(Validate::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ExtendedError};

    struct Login {
        user: String,
    }

    impl Validate for Login {
        fn validate(&self) -> Result<(), ValidationError> {
            if self.user.is_empty() {
                return Err(ValidationError::field("user", "should not be empty"));
            }
            Ok(())
        }
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err: TransportError = Login { user: String::new() }
            .validate()
            .unwrap_err()
            .into();
        assert_eq!(
            err.code(),
            ErrorCode::from(ExtendedError::HTTP_CODE_BAD_REQUEST)
        );
        let ext = err.to_extended();
        assert_eq!(ext.details.unwrap()["property"], "user");
    }

    #[test]
    fn collections_validate_each_item() {
        let items = vec![
            Login { user: "a".into() },
            Login { user: String::new() },
        ];
        assert!(items.validate().is_err());
        assert!(None::<Login>.validate().is_ok());
    }
}
