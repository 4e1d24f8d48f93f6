//! Uniform response envelope returned to callers of gateway operations.

use serde::{Deserialize, Serialize};

use crate::domain::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> OperationResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(err: &GatewayError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: None,
            error: Some(err.into()),
        }
    }

    /// `message` describes the success case; failures carry the error text.
    pub fn from_result(result: Result<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(message, data),
            Err(err) => Self::failed(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_carries_data() {
        let response = OperationResponse::from_result(Ok(3), "counted");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "message": "counted", "data": 3})
        );
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let response: OperationResponse<()> = OperationResponse::from_result(
            Err(GatewayError::LimitExceeded {
                release_id: "rel-1".to_string(),
                count: 51,
                limit: 50,
            }),
            "published",
        );
        assert!(!response.success);
        assert!(response.data.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.kind, "limit_exceeded");
        assert!(error.message.contains("51"));
        assert_eq!(response.message, error.message);
    }
}
