use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// 对外入口的统一返回信封。失败时只携带可读消息，不返回部分结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Success(T),
    #[serde(rename = "failed")]
    Failure { message: String },
}

impl<T> Outcome<T> {
    pub fn ok(payload: T) -> Self {
        Outcome::Success(payload)
    }

    pub fn err(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Outcome::Success(payload) => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { message } => Some(message),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Outcome::Success(payload) => Ok(payload),
            Outcome::Failure { message } => Err(message),
        }
    }
}

impl<T> From<Result<T, EngineError>> for Outcome<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(payload) => Outcome::ok(payload),
            Err(err) => Outcome::err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        total: u32,
    }

    #[test]
    fn success_serializes_with_status_tag() {
        let outcome = Outcome::ok(Payload { total: 3 });
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "success");
        assert_eq!(json["total"], 3);
    }

    #[test]
    fn failure_serializes_as_failed() {
        let outcome: Outcome<Payload> =
            Err(EngineError::UnknownMaterial("NOPE".to_string())).into();
        assert!(!outcome.is_success());
        assert!(outcome.payload().is_none());
        let message = outcome.message().expect("失败应带消息").to_string();
        assert!(message.contains("NOPE"));

        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], message);
    }

    #[test]
    fn into_result_round_trips_both_arms() {
        assert_eq!(Outcome::ok(7_u8).into_result(), Ok(7));
        assert_eq!(
            Outcome::<u8>::err("坏文件").into_result(),
            Err("坏文件".to_string())
        );
    }
}
