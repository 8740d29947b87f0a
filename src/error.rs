use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

/// 拒绝抽奖的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityRejection {
    DeviceAlreadySpun,
    SpinLimitExceeded,
}

impl EligibilityRejection {
    pub fn code(&self) -> &'static str {
        match self {
            EligibilityRejection::DeviceAlreadySpun => "DEVICE_ALREADY_SPUN",
            EligibilityRejection::SpinLimitExceeded => "SPIN_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for EligibilityRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EligibilityRejection::DeviceAlreadySpun => {
                write!(f, "{}: this device has already spun the wheel", self.code())
            }
            EligibilityRejection::SpinLimitExceeded => {
                write!(f, "{}: maximum spins reached", self.code())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Eligibility rejected: {0}")]
    EligibilityRejected(EligibilityRejection),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::EligibilityRejected(_) => "ELIGIBILITY_REJECTED",
            AppError::MalformedRequest(_) => "MALFORMED_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::StorageUnavailable(_) | AppError::DatabaseError(_) => "STORAGE_UNAVAILABLE",
            AppError::ConfigError(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            AppError::EligibilityRejected(_) | AppError::MalformedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::EligibilityRejected(reason) => {
                log::info!("Spin rejected: {reason}");
                reason.to_string()
            }
            AppError::MalformedRequest(msg) => {
                log::warn!("Malformed request: {msg}");
                msg.clone()
            }
            AppError::Unauthorized => {
                log::warn!("Unauthorized admin access");
                "Unauthorized".to_string()
            }
            AppError::StorageUnavailable(msg) => {
                log::error!("Storage unavailable: {msg}");
                "Storage unavailable".to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Storage unavailable".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(ApiResponse::error(self.error_code(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::EligibilityRejected(EligibilityRejection::DeviceAlreadySpun).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MalformedRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::StorageUnavailable("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_error_maps_to_storage_unavailable() {
        let err = AppError::from(sea_orm::DbErr::Custom("connection refused".into()));
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn test_rejection_message_names_reason() {
        let msg = EligibilityRejection::SpinLimitExceeded.to_string();
        assert!(msg.starts_with("SPIN_LIMIT_EXCEEDED"));
    }
}
