pub mod admin;
pub mod wheel;

pub use admin::admin_config;
pub use wheel::wheel_config;

use crate::error::AppError;
use actix_web::web;

/// 查询参数解析失败统一返回 MALFORMED_REQUEST
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::MalformedRequest(err.to_string()).into())
}
