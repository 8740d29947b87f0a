use crate::services::WheelService;
use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;

#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "重置成功", body = ResetResponse),
        (status = 401, description = "未授权"),
        (status = 500, description = "STORAGE_UNAVAILABLE")
    )
)]
/// 清空设备与抽奖记录, 恢复所有奖品满库存
pub async fn reset_wheel(service: web::Data<WheelService>) -> Result<HttpResponse> {
    match service.reset().await {
        Ok(result) => {
            let message = result.message.clone();
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(result, message)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/admin").route("/reset", web::post().to(reset_wheel)));
}
