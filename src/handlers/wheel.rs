use crate::error::AppError;
use crate::models::*;
use crate::services::WheelService;
use crate::utils::PageQuery;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

const DEVICE_HEADER: &str = "X-Device-ID";

/// 请求体未携带设备ID时回退到 X-Device-ID 请求头
fn device_id_from_header(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(DEVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// 解析抽奖请求体; 空请求体视为全部默认值
fn parse_spin_request(body: &[u8]) -> Result<SpinRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SpinRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::MalformedRequest(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/wheel/spin",
    tag = "wheel",
    request_body(content = SpinRequest, description = "设备ID与已用次数均可省略"),
    params(
        ("X-Device-ID" = Option<String>, Header, description = "设备ID (请求体未提供时使用)")
    ),
    responses(
        (status = 200, description = "抽奖成功", body = SpinResponse),
        (status = 400, description = "ELIGIBILITY_REJECTED / MALFORMED_REQUEST"),
        (status = 500, description = "STORAGE_UNAVAILABLE")
    )
)]
/// 进行一次抽奖:
/// 1. 校验设备与次数
/// 2. 按剩余库存与当日上限加权抽取
/// 3. 原子扣减库存并写入抽奖记录
/// 4. 返回结果与最新计数
pub async fn spin(
    service: web::Data<WheelService>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let mut request = match parse_spin_request(&body) {
        Ok(r) => r,
        Err(e) => return Ok(e.error_response()),
    };
    if request.device_id.is_none() {
        request.device_id = device_id_from_header(&req);
    }

    match service.spin(request).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/wheel/snapshot",
    tag = "wheel",
    params(
        SnapshotQuery,
        ("X-Device-ID" = Option<String>, Header, description = "设备ID")
    ),
    responses(
        (status = 200, description = "获取库存快照成功", body = WheelSnapshot),
        (status = 500, description = "STORAGE_UNAVAILABLE")
    )
)]
/// 仪表盘: 各奖品剩余库存、当日发放、累计发放
pub async fn get_snapshot(
    service: web::Data<WheelService>,
    req: HttpRequest,
    query: web::Query<SnapshotQuery>,
) -> Result<HttpResponse> {
    let device_id = query
        .into_inner()
        .device_id
        .or_else(|| device_id_from_header(&req));
    match service.snapshot(device_id).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/wheel/prizes",
    tag = "wheel",
    responses(
        (status = 200, description = "获取奖位配置成功", body = [WheelSlotResponse])
    )
)]
/// 奖位配置与静态中奖概率
pub async fn get_prizes(service: web::Data<WheelService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(service.list_prizes())))
}

#[utoipa::path(
    get,
    path = "/wheel/history",
    tag = "wheel",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20, 最大100)")
    ),
    responses(
        (status = 200, description = "获取抽奖记录成功", body = SpinHistoryPage),
        (status = 500, description = "STORAGE_UNAVAILABLE")
    )
)]
/// 分页获取抽奖记录 (倒序)
pub async fn get_history(
    service: web::Data<WheelService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    match service.history(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn wheel_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wheel")
            .route("/spin", web::post().to(spin))
            .route("/snapshot", web::get().to(get_snapshot))
            .route("/prizes", web::get().to(get_prizes))
            .route("/history", web::get().to(get_history)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_body_defaults() {
        let request = parse_spin_request(b"  ").unwrap();
        assert!(request.device_id.is_none());
        assert_eq!(request.prior_spin_count, 0);
    }

    #[test]
    fn test_parse_accepts_aliases() {
        let request = parse_spin_request(br#"{"deviceId":"abc","spinsUsed":2}"#).unwrap();
        assert_eq!(request.device_id.as_deref(), Some("abc"));
        assert_eq!(request.prior_spin_count, 2);
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = parse_spin_request(b"{not json").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_REQUEST");
        let err = parse_spin_request(br#"{"prior_spin_count":-1}"#).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_REQUEST");
    }
}
