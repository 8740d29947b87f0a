use crate::error::AppError;
use actix_web::body::EitherBody;
use actix_web::http::Method;
use actix_web::{
    Error, ResponseError,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

/// 需要管理员 token 的路径前缀
const ADMIN_PREFIX: &str = "/api/v1/admin/";

/// 管理接口鉴权: 校验 `Authorization: Bearer <admin_token>`。
/// 转盘接口本身是公开的, 设备 ID 不是身份凭证, 这里不做任何设备认证。
pub struct AdminAuthMiddleware {
    admin_token: Rc<str>,
}

impl AdminAuthMiddleware {
    pub fn new(admin_token: &str) -> Self {
        Self {
            admin_token: Rc::from(admin_token),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddlewareService {
            service,
            admin_token: self.admin_token.clone(),
        }))
    }
}

pub struct AdminAuthMiddlewareService<S> {
    service: S,
    admin_token: Rc<str>,
}

impl<S> AdminAuthMiddlewareService<S> {
    fn is_authorized(&self, req: &ServiceRequest) -> bool {
        // 未配置 token 时管理接口整体关闭
        if self.admin_token.is_empty() {
            return false;
        }
        req.headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == &*self.admin_token)
    }
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        let guarded = req.method() != Method::OPTIONS && req.path().starts_with(ADMIN_PREFIX);

        if !guarded || self.is_authorized(&req) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        // 以普通响应返回 401, 外层的 CORS 与访问日志照常生效
        let response = AppError::Unauthorized.error_response();
        Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
    }
}
