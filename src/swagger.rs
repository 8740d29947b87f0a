use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;
use crate::utils::{PageInfo, PageQuery};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::wheel::spin,
        handlers::wheel::get_snapshot,
        handlers::wheel::get_prizes,
        handlers::wheel::get_history,
        handlers::admin::reset_wheel,
    ),
    components(
        schemas(
            SpinRequest,
            SpinResponse,
            SnapshotQuery,
            PrizeSnapshot,
            WheelSnapshot,
            WheelSlotResponse,
            SpinRecordResponse,
            SpinHistoryPage,
            ResetResponse,
            PageQuery,
            PageInfo,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "wheel", description = "Prize wheel API"),
        (name = "admin", description = "Administration API"),
    ),
    info(
        title = "Prize Wheel API",
        version = "1.0.0",
        description = "Prize wheel allocation REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_wheel_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/wheel/spin"));
        assert!(doc.paths.paths.contains_key("/admin/reset"));
    }
}
