use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| {
            // 转盘页面可能部署在任意域名下
            true
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        // 客户端通过 X-Device-ID 传递设备标识
        .allow_any_header()
        .max_age(3600)
}
