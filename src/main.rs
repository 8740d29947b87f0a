use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use prize_wheel_backend::{
    config::{Config, StoreBackend},
    database::{DatabaseStore, create_pool, run_migrations},
    handlers,
    middlewares::{AdminAuthMiddleware, create_cors},
    models::PrizeTable,
    services::WheelService,
    store::{MemoryStore, WheelStore},
    swagger::swagger_config,
    utils::SystemClock,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration");

    // 奖位表 (配置非法时直接退出)
    let table = PrizeTable::from_config(&config.prizes).expect("Invalid prize table configuration");

    // 选择存储后端
    let store: Arc<dyn WheelStore> = match config.database.backend {
        StoreBackend::Database => {
            let pool = create_pool(&config.database)
                .await
                .expect("Failed to create database connection pool");
            run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            log::info!("Using database store");
            Arc::new(DatabaseStore::new(pool))
        }
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 创建服务并补齐奖品状态
    let wheel_service = WheelService::new(table, store, Arc::new(SystemClock), &config.wheel);
    wheel_service
        .init()
        .await
        .expect("Failed to initialize prize states");

    if config.wheel.admin_token.is_empty() {
        log::warn!("WHEEL_ADMIN_TOKEN not set; admin endpoints are disabled");
    }
    let admin_token = config.wheel.admin_token.clone();

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AdminAuthMiddleware::new(&admin_token))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(wheel_service.clone()))
            .app_data(handlers::query_config())
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::wheel_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
