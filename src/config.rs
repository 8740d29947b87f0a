use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default = "default_prizes")]
    pub prizes: Vec<PrizeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 存储后端: memory 仅用于单进程/测试, database 使用 sea-orm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Database,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "database" | "db" => Ok(StoreBackend::Database),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

/// 抽中不可用奖品时的处理策略
///
/// - `PreFilter`: 抽奖前剔除无库存/达到当日上限的奖品, 其权重直接丢弃,
///   其余奖位按各自权重瓜分概率
/// - `Substitute`: 始终按完整静态权重表抽取, 抽中不可用奖品时替换为未中奖,
///   因此不可用奖品的概率全部转移给未中奖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityPolicy {
    #[default]
    PreFilter,
    Substitute,
}

impl std::str::FromStr for AvailabilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pre_filter" | "prefilter" => Ok(AvailabilityPolicy::PreFilter),
            "substitute" => Ok(AvailabilityPolicy::Substitute),
            other => Err(format!("unknown availability policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfig {
    /// 每个会话允许的抽奖次数, None = 不限 (配置中写 "unlimited")
    #[serde(
        default = "default_max_spins",
        deserialize_with = "deserialize_spin_limit"
    )]
    pub max_spins_per_session: Option<u32>,
    #[serde(default)]
    pub availability_policy: AvailabilityPolicy,
    /// 管理接口 (reset) 的 Bearer token; 为空时禁用管理接口
    #[serde(default)]
    pub admin_token: String,
    /// 固定随机种子 (仅用于复现), 生产环境留空
    #[serde(default)]
    pub draw_seed: Option<u64>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            max_spins_per_session: default_max_spins(),
            availability_policy: AvailabilityPolicy::default(),
            admin_token: String::new(),
            draw_seed: None,
        }
    }
}

fn default_max_spins() -> Option<u32> {
    Some(1)
}

fn deserialize_spin_limit<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLimit {
        Count(u32),
        Keyword(String),
    }

    match RawLimit::deserialize(deserializer)? {
        RawLimit::Count(n) => Ok(Some(n)),
        RawLimit::Keyword(k) if k.eq_ignore_ascii_case("unlimited") => Ok(None),
        RawLimit::Keyword(k) => Err(serde::de::Error::custom(format!(
            "invalid max_spins_per_session: {k}"
        ))),
    }
}

/// 单个奖位配置; `no_win = true` 的奖位为"未中奖"哨兵, 不受库存限制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeConfig {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub total_capacity: Option<i64>,
    #[serde(default)]
    pub daily_capacity: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub no_win: bool,
}

impl PrizeConfig {
    pub fn limited(name: &str, weight: f64, total: i64, daily: i64, message: &str) -> Self {
        Self {
            name: name.to_string(),
            weight,
            total_capacity: Some(total),
            daily_capacity: Some(daily),
            message: Some(message.to_string()),
            no_win: false,
        }
    }

    pub fn no_win(name: &str, weight: f64, message: &str) -> Self {
        Self {
            name: name.to_string(),
            weight,
            total_capacity: None,
            daily_capacity: None,
            message: Some(message.to_string()),
            no_win: true,
        }
    }
}

/// 默认奖品表 (最近一期活动)
pub fn default_prizes() -> Vec<PrizeConfig> {
    vec![
        PrizeConfig::limited("Shirt", 10.0, 50, 5, "Congratulations! You won a cool T-Shirt!"),
        PrizeConfig::limited("Book", 10.0, 50, 5, "Awesome! You won a book!"),
        PrizeConfig::limited("Pen", 12.0, 40, 4, "Nice! You won a premium pen!"),
        PrizeConfig::limited("Cap", 12.0, 40, 4, "Congratulations! You won a stylish cap!"),
        PrizeConfig::limited(
            "Umbrella",
            8.0,
            40,
            4,
            "Great! You won an umbrella to keep you dry!",
        ),
        PrizeConfig::limited(
            "Wristband",
            23.0,
            200,
            18,
            "Great! You won a stylish wristband!",
        ),
        PrizeConfig::no_win("Try Again", 25.0, "Better luck next time!"),
    ]
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件: 使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig::default(),
                    wheel: WheelConfig::default(),
                    prizes: default_prizes(),
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config =
            toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}"))?;
        Ok(config)
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = v.parse()?;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
            // 提供了数据库地址但未显式选择后端时, 默认使用数据库
            if env::var("STORE_BACKEND").is_err() {
                self.database.backend = StoreBackend::Database;
            }
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("WHEEL_MAX_SPINS_PER_SESSION") {
            self.wheel.max_spins_per_session = match v.as_str() {
                "" | "unlimited" => None,
                n => Some(n.parse().map_err(|e| format!("Invalid WHEEL_MAX_SPINS_PER_SESSION: {e}"))?),
            };
        }
        if let Ok(v) = env::var("WHEEL_AVAILABILITY_POLICY") {
            self.wheel.availability_policy = v.parse()?;
        }
        if let Ok(v) = env::var("WHEEL_ADMIN_TOKEN") {
            self.wheel.admin_token = v;
        }
        if let Ok(v) = env::var("WHEEL_DRAW_SEED")
            && let Ok(seed) = v.parse()
        {
            self.wheel.draw_seed = Some(seed);
        }

        if self.database.backend == StoreBackend::Database && self.database.url.is_empty() {
            return Err("database backend selected but DATABASE_URL is missing".into());
        }
        Ok(())
    }
}
