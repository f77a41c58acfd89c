use serde::{Deserialize, Serialize};
use std::env;

use crate::wheel::RotationPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub wheel: WheelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 转盘相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfig {
    /// IANA 时区名，创建时间与优惠券过期时间均按此时区计算/展示
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// 服务端 animating -> settled 的等待时长 (毫秒)
    #[serde(default)]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub rotation_policy: RotationPolicy,
}

fn default_time_zone() -> String {
    "America/Sao_Paulo".to_string()
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            settle_delay_ms: 0,
            rotation_policy: RotationPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("Missing DATABASE_URL and no config.toml found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    wheel: WheelConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("WHEEL_TIME_ZONE") {
            config.wheel.time_zone = v;
        }
        if let Ok(v) = env::var("WHEEL_SETTLE_DELAY_MS")
            && let Ok(ms) = v.parse()
        {
            config.wheel.settle_delay_ms = ms;
        }
        if let Ok(v) = env::var("WHEEL_ROTATION_POLICY") {
            config.wheel.rotation_policy = v.parse()?;
        }

        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }
}
