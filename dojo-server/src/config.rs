use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    /// Root directory for uploaded photos
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Orders {
    /// Pending orders older than this are cancelled by the sweep
    pub expiration_days: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub media: Media,
    pub orders: Orders,
    pub session: Session,
    pub rate_limit: RateLimit,
    pub seed_demo_data: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Optional settings.toml, in the working directory or the crate directory
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        let dev_path = PathBuf::from("dojo-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        // 2. Defaults
        builder = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "dojo.db")?
            .set_default("media.dir", "media")?
            .set_default("orders.expiration_days", 15)?
            .set_default("orders.sweep_interval_secs", 3600)?
            .set_default("session.ttl_days", 30)?
            .set_default("rate_limit.max_requests", 100)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("seed_demo_data", false)?;

        // 3. Environment variables (highest priority)
        let overrides = [
            ("DATABASE_PATH", "database.path"),
            ("PORT", "server.port"),
            ("HOST", "server.host"),
            ("MEDIA_DIR", "media.dir"),
            ("ORDER_EXPIRATION_DAYS", "orders.expiration_days"),
            ("SEED_DEMO_DATA", "seed_demo_data"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Settings for tests and tools: in-memory database, temp media dir.
    pub fn for_tests() -> Self {
        Self {
            server: Server {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: Database {
                path: ":memory:".to_string(),
            },
            media: Media {
                dir: std::env::temp_dir()
                    .join(format!("dojo-media-{}", uuid::Uuid::new_v4()))
                    .to_string_lossy()
                    .into_owned(),
            },
            orders: Orders {
                expiration_days: 15,
                sweep_interval_secs: 3600,
            },
            session: Session { ttl_days: 30 },
            rate_limit: RateLimit {
                max_requests: 1000,
                window_secs: 60,
            },
            seed_demo_data: false,
        }
    }
}
