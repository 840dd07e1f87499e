use anyhow::{Context, Result};
use config::{builder::DefaultState, Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    device_api::DeviceApiConfig,
    dispatcher::DispatcherConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub device_api: DeviceApiConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: RELAY_, nested keys joined by `__`,
    ///    e.g. `RELAY_DISPATCHER__MAX_CONCURRENCY=8`)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::with_defaults(ConfigBuilder::builder())?;

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/relay.toml", "relay.toml", "/etc/relay/config.toml"];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<DefaultState>,
    ) -> Result<config::ConfigBuilder<DefaultState>> {
        let defaults = AppConfig::default();
        let builder = builder
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default("database.min_connections", defaults.database.min_connections)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.database.connection_timeout_seconds,
            )?
            .set_default("database.wal_mode", defaults.database.wal_mode)?
            .set_default("dispatcher.enabled", defaults.dispatcher.enabled)?
            .set_default(
                "dispatcher.max_concurrency",
                defaults.dispatcher.max_concurrency as u64,
            )?
            .set_default("dispatcher.batch_limit", defaults.dispatcher.batch_limit)?
            .set_default("dispatcher.max_retries", defaults.dispatcher.max_retries)?
            .set_default(
                "dispatcher.ping_retry_seconds",
                defaults.dispatcher.ping_retry_seconds,
            )?
            .set_default(
                "dispatcher.invoke_retry_seconds",
                defaults.dispatcher.invoke_retry_seconds,
            )?
            .set_default(
                "dispatcher.call_timeout_seconds",
                defaults.dispatcher.call_timeout_seconds,
            )?
            .set_default(
                "dispatcher.idle_interval_millis",
                defaults.dispatcher.idle_interval_millis,
            )?
            .set_default(
                "dispatcher.cancellation_page_size",
                defaults.dispatcher.cancellation_page_size,
            )?
            .set_default("device_api.provider", "mock")?
            .set_default("device_api.base_url", defaults.device_api.base_url)?
            .set_default("device_api.access_token", "")?
            .set_default(
                "device_api.verify_token_on_startup",
                defaults.device_api.verify_token_on_startup,
            )?
            .set_default("device_api.mock_latency_millis", 0)?
            .set_default("api.enabled", defaults.api.enabled)?
            .set_default("api.bind_address", defaults.api.bind_address)?
            .set_default(
                "api.request_timeout_seconds",
                defaults.api.request_timeout_seconds,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", "pretty")?;

        Ok(builder)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;

        self.dispatcher
            .validate()
            .context("Dispatcher配置验证失败")?;

        self.device_api.validate().context("设备API配置验证失败")?;

        self.api.validate().context("API配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
