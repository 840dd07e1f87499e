use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProvider {
    Particle,
    Mock,
}

/// Remote device cloud settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceApiConfig {
    pub provider: DeviceProvider,
    pub base_url: String,
    pub access_token: String,
    pub verify_token_on_startup: bool,
    /// Artificial delay added to every mock call.
    pub mock_latency_millis: u64,
}

impl Default for DeviceApiConfig {
    fn default() -> Self {
        Self {
            provider: DeviceProvider::Mock,
            base_url: "https://api.particle.io".to_string(),
            access_token: String::new(),
            verify_token_on_startup: false,
            mock_latency_millis: 0,
        }
    }
}

impl DeviceApiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider == DeviceProvider::Particle {
            if self.base_url.is_empty() {
                return Err(anyhow::anyhow!("设备API地址不能为空"));
            }

            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err(anyhow::anyhow!("设备API地址必须以http://或https://开头"));
            }

            if self.access_token.is_empty() {
                return Err(anyhow::anyhow!("使用particle时必须配置access_token"));
            }
        }

        Ok(())
    }
}
