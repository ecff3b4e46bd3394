//! 应用配置和持久化
//!
//! 服务器地址、会话令牌、快照位置等设置的存储和读取。

use crate::cache::FileCache;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认服务器地址
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// 应用设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 服务器根地址
    pub server: String,
    /// 登录后得到的会话令牌
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// 文件列表快照路径
    pub cache_path: PathBuf,
    /// 过期扫描间隔（秒）
    pub sweep_interval_secs: u64,
    /// 上传进度显示延迟（毫秒）
    pub progress_delay_ms: u64,
    /// 管理请求超时（秒）
    pub request_timeout_secs: u64,
    /// 跳过所有确认
    pub assume_yes: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            session_token: None,
            cache_path: FileCache::default_path(),
            sweep_interval_secs: 15,
            progress_delay_ms: 500,
            request_timeout_secs: 30,
            assume_yes: false,
        }
    }
}

impl AppSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dropshelf")
            .join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    debug!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        // 0 会让 tokio interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn progress_delay(&self) -> Duration {
        Duration::from_millis(self.progress_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
