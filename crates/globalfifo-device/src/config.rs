//! 设备配置。
//!
//! 所有字段均有默认值，空 TOML 文档即得到与内核版 globalfifo 驱动一致的设备：
//!
//! ```toml
//! name = "globalfifo"
//! capacity = 4096
//! wake_policy = "all"
//! ```

use std::fs;
use std::path::Path;

use globalfifo::WakePolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 默认设备节点名。
pub const DEFAULT_NAME: &str = "globalfifo";

/// 默认容量，即 `GLOBALFIFO_SIZE` (`0x1000`)。
pub const DEFAULT_CAPACITY: usize = 0x1000;

/// 设备参数。
///
/// # 契约说明（What）
/// - `capacity` 必须为正；`name` 不能为空白；
/// - 未知字段会被拒绝，拼写错误不会静默落回默认值。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FifoConfig {
    pub name: String,
    pub capacity: usize,
    pub wake_policy: WakePolicy,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            capacity: DEFAULT_CAPACITY,
            wake_policy: WakePolicy::default(),
        }
    }
}

impl FifoConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取、解析并校验配置文件。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_wake_policy(mut self, policy: WakePolicy) -> Self {
        self.wake_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::validation("capacity", "must be positive"));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("name", "must not be empty"));
        }
        Ok(())
    }
}
