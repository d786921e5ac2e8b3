//! 通信配置
//!
//! [`ComConfig`] 是纯数据（可序列化为 TOML），运行时组件（通道、回调）不在此处。

use crate::ack::AckOptions;
use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 通信配置
///
/// 所有字段都有默认值，TOML 文件中只需写出需要覆盖的项。
///
/// # 示例
///
/// ```rust
/// use fingerlink_driver::ComConfig;
///
/// let config = ComConfig::from_toml_str(r#"
///     port = "/dev/ttyACM1"
///     heartbeat_interval_ms = 500
/// "#).unwrap();
/// assert_eq!(config.port, "/dev/ttyACM1");
/// assert_eq!(config.baud_rate, 115_200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComConfig {
    /// 串口设备
    pub port: String,
    pub baud_rate: u32,
    /// 应答层最大重发次数
    pub max_retries: u32,
    /// 应答层单次超时（毫秒）
    pub retry_timeout_ms: u64,
    /// 心跳间隔（毫秒，`<= 0` 表示每次 tick 都发送）
    pub heartbeat_interval_ms: i64,
    /// 是否启用心跳任务
    pub heartbeat_enabled: bool,
    /// 消息历史容量（0 = 不限）
    pub history_capacity: usize,
    /// 阻塞等待时两次 poll 之间的间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 阻塞等待应答的上限（毫秒），应大于应答层的完整重试周期
    pub ack_wait_timeout_ms: u64,
    /// 回零完成事件的等待上限（毫秒）
    pub zero_done_timeout_ms: u64,
}

impl Default for ComConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            max_retries: 3,
            retry_timeout_ms: 1000,
            heartbeat_interval_ms: 1000,
            heartbeat_enabled: true,
            history_capacity: 1000,
            poll_interval_ms: 5,
            ack_wait_timeout_ms: 5000,
            zero_done_timeout_ms: 10_000,
        }
    }
}

impl ComConfig {
    /// 从 TOML 文本解析
    ///
    /// # 错误
    /// - `DriverError::Config`: TOML 语法错误、字段类型错误或取值非法
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 检查取值
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.baud_rate == 0 {
            return Err(DriverError::Config("baud_rate must be positive".into()));
        }
        if self.retry_timeout_ms == 0 {
            return Err(DriverError::Config("retry_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(DriverError::Config("poll_interval_ms must be positive".into()));
        }
        // 阻塞等待先于应答层放弃时，被放弃的请求仍会在之后重发
        let window = self.ack_options().retry_window_ms();
        if self.ack_wait_timeout_ms <= window {
            return Err(DriverError::Config(format!(
                "ack_wait_timeout_ms ({}) must exceed the retry window of {} ms \
                 ((max_retries + 1) * retry_timeout_ms)",
                self.ack_wait_timeout_ms, window
            )));
        }
        Ok(())
    }

    pub fn ack_options(&self) -> AckOptions {
        AckOptions {
            max_retries: self.max_retries,
            retry_timeout_ms: self.retry_timeout_ms,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ack_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_wait_timeout_ms)
    }

    pub fn zero_done_timeout(&self) -> Duration {
        Duration::from_millis(self.zero_done_timeout_ms)
    }
}
