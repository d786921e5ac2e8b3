//! Builder 模式实现
//!
//! 提供链式构造 [`McuCom`] 实例的便捷方式。

use crate::clock::{Clock, MonotonicClock};
use crate::config::ComConfig;
use crate::error::DriverError;
use crate::mcu_com::McuCom;
use crate::reporter::ErrorReporter;
use fingerlink_serial::{ComChannel, SerialChannel};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// McuCom Builder（链式构造）
///
/// 未指定通道时按配置打开串口；串口打开失败不会导致构造失败，
/// 得到的通道处于关闭状态（发送失败会被记录为警告）。
///
/// # Example
///
/// ```no_run
/// use fingerlink_driver::McuComBuilder;
///
/// let com = McuComBuilder::new()
///     .port("/dev/ttyACM0")
///     .baud_rate(115_200)
///     .heartbeat_interval_ms(500)
///     .build()
///     .unwrap();
///
/// loop {
///     com.tick();
/// }
/// ```
#[derive(Default)]
pub struct McuComBuilder {
    config: ComConfig,
    channel: Option<Arc<dyn ComChannel>>,
    clock: Option<Arc<dyn Clock>>,
    reporter: Option<Arc<ErrorReporter>>,
}

impl McuComBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换配置
    pub fn config(mut self, config: ComConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 TOML 文件加载配置
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self, DriverError> {
        self.config = ComConfig::load(path)?;
        Ok(self)
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    pub fn heartbeat_interval_ms(mut self, interval_ms: i64) -> Self {
        self.config.heartbeat_interval_ms = interval_ms;
        self
    }

    /// 关闭心跳任务
    pub fn without_heartbeat(mut self) -> Self {
        self.config.heartbeat_enabled = false;
        self
    }

    /// 使用已有通道（测试中传入 `MockChannel`）
    pub fn channel(mut self, channel: Arc<dyn ComChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 共享错误报告器（默认新建）
    pub fn reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// 构建 McuCom 实例
    ///
    /// # Errors
    /// - `DriverError::Config`: 配置取值非法
    pub fn build(self) -> Result<Arc<McuCom>, DriverError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock));
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(ErrorReporter::new(Arc::clone(&clock))));
        let channel = match self.channel {
            Some(channel) => channel,
            None => Arc::new(SerialChannel::open(
                &self.config.port,
                self.config.baud_rate,
                self.config.history_capacity,
            )),
        };

        info!(
            "McuCom ready (port={}, open={}, heartbeat={})",
            self.config.port,
            channel.is_open(),
            if self.config.heartbeat_enabled {
                format!("{} ms", self.config.heartbeat_interval_ms)
            } else {
                "off".to_string()
            }
        );
        Ok(McuCom::new(channel, self.config, clock, reporter))
    }
}
