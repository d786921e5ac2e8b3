//! 应用上下文
//!
//! 持有通信编排器、指令缓冲区与遥测存储，供界面 / CLI 显式传递使用。

use crate::command_buffer::{BufferOutcome, CommandBuffer};
use crate::error::ClientError;
use crate::telemetry::{SensorDatastream, Telemetry};
use fingerlink_driver::{ComConfig, ErrorReporter, McuCom, McuComBuilder, MessageRecord};
use fingerlink_protocol::Message;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

/// 应用上下文
///
/// # 示例
///
/// ```no_run
/// use fingerlink_client::AppContext;
/// use fingerlink_driver::ComConfig;
///
/// let ctx = AppContext::from_config(ComConfig::default()).unwrap();
/// ctx.enable_sensor_datastream(0, 50);
/// loop {
///     ctx.tick();
/// }
/// ```
pub struct AppContext {
    com: Arc<McuCom>,
    buffer: Arc<CommandBuffer>,
    telemetry: Telemetry,
}

impl AppContext {
    /// 基于已构造的编排器创建上下文
    pub fn new(com: Arc<McuCom>) -> Self {
        Self {
            buffer: Arc::new(CommandBuffer::new(Arc::clone(&com))),
            telemetry: Telemetry::new(Arc::clone(&com)),
            com,
        }
    }

    /// 按配置打开串口并创建上下文
    ///
    /// # 错误
    /// - `ClientError::Driver`: 配置非法
    pub fn from_config(config: ComConfig) -> Result<Self, ClientError> {
        let com = McuComBuilder::new().config(config).build()?;
        Ok(Self::new(com))
    }

    /// 主循环单步：收包、超时重发、分发与定时任务
    pub fn tick(&self) -> usize {
        self.com.tick()
    }

    pub fn com(&self) -> &Arc<McuCom> {
        &self.com
    }

    pub fn buffer(&self) -> &Arc<CommandBuffer> {
        &self.buffer
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        self.com.reporter()
    }

    // ==================== 界面接口 ====================

    pub fn add_command(&self, message: Message) -> Result<(), ClientError> {
        self.buffer.add_command(message)
    }

    pub fn get_buffer(&self) -> Vec<Message> {
        self.buffer.get_buffer()
    }

    pub fn send_buffer(&self) -> BufferOutcome {
        self.buffer.send_command_buffer()
    }

    pub fn send_buffer_async(&self) -> Result<JoinHandle<BufferOutcome>, ClientError> {
        self.buffer.send_command_buffer_async()
    }

    pub fn load_buffer_from_file(&self, path: impl AsRef<Path>) -> Result<usize, ClientError> {
        self.buffer.load_buffer_from_file(path)
    }

    pub fn add_callback_on_send(&self, callback: impl Fn(&Message) + Send + Sync + 'static) {
        self.buffer.add_callback_on_send(callback);
    }

    pub fn enable_sensor_datastream(&self, joint: u8, frequency: u8) {
        self.telemetry.enable(joint, frequency);
    }

    pub fn disable_sensor_datastream(&self, joint: u8) -> Result<(), ClientError> {
        self.telemetry.disable(joint)
    }

    pub fn get_datastream(&self, joint: u8) -> Option<SensorDatastream> {
        self.telemetry.get_datastream(joint)
    }

    pub fn get_message_history(&self) -> Vec<MessageRecord> {
        self.com.message_history()
    }
}
