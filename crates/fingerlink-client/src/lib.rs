//! # Fingerlink Client
//!
//! 面向界面 / CLI 的上层接口：
//! - [`CommandBuffer`]：指令缓冲、分组展示与串行下发状态机
//! - [`Telemetry`]：按关节的遥测订阅与有界快照
//! - [`AppContext`]：把上述组件与 [`McuCom`](fingerlink_driver::McuCom) 组合在一起的显式上下文
//!
//! 所有进度都由调用方驱动：主循环反复调用 [`AppContext::tick`]，阻塞操作在等待期间自行轮询。

pub mod command_buffer;
pub mod context;
pub mod error;
pub mod telemetry;

pub use command_buffer::{
    BufferOutcome, BufferState, CommandBuffer, calculate_command_groups, parse_buffer_file,
    verify_entry,
};
pub use context::AppContext;
pub use error::ClientError;
pub use telemetry::{SensorDatastream, SensorSnapshot, Telemetry};

// 底层类型，便于上层只依赖本 crate
pub use fingerlink_driver::{ComConfig, McuCom, McuComBuilder, Severity};
pub use fingerlink_protocol::{ControlMode, Message, MessageKind};
pub use fingerlink_serial::{ComChannel, SerialChannel};
