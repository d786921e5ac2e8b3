//! # Fingerlink Driver
//!
//! 驱动层：应答（ack）、协作式定时器与 MCU 通信编排
//!
//! ## 模块
//!
//! - `clock`: 毫秒时钟（单调 / 手动）
//! - `ack`: 应答状态机（编号分配、重发、超时）
//! - `timer`: 协作式定时任务
//! - `hooks`: 收发消息钩子
//! - `reporter`: 带严重程度的错误记录
//! - `history`: 消息历史
//! - `mcu_com`: 通信编排器 [`McuCom`]
//! - `config` / `builder`: 配置与链式构造
//!
//! ## 快速开始
//!
//! ```no_run
//! use fingerlink_driver::McuComBuilder;
//! use fingerlink_protocol::{MessageKind, create_stop};
//!
//! let com = McuComBuilder::new().port("/dev/ttyACM0").build().unwrap();
//! let (_req, resp) = com
//!     .send_and_wait(create_stop(MessageKind::Request, 0))
//!     .unwrap();
//! println!("{resp}");
//! ```

pub mod ack;
mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod hooks;
pub mod mcu_com;
pub mod reporter;
pub mod timer;

pub use ack::{AckEvent, AckFailure, AckInterface, AckOptions};
pub use builder::McuComBuilder;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::ComConfig;
pub use error::DriverError;
pub use history::MessageRecord;
pub use hooks::{HookManager, MessageCallback};
pub use mcu_com::{AckHandlers, McuCom, MessageHandler};
pub use reporter::{ErrorRecord, ErrorReporter, Severity};
pub use timer::{TaskId, TimerGroup};
