//! # Fingerlink Serial Transport
//!
//! 传输层抽象：以字节为单位收发，不关心帧格式。
//!
//! - [`ComChannel`]: 统一的通道接口（发送 / 非阻塞接收 / 观察者 / 收发记录）
//! - [`SerialChannel`]: 基于 `serialport` 的串口实现
//! - [`MockChannel`]: 内存通道（`mock` feature），由脚本化应答函数驱动
//!
//! 发送与接收各自持有一把锁，允许不同线程全双工使用同一通道。

pub mod history;
pub mod serial;
mod tap;

#[cfg(feature = "mock")]
pub mod mock;

pub use history::{ChannelHistory, Direction, HistoryEntry};
pub use serial::SerialChannel;

#[cfg(feature = "mock")]
pub use mock::MockChannel;

use thiserror::Error;

/// 传输层错误
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel not open")]
    NotOpen,
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// 原始字节观察者
///
/// 在发送成功后 / 接收到数据后同步调用，不得阻塞。
pub type ByteObserver = Box<dyn Fn(&[u8]) + Send + Sync>;

/// 字节通道
///
/// 所有方法均为 `&self`，实现内部负责同步。
pub trait ComChannel: Send + Sync {
    /// 发送全部字节
    ///
    /// # 错误
    /// - `ChannelError::NotOpen`: 通道未打开
    /// - `ChannelError::Io`: 底层写入失败
    fn send(&self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// 非阻塞接收
    ///
    /// 返回当前已到达的全部字节；无数据或通道关闭时返回空。
    fn receive(&self) -> Result<Vec<u8>, ChannelError>;

    fn is_open(&self) -> bool;

    /// 注册原始字节观察者
    fn add_observer(&self, direction: Direction, observer: ByteObserver);

    /// 收发记录（诊断用）
    fn history(&self) -> Vec<HistoryEntry>;

    fn clear_history(&self);
}
