//! 客户端错误类型

use crate::command_buffer::BufferState;
use fingerlink_driver::DriverError;
use fingerlink_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// 指令缓冲区不在空闲状态
    #[error("Command buffer busy ({state})")]
    Busy { state: BufferState },

    /// 该关节没有活动的数据流
    #[error("No datastream for joint {0}")]
    UnknownJoint(u8),

    /// 缓冲区文件解析失败
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
