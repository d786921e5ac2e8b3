//! 驱动层错误类型定义

use fingerlink_protocol::{Message, ProtocolError};
use fingerlink_serial::ChannelError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 协议错误（字段访问、编解码）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 应答层重试耗尽仍未收到应答
    #[error("No response to {request} after {attempts} attempts")]
    Timeout { request: String, attempts: u32 },

    /// 阻塞等待超过上限（应答层尚未给出结论）
    #[error("Gave up waiting for response to {0}")]
    WaitTimeout(String),

    /// 对端以 ERROR 类别应答
    #[error("Error response to {request}: {response}")]
    ErrorResponse { request: String, response: Box<Message> },

    /// 应答类型、编号或字段与请求不符
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 应答通道已关闭（McuCom 已释放）
    #[error("Response channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerlink_protocol::{MessageKind, create_error_message};

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::from(ChannelError::NotOpen);
        assert_eq!(err.to_string(), "Channel error: Channel not open");

        let err = DriverError::from(ProtocolError::UnknownMessageId { id: 77 });
        assert!(err.to_string().contains("Unknown message id: 77"));

        let err = DriverError::Timeout {
            request: "Heartbeat#3".into(),
            attempts: 4,
        };
        assert_eq!(err.to_string(), "No response to Heartbeat#3 after 4 attempts");

        let err = DriverError::ErrorResponse {
            request: "Stop#1".into(),
            response: Box::new(create_error_message(MessageKind::Error, 2)),
        };
        assert!(err.to_string().contains("ErrorMessage#0 [ERROR] error_code=2"));
    }
}
