//! # Fingerlink Protocol
//!
//! 上位机与 MCU（Teensy）之间的消息协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 消息 ID 常量与枚举
//! - `schema`: 字段类型、消息原型（Prototype）与注册表
//! - `message`: 消息实例与字段值
//! - `factory`: 各类消息的工厂函数
//! - `control`: 控制模式枚举
//! - `codec`: 帧编码 / 流式解码
//!
//! ## 字节序
//!
//! 所有基本类型按小端字节序（与 MCU 主机序一致）编码。

pub mod codec;
pub mod control;
pub mod factory;
pub mod ids;
pub mod message;
pub mod schema;

// 重新导出常用类型
pub use codec::{FrameDecoder, SYNC_BYTE, encode_frame};
pub use control::ControlMode;
pub use factory::*;
pub use ids::*;
pub use message::{FieldValue, Message, MessageKind};
pub use schema::{FieldSpec, FieldType, MessagePrototype, SchemaRegistry};

use thiserror::Error;

/// 协议错误类型
///
/// 覆盖原型查找（Schema）、字段访问和帧解码三类错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 注册表中不存在该消息 ID
    #[error("Unknown message id: {id}")]
    UnknownMessageId { id: u8 },

    /// 注册表中存在重复 ID
    #[error("Duplicate message id: {id}")]
    DuplicateMessageId { id: u8 },

    /// 原型中不存在该字段
    #[error("Unknown field '{field}' for message id {id}")]
    UnknownField { id: u8, field: String },

    /// 字段类型与原型声明不一致
    #[error("Field '{field}' expects {expected:?}, got {actual:?}")]
    FieldTypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    /// 字段数量与原型不一致
    #[error("Message id {id} expects {expected} fields, got {actual}")]
    FieldCount { id: u8, expected: usize, actual: usize },

    /// 未知消息类别（REQUEST / RESPONSE / ERROR 以外的值）
    #[error("Invalid message kind: {0}")]
    InvalidKind(u8),

    /// 负载长度与原型不一致
    #[error("Invalid payload length for id {id}: expected {expected}, got {actual}")]
    InvalidLength {
        id: u8,
        expected: usize,
        actual: usize,
    },

    /// 帧校验和不一致（解码器会丢弃同步字节并重新同步）
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}
