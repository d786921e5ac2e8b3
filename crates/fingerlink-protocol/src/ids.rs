//! 消息 ID 常量定义和枚举
//!
//! ID 与 MCU 固件 `message_definitions.hpp` 中的原型编号一一对应。

use num_enum::{IntoPrimitive, TryFromPrimitive};

// ============================================================================
// 消息 ID 常量
// ============================================================================

/// 心跳
pub const ID_HEARTBEAT: u8 = 0;

/// 电机控制指令（进入命令缓冲区）
pub const ID_MOTOR_CONTROL: u8 = 1;

/// 电机事件（指令确认 / 执行反馈）
pub const ID_MOTOR_EVENT: u8 = 2;

/// 执行缓冲区（Go）
pub const ID_CONTROL_GO: u8 = 3;

/// 执行完成
pub const ID_CONTROL_DONE: u8 = 4;

/// 传感器数据流：开启 / 数据 / 关闭
pub const ID_START_SENSOR_DATASTREAM: u8 = 5;
pub const ID_SENSOR_DATASTREAM: u8 = 6;
pub const ID_STOP_SENSOR_DATASTREAM: u8 = 7;

/// 清空远端控制队列
pub const ID_CLEAR_CONTROL_QUEUE: u8 = 8;

/// MCU 错误报告
pub const ID_ERROR_MESSAGE: u8 = 9;

/// 急停
pub const ID_STOP: u8 = 10;

/// 回零指令与回零完成事件
pub const ID_ZERO_COMMAND: u8 = 11;
pub const ID_ZERO_DONE: u8 = 12;

/// 消息 ID 枚举
///
/// 与上面的常量等价，便于 `match` 和日志输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MessageId {
    Heartbeat = 0,
    MotorControl = 1,
    MotorEvent = 2,
    ControlGo = 3,
    ControlDone = 4,
    StartSensorDatastream = 5,
    SensorDatastream = 6,
    StopSensorDatastream = 7,
    ClearControlQueue = 8,
    ErrorMessage = 9,
    Stop = 10,
    ZeroCommand = 11,
    ZeroDone = 12,
}

impl MessageId {
    /// 原型名称（与固件一致）
    pub fn name(self) -> &'static str {
        match self {
            MessageId::Heartbeat => "Heartbeat",
            MessageId::MotorControl => "MotorControl",
            MessageId::MotorEvent => "MotorEvent",
            MessageId::ControlGo => "ControlGo",
            MessageId::ControlDone => "ControlDone",
            MessageId::StartSensorDatastream => "StartSensorDatastream",
            MessageId::SensorDatastream => "SensorDatastream",
            MessageId::StopSensorDatastream => "StopSensorDatastream",
            MessageId::ClearControlQueue => "ClearControlQueue",
            MessageId::ErrorMessage => "ErrorMessage",
            MessageId::Stop => "Stop",
            MessageId::ZeroCommand => "ZeroCommand",
            MessageId::ZeroDone => "ZeroDone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_roundtrip() {
        for raw in 0u8..=12 {
            let id = MessageId::try_from(raw).expect("id in table");
            assert_eq!(u8::from(id), raw);
        }
    }

    #[test]
    fn test_message_id_unknown() {
        assert!(MessageId::try_from(13u8).is_err());
        assert!(MessageId::try_from(0xFFu8).is_err());
    }

    #[test]
    fn test_message_id_names() {
        assert_eq!(MessageId::MotorControl.name(), "MotorControl");
        assert_eq!(MessageId::ZeroDone.name(), "ZeroDone");
    }
}
