//! 控制模式
//!
//! `MotorControl.control_mode` 字段承载的应用层枚举。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 电机控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlMode {
    /// 位置控制（控制值单位：弧度）
    #[default]
    Position = 0,
    /// 速度控制
    Velocity = 1,
    /// 力矩控制
    Torque = 2,
}

impl ControlMode {
    /// 从原始字段值解析
    ///
    /// # 错误
    /// - `ProtocolError::InvalidValue`: 不在 0..=2 范围内
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        Self::try_from(raw).map_err(|_| ProtocolError::InvalidValue {
            field: "control_mode".to_string(),
            value: raw,
        })
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlMode::Position => "Position",
            ControlMode::Velocity => "Velocity",
            ControlMode::Torque => "Torque",
        };
        f.write_str(s)
    }
}
