//! 消息工厂函数
//!
//! 每种消息一个工厂函数，保证生成的字段集合与原型完全一致。

use crate::ids::*;
use crate::message::{FieldValue, Message, MessageKind};
use crate::schema::standard_prototype;

fn build(kind: MessageKind, id: u8, values: Vec<FieldValue>) -> Message {
    Message::from_factory(kind, standard_prototype(id), values)
}

/// 心跳（`rand` 由对端原样回显）
pub fn create_heartbeat(kind: MessageKind, rand: i8) -> Message {
    build(kind, ID_HEARTBEAT, vec![rand.into()])
}

/// 电机控制指令
///
/// `simultaneous = true` 表示与前一条指令同时执行（同组）。
pub fn create_motor_control(
    kind: MessageKind,
    motor_id: u8,
    control_mode: u8,
    control_value: f32,
    simultaneous: bool,
) -> Message {
    build(
        kind,
        ID_MOTOR_CONTROL,
        vec![
            motor_id.into(),
            control_mode.into(),
            control_value.into(),
            simultaneous.into(),
        ],
    )
}

/// 电机事件
pub fn create_motor_event(
    kind: MessageKind,
    motor_id: u8,
    success: bool,
    event_type: u8,
    event_value: f32,
    num_in_queue: u8,
    executed_with_count: u8,
) -> Message {
    build(
        kind,
        ID_MOTOR_EVENT,
        vec![
            motor_id.into(),
            success.into(),
            event_type.into(),
            event_value.into(),
            num_in_queue.into(),
            executed_with_count.into(),
        ],
    )
}

pub fn create_control_go(kind: MessageKind, rand: i8) -> Message {
    build(kind, ID_CONTROL_GO, vec![rand.into()])
}

/// 执行完成（`time` 为执行耗时，毫秒；`executed` 为已执行指令数）
pub fn create_control_done(kind: MessageKind, success: bool, time: u32, executed: u8) -> Message {
    build(
        kind,
        ID_CONTROL_DONE,
        vec![success.into(), time.into(), executed.into()],
    )
}

pub fn create_start_sensor_datastream(kind: MessageKind, sensor_id: u8, frequency: u8) -> Message {
    build(
        kind,
        ID_START_SENSOR_DATASTREAM,
        vec![sensor_id.into(), frequency.into()],
    )
}

pub fn create_sensor_datastream(kind: MessageKind, sensor_id: u8, data: f32) -> Message {
    build(kind, ID_SENSOR_DATASTREAM, vec![sensor_id.into(), data.into()])
}

pub fn create_stop_sensor_datastream(kind: MessageKind, sensor_id: u8) -> Message {
    build(kind, ID_STOP_SENSOR_DATASTREAM, vec![sensor_id.into()])
}

pub fn create_clear_control_queue(kind: MessageKind, rand: i8) -> Message {
    build(kind, ID_CLEAR_CONTROL_QUEUE, vec![rand.into()])
}

pub fn create_error_message(kind: MessageKind, error_code: u8) -> Message {
    build(kind, ID_ERROR_MESSAGE, vec![error_code.into()])
}

/// 急停
pub fn create_stop(kind: MessageKind, rand: i8) -> Message {
    build(kind, ID_STOP, vec![rand.into()])
}

/// 回零指令（应答中的 `success` 表示 MCU 是否接受）
pub fn create_zero_command(kind: MessageKind, success: bool) -> Message {
    build(kind, ID_ZERO_COMMAND, vec![success.into()])
}

/// 回零完成事件（MCU 异步发送）
pub fn create_zero_done(kind: MessageKind, success: bool) -> Message {
    build(kind, ID_ZERO_DONE, vec![success.into()])
}
