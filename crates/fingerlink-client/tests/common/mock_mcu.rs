//! 模拟 MCU
//!
//! 解码主机发送的请求并按 [`McuBehavior`] 生成应答，所有收到的请求按顺序记录。

use fingerlink_protocol::*;
use fingerlink_serial::MockChannel;
use parking_lot::Mutex;
use std::sync::Arc;

/// 电机指令的应答方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorReply {
    /// 回送字段一致的 MotorEvent
    Event,
    /// 回送 MotorControl 本身（新固件）
    Echo,
}

/// MCU 行为配置
#[derive(Debug, Clone)]
pub struct McuBehavior {
    pub motor_reply: MotorReply,
    /// 第 k 条（从 0 计）电机指令回送错误的 `event_value`
    pub corrupt_motor_at: Option<usize>,
    pub ack_clear: bool,
    pub ack_go: bool,
    pub ack_streams: bool,
    pub accept_zero: bool,
    /// 接受回零后随应答一并发送的 ZeroDone；`None` 表示不发送
    pub zero_done: Option<bool>,
}

impl Default for McuBehavior {
    fn default() -> Self {
        Self {
            motor_reply: MotorReply::Event,
            corrupt_motor_at: None,
            ack_clear: true,
            ack_go: true,
            ack_streams: true,
            accept_zero: true,
            zero_done: Some(true),
        }
    }
}

#[derive(Default)]
struct McuState {
    behavior: McuBehavior,
    requests: Vec<Message>,
    motor_count: usize,
}

pub struct MockMcu {
    channel: Arc<MockChannel>,
    state: Arc<Mutex<McuState>>,
}

impl MockMcu {
    pub fn new(behavior: McuBehavior) -> Self {
        let state = Arc::new(Mutex::new(McuState {
            behavior,
            ..McuState::default()
        }));

        let mut decoder = FrameDecoder::new();
        let shared = Arc::clone(&state);
        let channel = Arc::new(MockChannel::new(move |bytes| {
            let mut out = Vec::new();
            for request in decoder.push(bytes).into_iter().flatten() {
                if request.kind() != MessageKind::Request {
                    continue;
                }
                let mut state = shared.lock();
                state.requests.push(request.clone());
                for reply in answer(&mut state, &request) {
                    out.extend(encode_frame(&reply));
                }
            }
            out
        }));

        Self { channel, state }
    }

    pub fn channel(&self) -> &Arc<MockChannel> {
        &self.channel
    }

    /// 收到的全部请求（含重发）
    pub fn requests(&self) -> Vec<Message> {
        self.state.lock().requests.clone()
    }

    /// 收到的指定 ID 请求
    pub fn requests_with(&self, id: u8) -> Vec<Message> {
        self.requests().into_iter().filter(|m| m.id() == id).collect()
    }

    pub fn set_behavior(&self, behavior: McuBehavior) {
        self.state.lock().behavior = behavior;
    }

    /// 主动上报一条遥测数据
    pub fn stream(&self, joint: u8, data: f32) {
        self.channel
            .inject(&encode_frame(&create_sensor_datastream(MessageKind::Request, joint, data)));
    }
}

fn numbered(mut message: Message, number: u16) -> Message {
    message.set_number(number);
    message
}

/// 同 ID、同字段、同编号的 RESPONSE
fn echo(request: &Message) -> Message {
    Message::response_to(request, MessageKind::Response, request.prototype(), request.values().to_vec())
        .unwrap()
}

fn answer(state: &mut McuState, request: &Message) -> Vec<Message> {
    let behavior = state.behavior.clone();
    let number = request.number();
    let response = |message: Message| vec![numbered(message, number)];

    match request.id() {
        ID_MOTOR_CONTROL => {
            let index = state.motor_count;
            state.motor_count += 1;

            let motor_id = request.get_u8("motor_id").unwrap();
            let mode = request.get_u8("control_mode").unwrap();
            let mut value = request.get_f32("control_value").unwrap();
            if behavior.corrupt_motor_at == Some(index) {
                value += 1.0;
            }
            match behavior.motor_reply {
                MotorReply::Event => response(create_motor_event(
                    MessageKind::Response,
                    motor_id,
                    true,
                    mode,
                    value,
                    index as u8,
                    0,
                )),
                MotorReply::Echo => response(create_motor_control(
                    MessageKind::Response,
                    motor_id,
                    mode,
                    value,
                    request.get_bool("simultaneous").unwrap(),
                )),
            }
        },
        ID_CLEAR_CONTROL_QUEUE if behavior.ack_clear => {
            response(create_clear_control_queue(MessageKind::Response, 0))
        },
        ID_CONTROL_GO if behavior.ack_go => response(create_control_go(MessageKind::Response, 0)),
        ID_START_SENSOR_DATASTREAM | ID_STOP_SENSOR_DATASTREAM if behavior.ack_streams => {
            vec![echo(request)]
        },
        ID_ZERO_COMMAND => {
            let mut replies = response(create_zero_command(MessageKind::Response, behavior.accept_zero));
            if behavior.accept_zero {
                if let Some(success) = behavior.zero_done {
                    replies.push(create_zero_done(MessageKind::Request, success));
                }
            }
            replies
        },
        ID_HEARTBEAT | ID_STOP => vec![echo(request)],
        _ => Vec::new(),
    }
}
