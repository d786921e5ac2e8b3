//! 指令缓冲区与分组执行状态机
//!
//! # 状态转换
//!
//! ```text
//! Idle ──send──▶ Sending{0..n} ──全部确认──▶ Executing ──▶ Idle
//!                     │
//!                     └──任一失败（立即中止）──▶ Clearing ──▶ Idle（本地缓冲区保留）
//!
//! Idle ──zero──▶ Zeroing ──接受──▶ WaitingZeroDone ──▶ Idle
//! ```
//!
//! 非 `Idle` 状态下，所有会改变缓冲区或发起新流程的操作都被拒绝并记录 WARNING。
//! 每条指令严格串行：第 N+1 条只在第 N 条确认之后才发送。

use crate::error::ClientError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use fingerlink_driver::mcu_com::zero_accepted;
use fingerlink_driver::{ErrorReporter, McuCom};
use fingerlink_protocol::{
    ControlMode, ID_CLEAR_CONTROL_QUEUE, ID_CONTROL_GO, ID_MOTOR_CONTROL, ID_MOTOR_EVENT,
    ID_SENSOR_DATASTREAM, ID_ZERO_DONE, Message, MessageKind, create_clear_control_queue,
    create_control_go, create_motor_control, create_zero_command,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info};

/// 缓冲区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    #[default]
    Idle,
    /// 正在发送第 `index` 条（共 `total` 条）并等待确认
    Sending { index: usize, total: usize },
    /// 正在发送 ControlGo
    Executing,
    /// 正在发送 ClearControlQueue
    Clearing,
    /// 正在发送 ZeroCommand
    Zeroing,
    /// 等待 MCU 的 ZeroDone 事件
    WaitingZeroDone,
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferState::Idle => f.write_str("IDLE"),
            BufferState::Sending { index, total } => write!(f, "SENDING {}/{}", index + 1, total),
            BufferState::Executing => f.write_str("EXECUTING"),
            BufferState::Clearing => f.write_str("CLEARING"),
            BufferState::Zeroing => f.write_str("ZEROING"),
            BufferState::WaitingZeroDone => f.write_str("WAITING_ZERO_DONE"),
        }
    }
}

/// 一次缓冲区操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOutcome {
    /// ControlGo 已确认，本地缓冲区已清空
    Executed,
    /// ControlGo 失败，本地缓冲区保留
    ExecuteFailed,
    /// ClearControlQueue 已确认。`clear_buffer` 会同时清空本地缓冲区；
    /// 发送失败后的远端清除保留本地缓冲区以便重发
    Cleared,
    /// ClearControlQueue 失败，本地缓冲区保留（本地与远端可能不一致）
    ClearFailed,
    /// 回零完成
    Zeroed,
    /// 回零被拒绝、无应答或未在时限内完成
    ZeroFailed,
    /// 缓冲区忙，操作被拒绝
    Refused,
}

type SendCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// 指令缓冲区
pub struct CommandBuffer {
    com: Arc<McuCom>,
    reporter: Arc<ErrorReporter>,
    buffer: Mutex<Vec<Message>>,
    state: Mutex<BufferState>,
    on_send: RwLock<Vec<SendCallback>>,
    zero_done: Arc<Mutex<Option<Sender<bool>>>>,
}

impl CommandBuffer {
    /// 创建缓冲区，并在 `com` 上注册 ZeroDone 处理函数
    pub fn new(com: Arc<McuCom>) -> Self {
        let zero_done: Arc<Mutex<Option<Sender<bool>>>> = Arc::new(Mutex::new(None));
        let waiter = Arc::clone(&zero_done);
        com.add_handler(ID_ZERO_DONE, move |msg| {
            if let Some(tx) = waiter.lock().as_ref() {
                let _ = tx.try_send(msg.get_bool("success").unwrap_or(false));
            }
        });

        Self {
            reporter: Arc::clone(com.reporter()),
            com,
            buffer: Mutex::new(Vec::new()),
            state: Mutex::new(BufferState::Idle),
            on_send: RwLock::new(Vec::new()),
            zero_done,
        }
    }

    pub fn state(&self) -> BufferState {
        *self.state.lock()
    }

    /// 是否处于发送 / 执行 / 清除 / 回零流程中
    pub fn is_sending_buffer(&self) -> bool {
        self.state() != BufferState::Idle
    }

    /// 当前缓冲区内容（副本）
    pub fn get_buffer(&self) -> Vec<Message> {
        self.buffer.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// 每条缓冲指令发送前调用
    pub fn add_callback_on_send(&self, callback: impl Fn(&Message) + Send + Sync + 'static) {
        self.on_send.write().push(Arc::new(callback));
    }

    /// 追加指令
    ///
    /// # 错误
    /// - `ClientError::Busy`: 缓冲区不在 `Idle`
    pub fn add_command(&self, message: Message) -> Result<(), ClientError> {
        self.add_commands(std::iter::once(message))
    }

    fn add_commands(&self, messages: impl IntoIterator<Item = Message>) -> Result<(), ClientError> {
        let state = self.state.lock();
        if *state != BufferState::Idle {
            let err = ClientError::Busy { state: *state };
            self.reporter.warning(format!("Cannot add command: {err}"));
            return Err(err);
        }
        self.buffer.lock().extend(messages);
        Ok(())
    }

    /// 从文本文件加载指令
    ///
    /// 每个非空行 `angle0,angle1` 展开为两条位置控制指令（电机 0、电机 1，
    /// `simultaneous = true`）。空行与 `#` 开头的注释行被跳过。
    /// 任一行格式错误时整个文件都不加载。
    ///
    /// 返回追加的指令条数。
    ///
    /// # 错误
    /// - `ClientError::Io`: 文件读取失败
    /// - `ClientError::Parse`: 行格式错误（行号从 1 开始）
    /// - `ClientError::Busy`: 缓冲区不在 `Idle`
    pub fn load_buffer_from_file(&self, path: impl AsRef<Path>) -> Result<usize, ClientError> {
        let content = std::fs::read_to_string(path)?;
        let commands = parse_buffer_file(&content)?;
        let count = commands.len();
        self.add_commands(commands)?;
        info!("Loaded {} commands into buffer", count);
        Ok(count)
    }

    // ==================== 状态转换 ====================

    /// 原子地从 `Idle` 进入 `next`
    fn try_begin(&self, next: BufferState, operation: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if *state != BufferState::Idle {
            let err = ClientError::Busy { state: *state };
            self.reporter.warning(format!("Cannot {operation}: {err}"));
            return Err(err);
        }
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: BufferState) {
        debug!("Command buffer -> {}", next);
        *self.state.lock() = next;
    }

    fn finish(&self, outcome: BufferOutcome) -> BufferOutcome {
        self.set_state(BufferState::Idle);
        outcome
    }

    // ==================== 发送缓冲区 ====================

    /// 发送整个缓冲区（阻塞）
    ///
    /// 逐条发送并等待确认；全部成功后发送 ControlGo，任一失败立即中止并发送
    /// ClearControlQueue。失败时本地缓冲区原样保留，可直接重发。
    /// 非 `Idle` 时返回 `Refused`。
    pub fn send_command_buffer(&self) -> BufferOutcome {
        let total = self.len();
        if self
            .try_begin(BufferState::Sending { index: 0, total }, "send buffer")
            .is_err()
        {
            return BufferOutcome::Refused;
        }
        self.run_send()
    }

    /// 在工作线程中发送整个缓冲区
    ///
    /// 状态在启动线程之前已切换，返回后立即调用的其它操作都会被拒绝。
    ///
    /// # 错误
    /// - `ClientError::Busy`: 缓冲区不在 `Idle`
    pub fn send_command_buffer_async(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<BufferOutcome>, ClientError> {
        let total = self.len();
        self.try_begin(BufferState::Sending { index: 0, total }, "send buffer")?;
        let this = Arc::clone(self);
        Ok(thread::spawn(move || this.run_send()))
    }

    fn run_send(&self) -> BufferOutcome {
        let entries = self.get_buffer();
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            self.set_state(BufferState::Sending { index, total });
            let callbacks: Vec<SendCallback> = self.on_send.read().clone();
            for callback in callbacks {
                callback(entry);
            }

            let verdict = self
                .com
                .send_and_wait(entry.clone())
                .map_err(|e| e.to_string())
                .and_then(|(request, response)| verify_entry(&request, &response));

            if let Err(reason) = verdict {
                self.reporter.warning(format!(
                    "Command {}/{} failed: {}; keeping buffer locally, clearing remote buffer",
                    index + 1,
                    total,
                    reason
                ));
                self.set_state(BufferState::Clearing);
                return self.run_clear(false);
            }
        }

        self.set_state(BufferState::Executing);
        self.run_execute()
    }

    // ==================== Clear / Go ====================

    /// 请求 MCU 清空指令队列；确认后清空本地缓冲区
    pub fn clear_buffer(&self) -> BufferOutcome {
        if self.try_begin(BufferState::Clearing, "clear buffer").is_err() {
            return BufferOutcome::Refused;
        }
        self.run_clear(true)
    }

    /// 请求 MCU 执行已下发的指令；确认后清空本地缓冲区
    pub fn execute_buffer(&self) -> BufferOutcome {
        if self.try_begin(BufferState::Executing, "execute buffer").is_err() {
            return BufferOutcome::Refused;
        }
        self.run_execute()
    }

    fn run_clear(&self, discard_local: bool) -> BufferOutcome {
        let request = create_clear_control_queue(MessageKind::Request, rand::random());
        if self.request_confirmed(request, ID_CLEAR_CONTROL_QUEUE, "Clear buffer") {
            if discard_local {
                self.buffer.lock().clear();
            }
            self.finish(BufferOutcome::Cleared)
        } else {
            self.finish(BufferOutcome::ClearFailed)
        }
    }

    fn run_execute(&self) -> BufferOutcome {
        let request = create_control_go(MessageKind::Request, rand::random());
        if self.request_confirmed(request, ID_CONTROL_GO, "Execute buffer") {
            info!("Buffer executed");
            self.buffer.lock().clear();
            self.finish(BufferOutcome::Executed)
        } else {
            self.finish(BufferOutcome::ExecuteFailed)
        }
    }

    /// 发送并等待确认，应答 ID 必须为 `expected_id`；失败记录 WARNING
    fn request_confirmed(&self, request: Message, expected_id: u8, what: &str) -> bool {
        match self.com.send_and_wait(request) {
            Ok((_, response)) if response.id() == expected_id => true,
            Ok((_, response)) => {
                self.reporter
                    .warning(format!("{what}: unexpected response {response}"));
                false
            },
            Err(e) => {
                self.reporter.warning(format!("{what} failed: {e}"));
                false
            },
        }
    }

    // ==================== 回零 ====================

    /// 回零（阻塞）
    ///
    /// 发送 ZeroCommand 并等待确认；MCU 接受后继续等待 ZeroDone 事件
    /// （上限 `zero_done_timeout_ms`），之后回到 `Idle`。
    pub fn zero(&self) -> BufferOutcome {
        if self.try_begin(BufferState::Zeroing, "zero").is_err() {
            return BufferOutcome::Refused;
        }
        self.run_zero()
    }

    /// 在工作线程中回零
    pub fn zero_async(self: &Arc<Self>) -> Result<JoinHandle<BufferOutcome>, ClientError> {
        self.try_begin(BufferState::Zeroing, "zero")?;
        let this = Arc::clone(self);
        Ok(thread::spawn(move || this.run_zero()))
    }

    fn run_zero(&self) -> BufferOutcome {
        // 先登记等待者：ZeroDone 可能与应答在同一次接收中到达
        let (tx, rx) = bounded::<bool>(1);
        *self.zero_done.lock() = Some(tx);
        let outcome = self.zero_inner(&rx);
        self.zero_done.lock().take();
        self.finish(outcome)
    }

    fn zero_inner(&self, rx: &Receiver<bool>) -> BufferOutcome {
        let accepted = self
            .com
            .send_and_wait(create_zero_command(MessageKind::Request, false))
            .map_err(|e| e.to_string())
            .and_then(|(_, response)| zero_accepted(&response));

        match accepted {
            Ok(true) => self.reporter.info("Zeroing started"),
            Ok(false) => {
                self.reporter.warning("MCU refused zeroing");
                return BufferOutcome::ZeroFailed;
            },
            Err(reason) => {
                self.reporter.warning(format!("Zero command failed: {reason}"));
                return BufferOutcome::ZeroFailed;
            },
        }

        self.set_state(BufferState::WaitingZeroDone);
        let config = self.com.config();
        let deadline = Instant::now() + config.zero_done_timeout();
        loop {
            self.com.poll();
            match rx.recv_timeout(config.poll_interval()) {
                Ok(true) => {
                    self.reporter.info("Zeroing done");
                    return BufferOutcome::Zeroed;
                },
                Ok(false) => {
                    self.reporter.warning("Zeroing failed on MCU");
                    return BufferOutcome::ZeroFailed;
                },
                Err(RecvTimeoutError::Timeout) if Instant::now() < deadline => {},
                Err(_) => {
                    self.reporter.warning(format!(
                        "No ZeroDone within {} ms",
                        config.zero_done_timeout_ms
                    ));
                    return BufferOutcome::ZeroFailed;
                },
            }
        }
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("state", &self.state())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// 将缓冲区划分为指令组
///
/// 遇到 `simultaneous == false`（或没有该字段）的指令时开启新组，否则并入当前组。
/// 仅用于展示，执行顺序始终按条串行。
pub fn calculate_command_groups(buffer: &[Message]) -> Vec<&[Message]> {
    buffer
        .chunk_by(|_, next| next.get_bool("simultaneous").unwrap_or(false))
        .collect()
}

/// 校验一条缓冲指令的应答
///
/// - `MotorControl`：应答为 `MotorEvent`（`motor_id`、`event_type`、`event_value`）
///   或 `MotorControl`（`motor_id`、`control_mode`、`control_value`），字段须与请求完全一致
/// - `SensorDatastream`：应答须为同类消息，`sensor_id` 与 `data` 一致
/// - 其它类型一律失败
pub fn verify_entry(request: &Message, response: &Message) -> Result<(), String> {
    if response.number() != request.number() {
        return Err(format!(
            "response number {} does not match request {}",
            response.number(),
            request.number()
        ));
    }

    let check = |req_field: &str, resp_field: &str| -> Result<(), String> {
        let expected = request.get(req_field).map_err(|e| e.to_string())?;
        let actual = response.get(resp_field).map_err(|e| e.to_string())?;
        if expected == actual {
            Ok(())
        } else {
            Err(format!("{resp_field} is {actual}, expected {expected}"))
        }
    };

    match (request.id(), response.id()) {
        (ID_MOTOR_CONTROL, ID_MOTOR_EVENT) => {
            check("motor_id", "motor_id")?;
            check("control_mode", "event_type")?;
            check("control_value", "event_value")
        },
        (ID_MOTOR_CONTROL, ID_MOTOR_CONTROL) => {
            check("motor_id", "motor_id")?;
            check("control_mode", "control_mode")?;
            check("control_value", "control_value")
        },
        (ID_SENSOR_DATASTREAM, ID_SENSOR_DATASTREAM) => {
            check("sensor_id", "sensor_id")?;
            check("data", "data")
        },
        (ID_MOTOR_CONTROL | ID_SENSOR_DATASTREAM, _) => Err(format!(
            "unexpected response {} to {}",
            response.prototype().name(),
            request.prototype().name()
        )),
        _ => Err(format!(
            "unsupported buffer entry {}",
            request.prototype().name()
        )),
    }
}

/// 解析缓冲区文件内容
pub fn parse_buffer_file(content: &str) -> Result<Vec<Message>, ClientError> {
    let mut commands = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_err = |reason: String| ClientError::Parse {
            line: idx + 1,
            reason,
        };
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let (a0, a1) = match parts.as_slice() {
            [a0, a1] => (*a0, *a1),
            _ => {
                return Err(parse_err(format!(
                    "expected 2 comma-separated angles, got {}",
                    parts.len()
                )));
            },
        };
        let parse = |s: &str| {
            s.parse::<f32>()
                .map_err(|e| parse_err(format!("invalid angle '{s}': {e}")))
        };
        let (angle0, angle1) = (parse(a0)?, parse(a1)?);

        let mode = ControlMode::Position.into();
        commands.push(create_motor_control(MessageKind::Request, 0, mode, angle0, true));
        commands.push(create_motor_control(MessageKind::Request, 1, mode, angle1, true));
    }
    Ok(commands)
}
