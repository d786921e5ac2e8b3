//! MCU 通信编排器
//!
//! [`McuCom`] 持有传输通道、应答状态机、定时器、监听钩子和按消息 ID 注册的处理函数。
//!
//! # 执行模型
//!
//! 不创建后台线程。调用方在主循环中反复调用 [`McuCom::tick`]；
//! 需要阻塞等待应答的操作（[`McuCom::send_and_wait`]）在等待期间自行调用
//! [`McuCom::poll`] 推进链路，因此可以在工作线程中使用，与主循环并发。
//!
//! 应答状态机由互斥锁保护；所有回调（应答回调、钩子、处理函数）都在释放锁之后执行，
//! 回调中可以再次调用 `send`。
//!
//! 接收路径另有一把锁，从 `channel.receive()` 到字节送入解码器全程持有：
//! 多个线程同时 `poll` 时，解码器看到的字节顺序与通道交付顺序一致。

use crate::ack::{AckEvent, AckFailure, AckInterface};
use crate::clock::Clock;
use crate::config::ComConfig;
use crate::error::DriverError;
use crate::history::{MessageHistory, MessageRecord};
use crate::hooks::{HookManager, MessageCallback, ReceiveListener, SendListener};
use crate::reporter::{ErrorReporter, Severity};
use crate::timer::{TaskId, TimerGroup};
use crossbeam_channel::{RecvTimeoutError, bounded};
use fingerlink_protocol::{
    ID_CONTROL_DONE, ID_ERROR_MESSAGE, ID_HEARTBEAT, ID_STOP, ID_ZERO_COMMAND, Message,
    MessageKind, create_heartbeat, create_stop, create_zero_command,
};
use fingerlink_serial::{ComChannel, Direction};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace, warn};

type SuccessFn = Box<dyn FnOnce(&Message, &Message) + Send>;
type FailureFn = Box<dyn FnOnce(&Message, &AckFailure) + Send>;

/// 按消息 ID 注册的处理函数
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// 单个请求的应答回调
///
/// 成功回调收到 `(请求, 应答)`，失败回调收到 `(请求, 失败原因)`；
/// 每个请求最多触发其中一个，且只触发一次。
#[derive(Default)]
pub struct AckHandlers {
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
}

impl AckHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&Message, &Message) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&Message, &AckFailure) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

/// 应答状态机 + 按编号登记的回调（同一把锁）
struct LinkState {
    ack: AckInterface,
    callbacks: HashMap<u16, AckHandlers>,
}

/// MCU 通信编排器
pub struct McuCom {
    channel: Arc<dyn ComChannel>,
    config: ComConfig,
    clock: Arc<dyn Clock>,
    link: Mutex<LinkState>,
    /// 接收路径锁（先于 `link` 获取）
    rx: Mutex<()>,
    timers: Mutex<TimerGroup>,
    hooks: RwLock<HookManager>,
    handlers: RwLock<HashMap<u8, Vec<MessageHandler>>>,
    history: MessageHistory,
    reporter: Arc<ErrorReporter>,
}

impl McuCom {
    /// 创建编排器
    ///
    /// 通常通过 [`McuComBuilder`](crate::McuComBuilder) 构造。会注册默认处理函数
    /// （`ErrorMessage`、`ControlDone`），并在启用时安装心跳任务。
    pub fn new(
        channel: Arc<dyn ComChannel>,
        config: ComConfig,
        clock: Arc<dyn Clock>,
        reporter: Arc<ErrorReporter>,
    ) -> Arc<Self> {
        let com = Arc::new_cyclic(|weak: &Weak<McuCom>| {
            let mut timers = TimerGroup::new();
            if config.heartbeat_enabled {
                let weak = weak.clone();
                timers.add_task(config.heartbeat_interval_ms, clock.now_ms(), move || {
                    if let Some(com) = weak.upgrade() {
                        com.send_heartbeat();
                    }
                });
            }

            Self {
                link: Mutex::new(LinkState {
                    ack: AckInterface::new(config.ack_options()),
                    callbacks: HashMap::new(),
                }),
                rx: Mutex::new(()),
                timers: Mutex::new(timers),
                hooks: RwLock::new(HookManager::new()),
                handlers: RwLock::new(HashMap::new()),
                history: MessageHistory::new(config.history_capacity),
                channel,
                config,
                clock,
                reporter,
            }
        });
        com.install_default_handlers();
        com
    }

    fn install_default_handlers(&self) {
        let reporter = Arc::clone(&self.reporter);
        self.add_handler(ID_ERROR_MESSAGE, move |msg| {
            match msg.get_u8("error_code") {
                Ok(code) => reporter.error(format!("MCU reported error code {code}")),
                Err(e) => reporter.warning(format!("Malformed ErrorMessage: {e}")),
            }
        });

        let reporter = Arc::clone(&self.reporter);
        self.add_handler(ID_CONTROL_DONE, move |msg| {
            let fields = (
                msg.get_bool("success"),
                msg.get_u32("time"),
                msg.get_u8("executed"),
            );
            match fields {
                (Ok(true), Ok(time), Ok(executed)) => reporter.info(format!(
                    "Execution done: {executed} commands in {time} ms"
                )),
                (Ok(false), Ok(time), Ok(executed)) => reporter.warning(format!(
                    "Execution failed after {executed} commands ({time} ms)"
                )),
                _ => reporter.warning(format!("Malformed ControlDone: {msg}")),
            }
        });
    }

    // ==================== 发送 ====================

    /// 发送消息
    ///
    /// 分配编号、（需要应答时）登记等待、编码并发送，随后写入消息历史并通知发送监听者
    /// （无论底层发送是否成功）。
    ///
    /// # 参数
    /// - `message`: 待发送消息（编号由应答层分配）
    /// - `ack_required`: 是否等待应答；为 `false` 时 `handlers` 被忽略
    /// - `handlers`: 成功 / 失败回调
    ///
    /// # 错误
    /// - `DriverError::Channel`: 不需要应答且底层发送失败。需要应答时发送失败只记录警告，
    ///   由应答层按超时重发，最终结果通过 `handlers` 给出。
    pub fn send(
        &self,
        message: Message,
        ack_required: bool,
        handlers: AckHandlers,
    ) -> Result<u16, DriverError> {
        let now = self.clock.now_ms();
        let (message, frame) = {
            let mut link = self.link.lock();
            let (message, frame) = link.ack.prepare(message, ack_required, now);
            if ack_required {
                link.callbacks.insert(message.number(), handlers);
            }
            (message, frame)
        };

        self.history.record(Direction::Sent, &message, now);
        self.hooks.read().trigger_sent(&message);

        if let Err(e) = self.channel.send(&frame) {
            self.reporter
                .warning(format!("Failed to send {}: {}", message, e));
            if !ack_required {
                return Err(e.into());
            }
        }
        Ok(message.number())
    }

    /// 发送并阻塞等待应答
    ///
    /// 等待期间由调用线程推进链路（`poll`），不依赖主循环。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 应答层重试耗尽
    /// - `DriverError::ErrorResponse`: 对端以 ERROR 应答
    /// - `DriverError::WaitTimeout`: 超过 `ack_wait_timeout_ms` 仍无结论
    /// - `DriverError::ChannelClosed`: 等待中的请求被丢弃
    pub fn send_and_wait(&self, message: Message) -> Result<(Message, Message), DriverError> {
        let (tx, rx) = bounded::<Result<(Message, Message), DriverError>>(1);
        let fail_tx = tx.clone();
        let handlers = AckHandlers::new()
            .on_success(move |request, response| {
                let _ = tx.try_send(Ok((request.clone(), response.clone())));
            })
            .on_failure(move |request, failure| {
                let _ = fail_tx.try_send(Err(failure_to_error(request, failure)));
            });

        let description = format!("{} request", message.prototype().name());
        self.send(message, true, handlers)?;

        let deadline = Instant::now() + self.config.ack_wait_timeout();
        loop {
            self.poll();
            match rx.recv_timeout(self.config.poll_interval()) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        return Err(DriverError::WaitTimeout(description));
                    }
                },
                Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ChannelClosed),
            }
        }
    }

    // ==================== 调度 ====================

    /// 推进链路：接收字节、处理应答与超时重发、分发回调
    ///
    /// 返回本次分发的事件数。
    pub fn poll(&self) -> usize {
        let (dispatch, errors, retransmits, now) = {
            let _rx = self.rx.lock();
            let bytes = match self.channel.receive() {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.reporter.warning(format!("Receive failed: {e}"));
                    Vec::new()
                },
            };
            let now = self.clock.now_ms();

            let mut link = self.link.lock();
            let fed = link.ack.feed(&bytes);
            let (retransmits, failures) = link.ack.poll_timeouts(now);

            let dispatch: Vec<_> = fed
                .events
                .into_iter()
                .chain(failures)
                .map(|event| {
                    let handlers = match &event {
                        AckEvent::Acked { request, .. } | AckEvent::Failed { request, .. } => {
                            link.callbacks.remove(&request.number())
                        },
                        AckEvent::Incoming(_) => None,
                    };
                    (event, handlers)
                })
                .collect();
            (dispatch, fed.errors, retransmits, now)
        };

        for e in errors {
            self.reporter.warning(format!("Dropped malformed frame: {e}"));
        }
        for frame in retransmits {
            if let Err(e) = self.channel.send(&frame) {
                warn!("Retransmit failed: {}", e);
            }
        }

        let count = dispatch.len();
        for (event, handlers) in dispatch {
            self.dispatch(event, handlers.unwrap_or_default(), now);
        }
        count
    }

    /// 一次完整调度：`poll` + 定时任务
    ///
    /// 定时任务中不得再调用 `tick`。
    pub fn tick(&self) -> usize {
        let events = self.poll();
        let now = self.clock.now_ms();
        self.timers.lock().tick(now);
        events
    }

    fn dispatch(&self, event: AckEvent, handlers: AckHandlers, now: u64) {
        match event {
            AckEvent::Acked { request, response } => {
                trace!("Acked {} by {}", request, response);
                self.notify_received(&response, now);
                if let Some(on_success) = handlers.on_success {
                    on_success(&request, &response);
                }
            },
            AckEvent::Failed { request, failure } => {
                if let AckFailure::ErrorResponse(response) = &failure {
                    self.notify_received(response, now);
                }
                match handlers.on_failure {
                    Some(on_failure) => on_failure(&request, &failure),
                    None => self
                        .reporter
                        .warning(format!("Request {} failed: {}", request, failure)),
                }
            },
            AckEvent::Incoming(msg) => {
                self.notify_received(&msg, now);
                let handlers: Vec<MessageHandler> = self
                    .handlers
                    .read()
                    .get(&msg.id())
                    .cloned()
                    .unwrap_or_default();
                debug!("Dispatching {} to {} handler(s)", msg, handlers.len());
                for handler in handlers {
                    handler(&msg);
                }
            },
        }
    }

    fn notify_received(&self, msg: &Message, now: u64) {
        self.history.record(Direction::Received, msg, now);
        self.hooks.read().trigger_received(msg);
    }

    // ==================== 内置请求 ====================

    /// 发送一次心跳
    ///
    /// 应答类型、编号或回显值不符时记录 WARNING；无应答同样记录 WARNING。
    pub fn send_heartbeat(&self) {
        let value: i8 = rand::random();
        let on_ok = Arc::clone(&self.reporter);
        let on_err = Arc::clone(&self.reporter);
        let handlers = AckHandlers::new()
            .on_success(move |request, response| {
                if let Err(reason) = verify_heartbeat(request, response) {
                    on_ok.warning(format!("Heartbeat mismatch: {reason}"));
                }
            })
            .on_failure(move |request, failure| {
                on_err.warning(format!("Heartbeat #{} failed: {}", request.number(), failure));
            });

        // 需要应答的发送不会返回通道错误
        let _ = self.send(create_heartbeat(MessageKind::Request, value), true, handlers);
    }

    /// 请求回零
    ///
    /// 根据应答中的 `success` 字段记录 INFO / WARNING；无应答记录 WARNING。
    /// 回零完成事件（`ZeroDone`）由调用方按需注册处理函数等待。
    pub fn zero(&self) -> u16 {
        let on_ok = Arc::clone(&self.reporter);
        let on_err = Arc::clone(&self.reporter);
        let handlers = AckHandlers::new()
            .on_success(move |_, response| match zero_accepted(response) {
                Ok(true) => on_ok.info("Zeroing started"),
                Ok(false) => on_ok.warning("MCU refused zeroing"),
                Err(reason) => on_ok.warning(format!("Zero command: {reason}")),
            })
            .on_failure(move |_, failure| {
                on_err.warning(format!("Zero command failed: {failure}"));
            });
        self.send_acked(create_zero_command(MessageKind::Request, false), handlers)
    }

    /// 急停
    ///
    /// 应答记录为 INFO，失败记录为 ERROR。
    pub fn stop(&self) -> u16 {
        let on_ok = Arc::clone(&self.reporter);
        let on_err = Arc::clone(&self.reporter);
        let handlers = AckHandlers::new()
            .on_success(move |_, response| {
                if response.id() == ID_STOP {
                    on_ok.info("Stop acknowledged");
                } else {
                    on_ok.warning(format!("Unexpected response to Stop: {response}"));
                }
            })
            .on_failure(move |_, failure| {
                on_err.report(format!("Stop failed: {failure}"), Severity::Error);
            });
        self.send_acked(create_stop(MessageKind::Request, rand::random()), handlers)
    }

    fn send_acked(&self, message: Message, handlers: AckHandlers) -> u16 {
        // ack_required 时 send 只在内部记录通道错误
        self.send(message, true, handlers).unwrap_or_default()
    }

    // ==================== 注册 ====================

    /// 注册按消息 ID 分发的处理函数
    ///
    /// 收到不属于任何等待请求的消息（对端请求、迟到的应答）时调用。
    pub fn add_handler(&self, id: u8, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.handlers
            .write()
            .entry(id)
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn add_callback(&self, callback: Arc<dyn MessageCallback>) {
        self.hooks.write().add_callback(callback);
    }

    /// 每条发出的消息都会通知
    pub fn add_send_listener(&self, f: impl Fn(&Message) + Send + Sync + 'static) {
        self.add_callback(Arc::new(SendListener(f)));
    }

    /// 每条收到的消息都会通知（包括应答）
    pub fn add_receive_listener(&self, f: impl Fn(&Message) + Send + Sync + 'static) {
        self.add_callback(Arc::new(ReceiveListener(f)));
    }

    /// 添加定时任务（在 `tick` 中执行）
    pub fn add_timer(&self, interval_ms: i64, action: impl FnMut() + Send + 'static) -> TaskId {
        let now = self.clock.now_ms();
        self.timers.lock().add_task(interval_ms, now, action)
    }

    pub fn remove_timer(&self, id: TaskId) -> bool {
        self.timers.lock().remove_task(id)
    }

    // ==================== 访问器 ====================

    pub fn message_history(&self) -> Vec<MessageRecord> {
        self.history.snapshot()
    }

    pub fn channel(&self) -> &Arc<dyn ComChannel> {
        &self.channel
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    pub fn config(&self) -> &ComConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 等待应答的请求数
    pub fn pending_count(&self) -> usize {
        self.link.lock().ack.pending_count()
    }
}

impl std::fmt::Debug for McuCom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McuCom")
            .field("config", &self.config)
            .field("open", &self.channel.is_open())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

fn failure_to_error(request: &Message, failure: &AckFailure) -> DriverError {
    match failure {
        AckFailure::Timeout { attempts } => DriverError::Timeout {
            request: request.to_string(),
            attempts: *attempts,
        },
        AckFailure::ErrorResponse(response) => DriverError::ErrorResponse {
            request: request.to_string(),
            response: Box::new(response.clone()),
        },
    }
}

/// 校验心跳应答：类型、编号、回显值
pub fn verify_heartbeat(request: &Message, response: &Message) -> Result<(), String> {
    if response.id() != ID_HEARTBEAT {
        return Err(format!("expected Heartbeat response, got {}", response.prototype().name()));
    }
    if response.number() != request.number() {
        return Err(format!(
            "response number {} does not match request {}",
            response.number(),
            request.number()
        ));
    }
    let sent = request.get_i8("rand").map_err(|e| e.to_string())?;
    let echoed = response.get_i8("rand").map_err(|e| e.to_string())?;
    if sent != echoed {
        return Err(format!("sent {sent}, echoed {echoed}"));
    }
    Ok(())
}

/// 解析回零应答中的 `success`
pub fn zero_accepted(response: &Message) -> Result<bool, String> {
    if response.id() != ID_ZERO_COMMAND {
        return Err(format!("unexpected response {}", response.prototype().name()));
    }
    response.get_bool("success").map_err(|e| e.to_string())
}
