//! 钩子系统（Hook System）
//!
//! 在消息发送 / 接收时触发自定义回调（UI 监听、消息历史记录等）。
//!
//! # 使用示例
//!
//! ```rust
//! use fingerlink_driver::hooks::{HookManager, MessageCallback};
//! use fingerlink_protocol::{Message, MessageKind, create_heartbeat};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl MessageCallback for Printer {
//!     fn on_message_received(&self, msg: &Message) {
//!         println!("RX {msg}");
//!     }
//! }
//!
//! let mut hooks = HookManager::new();
//! hooks.add_callback(Arc::new(Printer));
//! hooks.trigger_received(&create_heartbeat(MessageKind::Response, 1));
//! ```

use fingerlink_protocol::Message;
use std::sync::Arc;

/// 消息回调 Trait
///
/// 回调在 tick / poll 线程上同步执行（应答层锁已释放），应尽快返回。
pub trait MessageCallback: Send + Sync {
    /// 收到并解码出一条消息时调用
    fn on_message_received(&self, msg: &Message);

    /// 发送一条消息时调用（无论底层发送是否成功）
    ///
    /// 默认为空操作。
    fn on_message_sent(&self, msg: &Message) {
        let _ = msg;
    }
}

/// 只关心发送方向的闭包回调
pub struct SendListener<F>(pub F);

impl<F> MessageCallback for SendListener<F>
where
    F: Fn(&Message) + Send + Sync,
{
    fn on_message_received(&self, _msg: &Message) {}

    fn on_message_sent(&self, msg: &Message) {
        (self.0)(msg)
    }
}

/// 只关心接收方向的闭包回调
pub struct ReceiveListener<F>(pub F);

impl<F> MessageCallback for ReceiveListener<F>
where
    F: Fn(&Message) + Send + Sync,
{
    fn on_message_received(&self, msg: &Message) {
        (self.0)(msg)
    }
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（`McuCom` 中为 `RwLock<HookManager>`）。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn MessageCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn MessageCallback>) {
        self.callbacks.push(callback);
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    pub fn trigger_received(&self, msg: &Message) {
        for callback in self.callbacks.iter() {
            callback.on_message_received(msg);
        }
    }

    pub fn trigger_sent(&self, msg: &Message) {
        for callback in self.callbacks.iter() {
            callback.on_message_sent(msg);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
