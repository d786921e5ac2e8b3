//! 内存通道（测试 / 离线演练）
//!
//! 每次 `send` 把字节交给应答函数，应答函数返回的字节进入接收队列，
//! 由下一次 `receive` 取出。应答函数返回空即模拟"对端不回复"。

use crate::history::{ChannelHistory, Direction, HistoryEntry};
use crate::tap::ChannelTap;
use crate::{ByteObserver, ChannelError, ComChannel};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// 应答函数：输入一次发送的全部字节，返回对端回送的字节
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

pub struct MockChannel {
    responder: Mutex<Responder>,
    inbox: Mutex<Vec<u8>>,
    sent: Mutex<Vec<Vec<u8>>>,
    open: AtomicBool,
    tap: ChannelTap,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::silent()
    }
}

impl MockChannel {
    pub fn new(responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> Self {
        Self {
            responder: Mutex::new(Box::new(responder)),
            inbox: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            tap: ChannelTap::new(ChannelHistory::DEFAULT_CAPACITY),
        }
    }

    /// 从不回复的对端
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// 回环：发送的字节原样进入接收队列
    pub fn loopback() -> Self {
        Self::new(|bytes| bytes.to_vec())
    }

    pub fn set_responder(&self, responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) {
        *self.responder.lock() = Box::new(responder);
    }

    /// 注入对端主动发送的字节
    pub fn inject(&self, bytes: &[u8]) {
        self.inbox.lock().extend_from_slice(bytes);
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// 已发送的字节块（按发送顺序）
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl ComChannel for MockChannel {
    fn send(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.sent.lock().push(bytes.to_vec());
        self.tap.record(Direction::Sent, bytes);

        let reply = (self.responder.lock())(bytes);
        if !reply.is_empty() {
            self.inbox.lock().extend_from_slice(&reply);
        }
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, ChannelError> {
        if !self.is_open() {
            return Ok(Vec::new());
        }
        let data = std::mem::take(&mut *self.inbox.lock());
        self.tap.record(Direction::Received, &data);
        Ok(data)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn add_observer(&self, direction: Direction, observer: ByteObserver) {
        self.tap.add_observer(direction, observer);
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.tap.history()
    }

    fn clear_history(&self) {
        self.tap.clear_history();
    }
}
