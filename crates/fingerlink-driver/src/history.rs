//! 消息历史（已解码的收发消息）

use fingerlink_protocol::Message;
use fingerlink_serial::Direction;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub direction: Direction,
    pub message: Message,
    pub timestamp_ms: u64,
}

/// 有界消息历史，`capacity == 0` 表示不限长度
#[derive(Debug)]
pub struct MessageHistory {
    entries: Mutex<VecDeque<MessageRecord>>,
    capacity: usize,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn record(&self, direction: Direction, message: &Message, timestamp_ms: u64) {
        let mut entries = self.entries.lock();
        if self.capacity > 0 && entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(MessageRecord {
            direction,
            message: message.clone(),
            timestamp_ms,
        });
    }

    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
