//! 观察者与收发记录的公共部分（各通道实现共用）

use crate::history::{ChannelHistory, Direction, HistoryEntry};
use crate::ByteObserver;
use parking_lot::{Mutex, RwLock};

pub(crate) struct ChannelTap {
    sent_observers: RwLock<Vec<ByteObserver>>,
    received_observers: RwLock<Vec<ByteObserver>>,
    history: Mutex<ChannelHistory>,
}

impl ChannelTap {
    pub(crate) fn new(history_capacity: usize) -> Self {
        Self {
            sent_observers: RwLock::new(Vec::new()),
            received_observers: RwLock::new(Vec::new()),
            history: Mutex::new(ChannelHistory::with_capacity(history_capacity)),
        }
    }

    pub(crate) fn add_observer(&self, direction: Direction, observer: ByteObserver) {
        match direction {
            Direction::Sent => self.sent_observers.write().push(observer),
            Direction::Received => self.received_observers.write().push(observer),
        }
    }

    pub(crate) fn record(&self, direction: Direction, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.history.lock().record(direction, bytes);
        let observers = match direction {
            Direction::Sent => self.sent_observers.read(),
            Direction::Received => self.received_observers.read(),
        };
        for observer in observers.iter() {
            observer(bytes);
        }
    }

    pub(crate) fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().entries().cloned().collect()
    }

    pub(crate) fn clear_history(&self) {
        self.history.lock().clear();
    }
}
