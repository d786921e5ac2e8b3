//! 收发记录
//!
//! 滚动保存最近的原始字节块，每条标注方向与时间，可渲染为十六进制文本。

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// 数据方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn tag(self) -> &'static str {
        match self {
            Direction::Sent => "TX",
            Direction::Received => "RX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub direction: Direction,
    pub bytes: Vec<u8>,
    pub at: Instant,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction.tag(), hex_spaced(&self.bytes))
    }
}

fn hex_spaced(bytes: &[u8]) -> String {
    let encoded = hex::encode(bytes);
    let mut out = String::with_capacity(encoded.len() + bytes.len());
    for (i, pair) in encoded.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(pair.iter().map(|&c| c as char));
    }
    out
}

/// 有界收发记录
///
/// `capacity == 0` 表示不限长度。
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for ChannelHistory {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl ChannelHistory {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn record(&mut self, direction: Direction, bytes: &[u8]) {
        if self.capacity > 0 && self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            direction,
            bytes: bytes.to_vec(),
            at: Instant::now(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 渲染为文本，每条一行（`TX aa 00 ...`）
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = ChannelHistory::with_capacity(2);
        history.record(Direction::Sent, &[1]);
        history.record(Direction::Received, &[2]);
        history.record(Direction::Sent, &[3]);

        let bytes: Vec<_> = history.entries().map(|e| e.bytes[0]).collect();
        assert_eq!(bytes, vec![2, 3]);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let mut history = ChannelHistory::with_capacity(0);
        for i in 0..50u8 {
            history.record(Direction::Sent, &[i]);
        }
        assert_eq!(history.len(), 50);
    }

    #[test]
    fn test_render_hex_lines() {
        let mut history = ChannelHistory::default();
        history.record(Direction::Sent, &[0xAA, 0x00, 0x1F]);
        history.record(Direction::Received, &[0x05]);
        assert_eq!(history.render(), "TX aa 00 1f\nRX 05");

        history.clear();
        assert!(history.is_empty());
    }
}
