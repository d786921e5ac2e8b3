//! 应答层（Ack Layer）
//!
//! 纯状态机：不持有通道也不读时钟，由调用方传入字节和当前时间。
//!
//! - [`AckInterface::prepare`] 为待发消息分配编号并编码；需要应答时登记到等待表
//! - [`AckInterface::feed`] 解码收到的字节，按编号匹配等待中的请求
//! - [`AckInterface::poll_timeouts`] 处理超时：未用尽重试次数则给出重发帧，否则判定失败
//!
//! 等待表以消息编号为键，每个请求恰好以一次成功或一次失败结束。

use fingerlink_protocol::{FrameDecoder, Message, MessageKind, ProtocolError, encode_frame};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// 应答层参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckOptions {
    /// 首次发送之后的最大重发次数
    pub max_retries: u32,
    /// 单次等待应答的超时（毫秒）
    pub retry_timeout_ms: u64,
}

impl Default for AckOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_timeout_ms: 1000,
        }
    }
}

impl AckOptions {
    /// 从首次发送到判定超时的最短时间（毫秒）：`(max_retries + 1) * retry_timeout_ms`
    pub fn retry_window_ms(&self) -> u64 {
        (u64::from(self.max_retries) + 1).saturating_mul(self.retry_timeout_ms)
    }
}

/// 请求失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum AckFailure {
    /// 重试耗尽仍未收到应答
    Timeout { attempts: u32 },
    /// 对端以 ERROR 类别应答
    ErrorResponse(Message),
}

impl fmt::Display for AckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckFailure::Timeout { attempts } => {
                write!(f, "no response after {attempts} attempts")
            },
            AckFailure::ErrorResponse(msg) => write!(f, "error response: {msg}"),
        }
    }
}

/// 应答层产生的事件
#[derive(Debug, Clone, PartialEq)]
pub enum AckEvent {
    /// 请求收到 RESPONSE
    Acked { request: Message, response: Message },
    /// 请求失败（超时或 ERROR 应答）
    Failed { request: Message, failure: AckFailure },
    /// 不属于任何等待请求的消息（对端请求、迟到的应答等）
    Incoming(Message),
}

/// 一次 `feed` 的结果
#[derive(Debug, Default)]
pub struct FeedResult {
    pub events: Vec<AckEvent>,
    /// 解码失败的帧
    pub errors: Vec<ProtocolError>,
}

#[derive(Debug)]
struct Pending {
    request: Message,
    frame: Vec<u8>,
    sent_at: u64,
    retries: u32,
}

/// 应答状态机
#[derive(Debug)]
pub struct AckInterface {
    options: AckOptions,
    next_number: u16,
    pending: HashMap<u16, Pending>,
    decoder: FrameDecoder,
}

impl Default for AckInterface {
    fn default() -> Self {
        Self::new(AckOptions::default())
    }
}

impl AckInterface {
    pub fn new(options: AckOptions) -> Self {
        Self {
            options,
            next_number: 0,
            pending: HashMap::new(),
            decoder: FrameDecoder::new(),
        }
    }

    pub fn options(&self) -> AckOptions {
        self.options
    }

    /// 等待应答的请求数
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, number: u16) -> bool {
        self.pending.contains_key(&number)
    }

    /// 分配编号并编码
    ///
    /// # 参数
    /// - `message`: 待发送消息（原编号被覆盖）
    /// - `ack_required`: 是否登记到等待表
    /// - `now_ms`: 当前时间，作为首次发送时间
    ///
    /// 返回带编号的消息和完整帧。编号按 u16 回绕递增，跳过仍在等待中的编号。
    pub fn prepare(
        &mut self,
        mut message: Message,
        ack_required: bool,
        now_ms: u64,
    ) -> (Message, Vec<u8>) {
        let number = self.allocate_number();
        message.set_number(number);
        let frame = encode_frame(&message);

        if ack_required {
            self.pending.insert(
                number,
                Pending {
                    request: message.clone(),
                    frame: frame.clone(),
                    sent_at: now_ms,
                    retries: 0,
                },
            );
        }
        trace!("Prepared {} ({} bytes, ack={})", message, frame.len(), ack_required);
        (message, frame)
    }

    fn allocate_number(&mut self) -> u16 {
        loop {
            let number = self.next_number;
            self.next_number = self.next_number.wrapping_add(1);
            if !self.pending.contains_key(&number) {
                return number;
            }
        }
    }

    /// 解码收到的字节并匹配等待中的请求
    pub fn feed(&mut self, bytes: &[u8]) -> FeedResult {
        let mut result = FeedResult::default();
        if bytes.is_empty() {
            return result;
        }

        for decoded in self.decoder.push(bytes) {
            let msg = match decoded {
                Ok(msg) => msg,
                Err(e) => {
                    result.errors.push(e);
                    continue;
                },
            };

            let event = match msg.kind() {
                MessageKind::Request => AckEvent::Incoming(msg),
                MessageKind::Response | MessageKind::Error => match self.pending.remove(&msg.number()) {
                    Some(pending) if msg.kind() == MessageKind::Response => AckEvent::Acked {
                        request: pending.request,
                        response: msg,
                    },
                    Some(pending) => AckEvent::Failed {
                        request: pending.request,
                        failure: AckFailure::ErrorResponse(msg),
                    },
                    None => {
                        debug!("Unmatched {} (no pending request)", msg);
                        AckEvent::Incoming(msg)
                    },
                },
            };
            result.events.push(event);
        }
        result
    }

    /// 处理超时
    ///
    /// 返回 `(需要重发的帧, 失败事件)`。重发帧的发送时间按 `now_ms` 重新计时。
    pub fn poll_timeouts(&mut self, now_ms: u64) -> (Vec<Vec<u8>>, Vec<AckEvent>) {
        let mut retransmits = Vec::new();
        let mut expired = Vec::new();

        for (&number, pending) in self.pending.iter_mut() {
            if now_ms.saturating_sub(pending.sent_at) < self.options.retry_timeout_ms {
                continue;
            }
            if pending.retries < self.options.max_retries {
                pending.retries += 1;
                pending.sent_at = now_ms;
                debug!(
                    "Retransmitting #{} (retry {}/{})",
                    number, pending.retries, self.options.max_retries
                );
                retransmits.push(pending.frame.clone());
            } else {
                expired.push(number);
            }
        }

        // 按编号顺序上报，结果与 HashMap 遍历顺序无关
        expired.sort_unstable();
        let failures = expired
            .into_iter()
            .filter_map(|number| self.pending.remove(&number))
            .map(|pending| AckEvent::Failed {
                request: pending.request,
                failure: AckFailure::Timeout {
                    attempts: pending.retries + 1,
                },
            })
            .collect();

        (retransmits, failures)
    }

    /// 丢弃所有等待中的请求（不产生事件）
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}
