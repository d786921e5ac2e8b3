//! 帧编码与流式解码
//!
//! 帧格式：
//!
//! ```text
//! | 0xAA | kind | number (u16 LE) | id | len | payload (len 字节) | xor |
//! ```
//!
//! 校验和为 `kind..payload` 所有字节的异或。负载按原型字段顺序依次编码，
//! 基本类型一律小端，`BOOL` 占 1 字节。

use crate::ProtocolError;
use crate::message::{FieldValue, Message, MessageKind};
use crate::schema::{FieldType, SchemaRegistry};
use bytes::{Buf, BufMut, BytesMut};

/// 帧同步字节
pub const SYNC_BYTE: u8 = 0xAA;

/// sync + kind + number(2) + id + len
const HEADER_LEN: usize = 6;

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// 将消息编码为完整帧
pub fn encode_frame(msg: &Message) -> Vec<u8> {
    let payload_len = msg.prototype().payload_len();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_len + 1);

    buf.put_u8(SYNC_BYTE);
    buf.put_u8(msg.kind().into());
    buf.put_u16_le(msg.number());
    buf.put_u8(msg.id());
    // 原型负载最长不超过十几个字节
    buf.put_u8(payload_len as u8);

    for value in msg.values() {
        match *value {
            FieldValue::Uint8(v) => buf.put_u8(v),
            FieldValue::Int8(v) => buf.put_i8(v),
            FieldValue::Uint32(v) => buf.put_u32_le(v),
            FieldValue::Float(v) => buf.put_f32_le(v),
            FieldValue::Bool(v) => buf.put_u8(v as u8),
        }
    }

    let cs = checksum(&buf[1..]);
    buf.put_u8(cs);
    buf.to_vec()
}

/// 流式帧解码器
///
/// 字节可以任意切分后多次 [`push`](FrameDecoder::push)；不完整的帧保留在内部缓冲，
/// 直到后续字节到达。同步字节之前的垃圾数据被静默丢弃，校验失败时丢弃一个字节
/// 后重新寻找同步字节。头部的长度字节与已知 ID 的负载长度不符时立即按同样方式
/// 重新同步，不等待该长度的字节到齐。
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    registry: &'static SchemaRegistry,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// 使用标准注册表
    pub fn new() -> Self {
        Self::with_registry(SchemaRegistry::standard())
    }

    pub fn with_registry(registry: &'static SchemaRegistry) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            registry,
        }
    }

    /// 当前缓冲中尚未组成完整帧的字节数
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// 丢弃缓冲中的残余字节
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// 追加字节并取出所有完整帧
    ///
    /// 每个完整帧产生一个结果：解码成功的消息，或该帧的解码错误
    /// （校验失败、未知 ID、长度不符等）。错误帧不会影响后续帧。
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Message, ProtocolError>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            match self.buf.iter().position(|&b| b == SYNC_BYTE) {
                Some(0) => {},
                Some(skip) => self.buf.advance(skip),
                None => {
                    self.buf.clear();
                    break;
                },
            }

            if self.buf.len() < HEADER_LEN {
                break;
            }
            let (id, len) = (self.buf[4], self.buf[5] as usize);
            if let Ok(prototype) = self.registry.prototype_for(id) {
                if prototype.payload_len() != len {
                    self.buf.advance(1);
                    out.push(Err(ProtocolError::InvalidLength {
                        id,
                        expected: prototype.payload_len(),
                        actual: len,
                    }));
                    continue;
                }
            }
            let frame_len = HEADER_LEN + len + 1;
            if self.buf.len() < frame_len {
                break;
            }

            let expected = checksum(&self.buf[1..frame_len - 1]);
            let actual = self.buf[frame_len - 1];
            if expected != actual {
                self.buf.advance(1);
                out.push(Err(ProtocolError::ChecksumMismatch { expected, actual }));
                continue;
            }

            let frame = self.buf.split_to(frame_len);
            out.push(self.decode_frame(&frame));
        }

        out
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<Message, ProtocolError> {
        let registry: &'static SchemaRegistry = self.registry;

        let kind = MessageKind::try_from(frame[1]).map_err(|_| ProtocolError::InvalidKind(frame[1]))?;
        let number = u16::from_le_bytes([frame[2], frame[3]]);
        let id = frame[4];
        let prototype = registry.prototype_for(id)?;

        let mut payload = &frame[HEADER_LEN..frame.len() - 1];
        if payload.len() != prototype.payload_len() {
            return Err(ProtocolError::InvalidLength {
                id,
                expected: prototype.payload_len(),
                actual: payload.len(),
            });
        }

        let values = prototype
            .fields()
            .iter()
            .map(|spec| match spec.ty {
                FieldType::Uint8 => FieldValue::Uint8(payload.get_u8()),
                FieldType::Int8 => FieldValue::Int8(payload.get_i8()),
                FieldType::Uint32 => FieldValue::Uint32(payload.get_u32_le()),
                FieldType::Float => FieldValue::Float(payload.get_f32_le()),
                FieldType::Bool => FieldValue::Bool(payload.get_u8() != 0),
            })
            .collect();

        let mut msg = Message::new(kind, prototype, values)?;
        msg.set_number(number);
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::*;

    fn heartbeat(number: u16, rand: i8) -> Message {
        let mut msg = create_heartbeat(MessageKind::Request, rand);
        msg.set_number(number);
        msg
    }

    #[test]
    fn test_encode_heartbeat_layout() {
        let bytes = encode_frame(&heartbeat(0x0102, 5));
        assert_eq!(bytes, vec![0xAA, 0x00, 0x02, 0x01, 0x00, 0x01, 0x05, 0x07]);
    }

    #[test]
    fn test_decode_single_frame() {
        let mut msg = create_motor_control(MessageKind::Request, 1, 2, -1.25, true);
        msg.set_number(300);
        let mut decoder = FrameDecoder::new();
        let out = decoder.push(&encode_frame(&msg));
        assert_eq!(out, vec![Ok(msg)]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_decode_byte_by_byte() {
        let msg = heartbeat(9, -3);
        let bytes = encode_frame(&msg);
        let mut decoder = FrameDecoder::new();
        for b in &bytes[..bytes.len() - 1] {
            assert!(decoder.push(&[*b]).is_empty());
        }
        assert_eq!(decoder.push(&bytes[bytes.len() - 1..]), vec![Ok(msg)]);
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let msg = heartbeat(1, 1);
        let mut bytes = vec![0x00, 0x13, 0x37];
        bytes.extend(encode_frame(&msg));
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&bytes), vec![Ok(msg)]);
    }

    #[test]
    fn test_resync_after_bad_checksum() {
        let mut corrupt = encode_frame(&heartbeat(1, 5));
        corrupt[6] = 0x06;
        let good = heartbeat(2, 7);

        let mut bytes = corrupt;
        bytes.extend(encode_frame(&good));

        let mut decoder = FrameDecoder::new();
        let out = decoder.push(&bytes);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(ProtocolError::ChecksumMismatch { .. })));
        assert_eq!(out[1], Ok(good));
    }

    #[test]
    fn test_unknown_id_frame_is_reported() {
        // kind=0, number=0, id=99, len=0
        let body = [0x00, 0x00, 0x00, 99, 0x00];
        let mut bytes = vec![SYNC_BYTE];
        bytes.extend_from_slice(&body);
        bytes.push(checksum(&body));

        let mut decoder = FrameDecoder::new();
        let out = decoder.push(&bytes);
        assert_eq!(out, vec![Err(ProtocolError::UnknownMessageId { id: 99 })]);
    }

    #[test]
    fn test_invalid_kind_and_length() {
        let body = [0x07, 0x00, 0x00, 0x00, 0x01, 0x05];
        let mut bytes = vec![SYNC_BYTE];
        bytes.extend_from_slice(&body);
        bytes.push(checksum(&body));
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&bytes), vec![Err(ProtocolError::InvalidKind(7))]);

        // Heartbeat 需要 1 字节负载，这里给 2 字节
        let body = [0x00, 0x00, 0x00, 0x00, 0x02, 0x05, 0x05];
        let mut bytes = vec![SYNC_BYTE];
        bytes.extend_from_slice(&body);
        bytes.push(checksum(&body));
        assert_eq!(
            decoder.push(&bytes),
            vec![Err(ProtocolError::InvalidLength {
                id: 0,
                expected: 1,
                actual: 2
            })]
        );
    }

    #[test]
    fn test_corrupt_length_does_not_stall_following_frames() {
        let mut corrupt = encode_frame(&heartbeat(1, 5));
        corrupt[5] = 200;
        let good = heartbeat(2, 7);

        let mut bytes = corrupt;
        bytes.extend(encode_frame(&good));

        let mut decoder = FrameDecoder::new();
        let out = decoder.push(&bytes);
        assert_eq!(
            out,
            vec![
                Err(ProtocolError::InvalidLength {
                    id: 0,
                    expected: 1,
                    actual: 200
                }),
                Ok(good)
            ]
        );
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let bytes = encode_frame(&heartbeat(1, 1));
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes[..3]);
        assert_eq!(decoder.buffered_len(), 3);
        decoder.reset();
        assert_eq!(decoder.buffered_len(), 0);
    }
}
