//! 消息实例
//!
//! [`Message`] 是某个原型的具体实例：类别（REQUEST / RESPONSE / ERROR）、
//! 由应答层分配的消息编号，以及与原型字段一一对应的取值。

use crate::ProtocolError;
use crate::schema::{FieldType, MessagePrototype};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 消息类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MessageKind {
    Request = 0,
    Response = 1,
    Error = 2,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Response => "RESPONSE",
            MessageKind::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// 字段取值
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Uint8(u8),
    Int8(i8),
    Uint32(u32),
    Float(f32),
    Bool(bool),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Uint8(_) => FieldType::Uint8,
            FieldValue::Int8(_) => FieldType::Int8,
            FieldValue::Uint32(_) => FieldType::Uint32,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Bool(_) => FieldType::Bool,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Uint8(v) => write!(f, "{v}"),
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::Uint32(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Uint8(v)
    }
}

impl From<i8> for FieldValue {
    fn from(v: i8) -> Self {
        FieldValue::Int8(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Uint32(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// 协议消息
///
/// 构造时即校验字段数量与类型，不存在"部分构造"的消息。
/// 创建后只读，唯一例外是应答层通过 [`Message::set_number`] 分配编号。
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: MessageKind,
    number: u16,
    prototype: &'static MessagePrototype,
    values: Vec<FieldValue>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("读取 `", stringify!($ty), "` 类型字段")]
        pub fn $fn_name(&self, field: &str) -> Result<$ty, ProtocolError> {
            match self.get(field)? {
                FieldValue::$variant(v) => Ok(v),
                other => Err(ProtocolError::FieldTypeMismatch {
                    field: field.to_string(),
                    expected: FieldType::$variant,
                    actual: other.field_type(),
                }),
            }
        }
    };
}

impl Message {
    /// 创建消息
    ///
    /// # 错误
    /// - `FieldCount`: 取值数量与原型字段数不一致
    /// - `FieldTypeMismatch`: 某个取值类型与原型声明不一致
    pub fn new(
        kind: MessageKind,
        prototype: &'static MessagePrototype,
        values: Vec<FieldValue>,
    ) -> Result<Self, ProtocolError> {
        let fields = prototype.fields();
        if fields.len() != values.len() {
            return Err(ProtocolError::FieldCount {
                id: prototype.id(),
                expected: fields.len(),
                actual: values.len(),
            });
        }
        for (spec, value) in fields.iter().zip(values.iter()) {
            if spec.ty != value.field_type() {
                return Err(ProtocolError::FieldTypeMismatch {
                    field: spec.name.to_string(),
                    expected: spec.ty,
                    actual: value.field_type(),
                });
            }
        }
        Ok(Self {
            kind,
            number: 0,
            prototype,
            values,
        })
    }

    /// 工厂函数专用：取值已按原型排列，仅在 debug 构建下校验
    pub(crate) fn from_factory(
        kind: MessageKind,
        prototype: &'static MessagePrototype,
        values: Vec<FieldValue>,
    ) -> Self {
        debug_assert!(
            prototype
                .fields()
                .iter()
                .map(|f| f.ty)
                .eq(values.iter().map(FieldValue::field_type)),
            "factory values do not match prototype {}",
            prototype.name()
        );
        Self {
            kind,
            number: 0,
            prototype,
            values,
        }
    }

    /// 针对 `request` 构造应答（沿用请求的编号）
    pub fn response_to(
        request: &Message,
        kind: MessageKind,
        prototype: &'static MessagePrototype,
        values: Vec<FieldValue>,
    ) -> Result<Self, ProtocolError> {
        let mut msg = Self::new(kind, prototype, values)?;
        msg.number = request.number;
        Ok(msg)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// 消息编号（未发送前为 0）
    pub fn number(&self) -> u16 {
        self.number
    }

    /// 由应答层在发送时调用
    pub fn set_number(&mut self, number: u16) {
        self.number = number;
    }

    /// 原型 ID
    pub fn id(&self) -> u8 {
        self.prototype.id()
    }

    pub fn prototype(&self) -> &'static MessagePrototype {
        self.prototype
    }

    /// 按原型字段顺序排列的取值
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// 读取字段
    ///
    /// # 错误
    /// - `UnknownField`: 原型中无此字段
    pub fn get(&self, field: &str) -> Result<FieldValue, ProtocolError> {
        self.prototype
            .field_index(field)
            .map(|idx| self.values[idx])
            .ok_or_else(|| ProtocolError::UnknownField {
                id: self.prototype.id(),
                field: field.to_string(),
            })
    }

    typed_getter!(get_u8, Uint8, u8);
    typed_getter!(get_i8, Int8, i8);
    typed_getter!(get_u32, Uint32, u32);
    typed_getter!(get_f32, Float, f32);
    typed_getter!(get_bool, Bool, bool);
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} [{}]",
            self.prototype.name(),
            self.number,
            self.kind
        )?;
        for (spec, value) in self.prototype.fields().iter().zip(self.values.iter()) {
            write!(f, " {}={}", spec.name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::*;
    use crate::schema::prototype_for;

    fn heartbeat_proto() -> &'static MessagePrototype {
        prototype_for(ID_HEARTBEAT).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_count() {
        let err = Message::new(MessageKind::Request, heartbeat_proto(), vec![]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldCount {
                id: ID_HEARTBEAT,
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_new_rejects_wrong_type() {
        let err = Message::new(
            MessageKind::Request,
            heartbeat_proto(),
            vec![FieldValue::Uint8(3)],
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::FieldTypeMismatch { .. }));
    }

    #[test]
    fn test_typed_getters() {
        let msg = Message::new(
            MessageKind::Request,
            heartbeat_proto(),
            vec![FieldValue::Int8(-7)],
        )
        .unwrap();
        assert_eq!(msg.get_i8("rand").unwrap(), -7);
        assert!(matches!(
            msg.get_u8("rand"),
            Err(ProtocolError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            msg.get("nope"),
            Err(ProtocolError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_response_keeps_number() {
        let mut req = Message::new(
            MessageKind::Request,
            heartbeat_proto(),
            vec![FieldValue::Int8(1)],
        )
        .unwrap();
        req.set_number(77);
        let resp = Message::response_to(
            &req,
            MessageKind::Response,
            heartbeat_proto(),
            vec![FieldValue::Int8(1)],
        )
        .unwrap();
        assert_eq!(resp.number(), 77);
        assert_eq!(resp.kind(), MessageKind::Response);
    }

    #[test]
    fn test_display() {
        let msg = Message::new(
            MessageKind::Request,
            heartbeat_proto(),
            vec![FieldValue::Int8(5)],
        )
        .unwrap();
        assert_eq!(msg.to_string(), "Heartbeat#0 [REQUEST] rand=5");
    }
}
