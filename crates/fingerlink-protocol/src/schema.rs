//! 消息原型（Prototype）与注册表
//!
//! 原型描述一种消息的 ID 和有序字段列表。注册表在进程启动时构建一次，
//! 之后只读；所有 [`Message`](crate::Message) 都借用注册表中的原型（`'static`）。

use crate::ProtocolError;
use crate::ids::*;
use std::sync::OnceLock;

/// 字段基本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    Uint8,
    Int8,
    Uint32,
    Float,
    Bool,
}

impl FieldType {
    /// 编码后的字节数
    pub const fn size(self) -> usize {
        match self {
            FieldType::Uint8 | FieldType::Int8 | FieldType::Bool => 1,
            FieldType::Uint32 | FieldType::Float => 4,
        }
    }

    /// 固件侧的类型名（UINT8 / INT8 / ...）
    pub const fn wire_name(self) -> &'static str {
        match self {
            FieldType::Uint8 => "UINT8",
            FieldType::Int8 => "INT8",
            FieldType::Uint32 => "UINT32",
            FieldType::Float => "FLOAT",
            FieldType::Bool => "BOOL",
        }
    }
}

/// 单个字段声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

/// 消息原型
///
/// 字段顺序即编码顺序。构建完成后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePrototype {
    id: u8,
    name: &'static str,
    fields: Vec<FieldSpec>,
}

impl MessagePrototype {
    pub fn new(id: u8, name: &'static str) -> Self {
        Self {
            id,
            name,
            fields: Vec::new(),
        }
    }

    /// 追加字段（链式构造）
    pub fn with_field(mut self, name: &'static str, ty: FieldType) -> Self {
        self.fields.push(FieldSpec { name, ty });
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// 查找字段下标
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// 负载总字节数
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size()).sum()
    }
}

/// 原型注册表
///
/// ID 唯一，按 ID 升序保存。
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    prototypes: Vec<MessagePrototype>,
}

static STANDARD_REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

impl SchemaRegistry {
    /// 由原型列表构建注册表
    ///
    /// # 错误
    /// - `ProtocolError::DuplicateMessageId`: 存在重复 ID
    pub fn new(mut prototypes: Vec<MessagePrototype>) -> Result<Self, ProtocolError> {
        prototypes.sort_by_key(|p| p.id);
        if let Some(pair) = prototypes.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(ProtocolError::DuplicateMessageId { id: pair[0].id });
        }
        Ok(Self { prototypes })
    }

    /// 固件协议的标准注册表（进程内只构建一次）
    pub fn standard() -> &'static SchemaRegistry {
        STANDARD_REGISTRY.get_or_init(|| Self {
            prototypes: standard_prototypes(),
        })
    }

    /// 按 ID 查找原型
    ///
    /// # 错误
    /// - `ProtocolError::UnknownMessageId`: 注册表中无此 ID
    pub fn prototype_for(&self, id: u8) -> Result<&MessagePrototype, ProtocolError> {
        self.prototypes
            .binary_search_by_key(&id, |p| p.id)
            .map(|idx| &self.prototypes[idx])
            .map_err(|_| ProtocolError::UnknownMessageId { id })
    }

    /// 全部原型（按 ID 升序）
    pub fn all_prototypes(&self) -> &[MessagePrototype] {
        &self.prototypes
    }

    /// 全部 ID（按升序）
    pub fn all_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.prototypes.iter().map(|p| p.id)
    }
}

/// 在标准注册表中查找原型
pub fn prototype_for(id: u8) -> Result<&'static MessagePrototype, ProtocolError> {
    SchemaRegistry::standard().prototype_for(id)
}

/// 标准注册表中的全部原型
pub fn all_prototypes() -> &'static [MessagePrototype] {
    SchemaRegistry::standard().all_prototypes()
}

/// 标准注册表内的原型（已知 ID，查找不会失败）
pub(crate) fn standard_prototype(id: u8) -> &'static MessagePrototype {
    let registry = SchemaRegistry::standard();
    let idx = registry
        .prototypes
        .binary_search_by_key(&id, |p| p.id)
        .unwrap_or_else(|_| unreachable!("standard prototype {id} missing"));
    &registry.prototypes[idx]
}

fn standard_prototypes() -> Vec<MessagePrototype> {
    use FieldType::*;

    vec![
        MessagePrototype::new(ID_HEARTBEAT, "Heartbeat").with_field("rand", Int8),
        MessagePrototype::new(ID_MOTOR_CONTROL, "MotorControl")
            .with_field("motor_id", Uint8)
            .with_field("control_mode", Uint8)
            .with_field("control_value", Float)
            .with_field("simultaneous", Bool),
        MessagePrototype::new(ID_MOTOR_EVENT, "MotorEvent")
            .with_field("motor_id", Uint8)
            .with_field("success", Bool)
            .with_field("event_type", Uint8)
            .with_field("event_value", Float)
            .with_field("num_in_queue", Uint8)
            .with_field("executed_with_count", Uint8),
        MessagePrototype::new(ID_CONTROL_GO, "ControlGo").with_field("rand", Int8),
        MessagePrototype::new(ID_CONTROL_DONE, "ControlDone")
            .with_field("success", Bool)
            .with_field("time", Uint32)
            .with_field("executed", Uint8),
        MessagePrototype::new(ID_START_SENSOR_DATASTREAM, "StartSensorDatastream")
            .with_field("sensor_id", Uint8)
            .with_field("frequency", Uint8),
        MessagePrototype::new(ID_SENSOR_DATASTREAM, "SensorDatastream")
            .with_field("sensor_id", Uint8)
            .with_field("data", Float),
        MessagePrototype::new(ID_STOP_SENSOR_DATASTREAM, "StopSensorDatastream")
            .with_field("sensor_id", Uint8),
        MessagePrototype::new(ID_CLEAR_CONTROL_QUEUE, "ClearControlQueue")
            .with_field("rand", Int8),
        MessagePrototype::new(ID_ERROR_MESSAGE, "ErrorMessage").with_field("error_code", Uint8),
        MessagePrototype::new(ID_STOP, "Stop").with_field("rand", Int8),
        MessagePrototype::new(ID_ZERO_COMMAND, "ZeroCommand").with_field("success", Bool),
        MessagePrototype::new(ID_ZERO_DONE, "ZeroDone").with_field("success", Bool),
    ]
}
