//! 遥测订阅与快照存储
//!
//! 每个关节最多一个活动订阅。`SensorDatastream` 事件由 [`McuCom`] 分发到对应订阅，
//! 未订阅关节的数据记录 WARNING 后丢弃。

use crate::error::ClientError;
use fingerlink_driver::{AckHandlers, ErrorReporter, McuCom};
use fingerlink_protocol::{
    ID_SENSOR_DATASTREAM, Message, MessageKind, create_start_sensor_datastream,
    create_stop_sensor_datastream,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 超过该长度时裁剪
pub const SNAPSHOT_TRIM_THRESHOLD: usize = 100;
/// 裁剪后保留的最新快照数
pub const SNAPSHOT_KEEP: usize = 50;

/// 单次传感器采样
///
/// 当前固件只上报一个浮点值，作为电机位置保存，其余字段为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    /// 主机接收时间（毫秒）
    pub timestamp_ms: u64,
    pub motor_position: f32,
    pub motor_velocity: Option<f32>,
    pub motor_temperature: Option<f32>,
    pub joint_angle: Option<f32>,
}

/// 单个关节的订阅
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDatastream {
    pub joint: u8,
    pub frequency: u8,
    snapshots: Vec<SensorSnapshot>,
}

impl SensorDatastream {
    pub fn new(joint: u8, frequency: u8) -> Self {
        Self {
            joint,
            frequency,
            snapshots: Vec::new(),
        }
    }

    /// 追加快照；长度超过 100 时只保留最新 50 条
    pub fn push(&mut self, snapshot: SensorSnapshot) {
        self.snapshots.push(snapshot);
        if self.snapshots.len() > SNAPSHOT_TRIM_THRESHOLD {
            let excess = self.snapshots.len() - SNAPSHOT_KEEP;
            self.snapshots.drain(..excess);
        }
    }

    /// 按接收顺序排列的快照
    pub fn snapshots(&self) -> &[SensorSnapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&SensorSnapshot> {
        self.snapshots.last()
    }
}

/// 遥测存储
pub struct Telemetry {
    com: Arc<McuCom>,
    reporter: Arc<ErrorReporter>,
    streams: Arc<RwLock<BTreeMap<u8, SensorDatastream>>>,
}

impl Telemetry {
    /// 创建存储，并在 `com` 上注册 `SensorDatastream` 处理函数
    pub fn new(com: Arc<McuCom>) -> Self {
        let streams: Arc<RwLock<BTreeMap<u8, SensorDatastream>>> = Arc::default();
        let reporter = Arc::clone(com.reporter());

        {
            let streams = Arc::clone(&streams);
            let reporter = Arc::clone(&reporter);
            let clock = Arc::clone(com.clock());
            com.add_handler(ID_SENSOR_DATASTREAM, move |msg| {
                match push_sample(&streams, clock.now_ms(), msg) {
                    Ok(()) => {},
                    Err(ClientError::UnknownJoint(joint)) => {
                        reporter.warning(format!("Datastream for inactive joint {joint} dropped"));
                    },
                    Err(e) => reporter.warning(format!("Malformed SensorDatastream: {e}")),
                }
            });
        }

        Self {
            com,
            reporter,
            streams,
        }
    }

    /// 订阅关节数据流
    ///
    /// 本地订阅立即生效；请求未被确认时只记录 WARNING，订阅保留。
    /// 已订阅的关节会更新频率并重发请求。
    pub fn enable(&self, joint: u8, frequency: u8) {
        {
            let mut streams = self.streams.write();
            match streams.get_mut(&joint) {
                Some(stream) => {
                    debug!("Joint {} datastream frequency {} -> {}", joint, stream.frequency, frequency);
                    stream.frequency = frequency;
                },
                None => {
                    streams.insert(joint, SensorDatastream::new(joint, frequency));
                },
            }
        }

        let reporter = Arc::clone(&self.reporter);
        let handlers = AckHandlers::new().on_failure(move |_, failure| {
            reporter.warning(format!("Enabling datastream for joint {joint} failed: {failure}"));
        });
        let request = create_start_sensor_datastream(MessageKind::Request, joint, frequency);
        // 需要应答的发送只会通过 handlers 报告失败
        let _ = self.com.send(request, true, handlers);
        info!("Datastream enabled for joint {} at {} Hz", joint, frequency);
    }

    /// 取消订阅
    ///
    /// 无论 MCU 是否确认，本地订阅都会被移除。
    ///
    /// # 错误
    /// - `ClientError::UnknownJoint`: 该关节没有活动订阅（不发送任何消息）
    pub fn disable(&self, joint: u8) -> Result<(), ClientError> {
        if self.streams.write().remove(&joint).is_none() {
            let err = ClientError::UnknownJoint(joint);
            self.reporter.warning(format!("Cannot disable datastream: {err}"));
            return Err(err);
        }

        let reporter = Arc::clone(&self.reporter);
        let handlers = AckHandlers::new().on_failure(move |_, failure| {
            reporter.warning(format!("Disabling datastream for joint {joint} failed: {failure}"));
        });
        let _ = self
            .com
            .send(create_stop_sensor_datastream(MessageKind::Request, joint), true, handlers);
        info!("Datastream disabled for joint {}", joint);
        Ok(())
    }

    pub fn is_active(&self, joint: u8) -> bool {
        self.streams.read().contains_key(&joint)
    }

    /// 订阅快照（副本）
    pub fn get_datastream(&self, joint: u8) -> Option<SensorDatastream> {
        self.streams.read().get(&joint).cloned()
    }

    /// 活动关节，升序
    pub fn active_joints(&self) -> Vec<u8> {
        self.streams.read().keys().copied().collect()
    }
}

fn push_sample(
    streams: &RwLock<BTreeMap<u8, SensorDatastream>>,
    timestamp_ms: u64,
    message: &Message,
) -> Result<(), ClientError> {
    let joint = message.get_u8("sensor_id")?;
    let data = message.get_f32("data")?;
    let mut streams = streams.write();
    let stream = streams.get_mut(&joint).ok_or(ClientError::UnknownJoint(joint))?;
    stream.push(SensorSnapshot {
        timestamp_ms,
        motor_position: data,
        ..SensorSnapshot::default()
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(i: u64) -> SensorSnapshot {
        SensorSnapshot {
            timestamp_ms: i,
            motor_position: i as f32,
            ..SensorSnapshot::default()
        }
    }

    #[test]
    fn test_push_trims_to_most_recent() {
        let mut stream = SensorDatastream::new(0, 50);
        for i in 0..100 {
            stream.push(snapshot(i));
        }
        assert_eq!(stream.snapshots().len(), 100);

        stream.push(snapshot(100));
        assert_eq!(stream.snapshots().len(), SNAPSHOT_KEEP);
        assert_eq!(stream.snapshots()[0].timestamp_ms, 51);
        assert_eq!(stream.latest().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn test_length_never_exceeds_threshold() {
        let mut stream = SensorDatastream::new(1, 10);
        for i in 0..1000 {
            stream.push(snapshot(i));
            assert!(stream.snapshots().len() <= SNAPSHOT_TRIM_THRESHOLD);
        }
    }
}
