//! 客户端集成测试公共设施

#![allow(dead_code)]

pub mod mock_mcu;

use fingerlink_client::AppContext;
use fingerlink_driver::{ComConfig, McuComBuilder};
use mock_mcu::MockMcu;

/// 快速失败的测试配置：不重发，50 ms 超时，无心跳
pub fn fast_config() -> ComConfig {
    ComConfig {
        max_retries: 0,
        retry_timeout_ms: 50,
        heartbeat_enabled: false,
        poll_interval_ms: 1,
        ack_wait_timeout_ms: 1000,
        zero_done_timeout_ms: 500,
        ..ComConfig::default()
    }
}

/// 以 MockMcu 为对端构造上下文
pub fn setup(mcu: &MockMcu) -> AppContext {
    setup_with(mcu, fast_config())
}

pub fn setup_with(mcu: &MockMcu, config: ComConfig) -> AppContext {
    let com = McuComBuilder::new()
        .config(config)
        .channel(mcu.channel().clone())
        .build()
        .expect("build McuCom");
    AppContext::new(com)
}
