//! 遥测订阅命令

use crate::session::{ReportCursor, drain, install_ctrlc};
use anyhow::Result;
use clap::Args;
use fingerlink_client::AppContext;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

/// 遥测订阅参数
#[derive(Args, Debug)]
pub struct StreamCommand {
    /// 关节编号
    #[arg(short, long, default_value_t = 0)]
    pub joint: u8,

    /// 采样频率（Hz）
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u8,

    /// 持续时间（秒）
    #[arg(short, long, default_value_t = 5)]
    pub duration_secs: u64,
}

impl StreamCommand {
    pub fn execute(&self, ctx: &AppContext) -> Result<()> {
        let running = install_ctrlc()?;
        ctx.enable_sensor_datastream(self.joint, self.frequency);
        println!(
            "📈 关节 {} @ {} Hz，持续 {} 秒",
            self.joint, self.frequency, self.duration_secs
        );

        let interval = ctx.com().config().poll_interval();
        let deadline = Instant::now() + Duration::from_secs(self.duration_secs);
        let mut reports = ReportCursor::default();
        let mut last_printed = None;
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            ctx.tick();
            reports.flush(ctx);
            let latest = ctx
                .get_datastream(self.joint)
                .and_then(|stream| stream.latest().copied());
            if let Some(snapshot) = latest.filter(|s| last_printed != Some(s.timestamp_ms)) {
                println!("{:>10} ms  position={:.4}", snapshot.timestamp_ms, snapshot.motor_position);
                last_printed = Some(snapshot.timestamp_ms);
            }
            thread::sleep(interval);
        }

        ctx.disable_sensor_datastream(self.joint)?;
        drain(ctx, ctx.com().config().ack_wait_timeout());
        reports.flush(ctx);
        Ok(())
    }
}
