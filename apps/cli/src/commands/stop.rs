//! 急停命令

use crate::session::{ReportCursor, drain};
use anyhow::Result;
use clap::Args;
use fingerlink_client::AppContext;

/// 急停命令参数
#[derive(Args, Debug)]
pub struct StopCommand {}

impl StopCommand {
    /// 发送 Stop 并等待应答
    pub fn execute(&self, ctx: &AppContext) -> Result<()> {
        println!("🛑 发送急停命令...");
        let number = ctx.com().stop();
        drain(ctx, ctx.com().config().ack_wait_timeout());
        ReportCursor::default().flush(ctx);
        println!("✅ Stop #{number} 已处理");
        Ok(())
    }
}
