//! 回零命令

use crate::session::ReportCursor;
use anyhow::{Result, bail};
use clap::Args;
use fingerlink_client::{AppContext, BufferOutcome};

#[derive(Args, Debug)]
pub struct ZeroCommand {}

impl ZeroCommand {
    /// 阻塞直到 ZeroDone 或超时
    pub fn execute(&self, ctx: &AppContext) -> Result<()> {
        println!("⏳ 回零中...");
        let outcome = ctx.buffer().zero();
        ReportCursor::default().flush(ctx);
        match outcome {
            BufferOutcome::Zeroed => {
                println!("✅ 回零完成");
                Ok(())
            },
            other => bail!("Zeroing did not complete ({other:?})"),
        }
    }
}
