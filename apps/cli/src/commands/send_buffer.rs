//! 缓冲区下发命令

use crate::session::ReportCursor;
use anyhow::{Result, bail};
use clap::Args;
use fingerlink_client::{AppContext, BufferOutcome, calculate_command_groups};
use std::path::PathBuf;
use std::thread;

/// 缓冲区下发参数
#[derive(Args, Debug)]
pub struct SendBufferCommand {
    /// 指令文件（每行 `angle0,angle1`）
    #[arg(short, long)]
    pub file: PathBuf,

    /// 在工作线程中发送，主线程继续驱动主循环
    #[arg(long = "async")]
    pub run_async: bool,

    /// 只显示分组，不发送
    #[arg(long)]
    pub dry_run: bool,
}

impl SendBufferCommand {
    pub fn execute(&self, ctx: &AppContext) -> Result<()> {
        let count = ctx.load_buffer_from_file(&self.file)?;
        println!("📄 已加载 {} 条指令", count);

        let buffer = ctx.get_buffer();
        for (idx, group) in calculate_command_groups(&buffer).iter().enumerate() {
            println!("Group {}:", idx + 1);
            for msg in group.iter() {
                println!("  {msg}");
            }
        }
        if self.dry_run {
            return Ok(());
        }

        ctx.add_callback_on_send(|msg| println!("→ {msg}"));
        let outcome = if self.run_async {
            let handle = ctx.send_buffer_async()?;
            let interval = ctx.com().config().poll_interval();
            while !handle.is_finished() {
                ctx.tick();
                thread::sleep(interval);
            }
            match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => bail!("Buffer worker panicked"),
            }
        } else {
            ctx.send_buffer()
        };

        ReportCursor::default().flush(ctx);
        match outcome {
            BufferOutcome::Executed => {
                println!("✅ 已下发并开始执行");
                Ok(())
            },
            other => bail!("Buffer was not executed ({other:?})"),
        }
    }
}
