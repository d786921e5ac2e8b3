//! 链路监控
//!
//! 驱动主循环（含心跳），打印收到的消息与错误记录，直到 Ctrl+C。

use crate::session::{ReportCursor, install_ctrlc};
use anyhow::Result;
use clap::Args;
use fingerlink_client::AppContext;
use std::sync::atomic::Ordering;
use std::thread;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 同时打印发送的消息
    #[arg(long)]
    pub show_sent: bool,
}

impl MonitorCommand {
    pub fn execute(&self, ctx: &AppContext) -> Result<()> {
        let running = install_ctrlc()?;

        ctx.com().add_receive_listener(|msg| println!("RX {msg}"));
        if self.show_sent {
            ctx.com().add_send_listener(|msg| println!("TX {msg}"));
        }

        println!("📊 监控中，按 Ctrl+C 停止\n");
        let interval = ctx.com().config().poll_interval();
        let mut reports = ReportCursor::default();
        while running.load(Ordering::SeqCst) {
            ctx.tick();
            reports.flush(ctx);
            thread::sleep(interval);
        }

        println!("✅ 监控已结束（{} 条消息）", ctx.get_message_history().len());
        Ok(())
    }
}
