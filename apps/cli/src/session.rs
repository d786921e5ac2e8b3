//! 连接参数与主循环辅助函数

use anyhow::{Context, Result};
use clap::Args;
use fingerlink_client::AppContext;
use fingerlink_driver::ComConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// 全局连接参数（命令行优先于配置文件）
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// 串口设备
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// TOML 配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// 合并配置文件与命令行参数
    pub fn resolve(&self) -> Result<ComConfig> {
        let mut config = match &self.config {
            Some(path) => ComConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ComConfig::default(),
        };
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        Ok(config)
    }

    /// 打开串口并创建上下文
    pub fn connect(&self) -> Result<AppContext> {
        let config = self.resolve()?;
        println!("🔌 {} @ {} baud", config.port, config.baud_rate);
        let ctx = AppContext::from_config(config)?;
        if !ctx.com().channel().is_open() {
            println!("⚠️  串口未打开，发送将失败");
        }
        Ok(ctx)
    }
}

/// 注册 Ctrl+C，返回运行标志
pub fn install_ctrlc() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\n收到退出信号，正在关闭...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;
    Ok(running)
}

/// 逐条打印错误报告器中的新记录
#[derive(Debug, Default)]
pub struct ReportCursor {
    seen: usize,
}

impl ReportCursor {
    pub fn flush(&mut self, ctx: &AppContext) {
        let records = ctx.reporter().records();
        for record in records.iter().skip(self.seen) {
            println!("[{}] {}", record.severity, record.message);
        }
        self.seen = records.len();
    }
}

/// 驱动主循环直到没有等待应答的请求（或超时）
pub fn drain(ctx: &AppContext, timeout: Duration) {
    let config = ctx.com().config();
    let deadline = Instant::now() + timeout;
    while ctx.com().pending_count() > 0 && Instant::now() < deadline {
        ctx.tick();
        thread::sleep(config.poll_interval());
    }
    if ctx.com().pending_count() > 0 {
        info!("{} request(s) still pending", ctx.com().pending_count());
    }
}
