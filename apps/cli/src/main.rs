//! # Fingerlink CLI
//!
//! Command-line interface for the fingerlink MCU link.
//!
//! 每个命令独立执行：读取配置 -> 打开串口 -> 驱动主循环完成操作 -> 退出。
//!
//! ```bash
//! # 查看消息原型
//! fingerlink-cli schema
//!
//! # 监控（心跳 + 收包），Ctrl+C 退出
//! fingerlink-cli --port /dev/ttyACM0 monitor
//!
//! # 加载轨迹并下发
//! fingerlink-cli --config finger.toml send-buffer --file trajectory.txt
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod session;

use commands::{
    MonitorCommand, PortsCommand, SchemaCommand, SendBufferCommand, StopCommand, StreamCommand,
    ZeroCommand,
};
use session::ConnectionArgs;

/// Fingerlink CLI - 手指执行器命令行工具
#[derive(Parser, Debug)]
#[command(name = "fingerlink-cli")]
#[command(about = "Command-line interface for the fingerlink MCU link", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 打印消息原型表
    Schema(SchemaCommand),

    /// 列出可用串口
    Ports(PortsCommand),

    /// 监控链路（心跳 + 收包）
    Monitor(MonitorCommand),

    /// 从文件加载指令并下发
    SendBuffer(SendBufferCommand),

    /// 订阅关节遥测
    Stream(StreamCommand),

    /// 回零
    Zero(ZeroCommand),

    /// 急停
    Stop(StopCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fingerlink_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema(cmd) => cmd.execute(),
        Commands::Ports(cmd) => cmd.execute(),
        Commands::Monitor(cmd) => cmd.execute(&cli.connection.connect()?),
        Commands::SendBuffer(cmd) => cmd.execute(&cli.connection.connect()?),
        Commands::Stream(cmd) => cmd.execute(&cli.connection.connect()?),
        Commands::Zero(cmd) => cmd.execute(&cli.connection.connect()?),
        Commands::Stop(cmd) => cmd.execute(&cli.connection.connect()?),
    }
}
