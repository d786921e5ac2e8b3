//! 列出串口

use anyhow::Result;
use clap::Args;
use fingerlink_serial::SerialChannel;

#[derive(Args, Debug)]
pub struct PortsCommand {}

impl PortsCommand {
    pub fn execute(&self) -> Result<()> {
        let ports = SerialChannel::available_ports()?;
        if ports.is_empty() {
            println!("未发现串口");
        }
        for port in ports {
            println!("{port}");
        }
        Ok(())
    }
}
