//! 串口通道（`serialport`）

use crate::history::{Direction, HistoryEntry};
use crate::tap::ChannelTap;
use crate::{ByteObserver, ChannelError, ComChannel};
use parking_lot::Mutex;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 读写超时（接收前会先查询可读字节数，正常情况下不会阻塞到超时）
const IO_TIMEOUT: Duration = Duration::from_millis(10);

/// 串口通道
///
/// 打开时克隆出读、写两个句柄，分别加锁。
pub struct SerialChannel {
    port_name: String,
    baud_rate: u32,
    tx: Mutex<Option<Box<dyn SerialPort>>>,
    rx: Mutex<Option<Box<dyn SerialPort>>>,
    open: AtomicBool,
    tap: ChannelTap,
}

impl SerialChannel {
    /// 打开串口
    ///
    /// 打开失败不会返回错误：记录日志后得到一个关闭状态的通道
    /// （`is_open() == false`，发送返回 `NotOpen`，接收返回空）。
    pub fn open(port_name: &str, baud_rate: u32, history_capacity: usize) -> Self {
        let channel = Self::closed(port_name, baud_rate, history_capacity);
        if let Err(e) = channel.reopen() {
            warn!("Failed to open serial port {} @ {}: {}", port_name, baud_rate, e);
        }
        channel
    }

    /// 打开串口，失败时返回错误
    pub fn try_open(
        port_name: &str,
        baud_rate: u32,
        history_capacity: usize,
    ) -> Result<Self, ChannelError> {
        let channel = Self::closed(port_name, baud_rate, history_capacity);
        channel.reopen()?;
        Ok(channel)
    }

    fn closed(port_name: &str, baud_rate: u32, history_capacity: usize) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            tx: Mutex::new(None),
            rx: Mutex::new(None),
            open: AtomicBool::new(false),
            tap: ChannelTap::new(history_capacity),
        }
    }

    /// （重新）打开底层串口
    pub fn reopen(&self) -> Result<(), ChannelError> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(IO_TIMEOUT)
            .open()?;
        let reader = port.try_clone()?;

        *self.tx.lock() = Some(port);
        *self.rx.lock() = Some(reader);
        self.open.store(true, Ordering::Release);
        info!("Serial port {} opened @ {} baud", self.port_name, self.baud_rate);
        Ok(())
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.tx.lock().take();
        self.rx.lock().take();
        debug!("Serial port {} closed", self.port_name);
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// 当前系统可用的串口名
    pub fn available_ports() -> Result<Vec<String>, ChannelError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }
}

impl ComChannel for SerialChannel {
    fn send(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        {
            let mut guard = self.tx.lock();
            let port = guard.as_mut().ok_or(ChannelError::NotOpen)?;
            port.write_all(bytes)?;
            port.flush()?;
        }
        trace!("TX {} bytes", bytes.len());
        self.tap.record(Direction::Sent, bytes);
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, ChannelError> {
        let data = {
            let mut guard = self.rx.lock();
            let Some(port) = guard.as_mut() else {
                return Ok(Vec::new());
            };

            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                return Ok(Vec::new());
            }

            let mut buf = vec![0u8; available];
            match port.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    buf
                },
                Err(e) if e.kind() == ErrorKind::TimedOut => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        };

        if !data.is_empty() {
            trace!("RX {} bytes", data.len());
            self.tap.record(Direction::Received, &data);
        }
        Ok(data)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn add_observer(&self, direction: Direction, observer: ByteObserver) {
        self.tap.add_observer(direction, observer);
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.tap.history()
    }

    fn clear_history(&self) {
        self.tap.clear_history();
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}
