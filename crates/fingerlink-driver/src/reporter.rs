//! 错误报告器
//!
//! 只追加的错误记录，每条记录同时镜像到 `tracing`。
//! 通信层的失败（超时、应答不符等）不向上抛出，而是记录到这里。

use crate::clock::{Clock, MonotonicClock};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// 需要停止执行的错误
    StopExecution,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::StopExecution => "STOP_EXECUTION",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub severity: Severity,
    pub message: String,
    /// 记录时间（毫秒，来自注入的时钟）
    pub timestamp_ms: u64,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

pub struct ErrorReporter {
    records: Mutex<Vec<ErrorRecord>>,
    clock: Arc<dyn Clock>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock))
    }
}

impl ErrorReporter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    pub fn report(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error | Severity::StopExecution => error!("{}: {}", severity, message),
        }
        self.records.lock().push(ErrorRecord {
            severity,
            message,
            timestamp_ms: self.clock.now_ms(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.report(message, Severity::Info);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.report(message, Severity::Warning);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(message, Severity::Error);
    }

    /// 全部记录（按时间顺序）
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    /// 指定严重程度的记录
    pub fn records_with(&self, severity: Severity) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}
