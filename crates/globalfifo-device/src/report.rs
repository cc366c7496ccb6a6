//! 状态属性与诊断报告。
//!
//! 两者都由同一次 [`BoundedBuffer::stats`](globalfifo::BoundedBuffer::stats) 快照渲染，
//! 不会出现 `length` 与 `free` 取自不同时刻的情况。

use core::fmt;

use globalfifo::FifoStats;
use serde::Serialize;

/// 渲染状态属性文件的内容：`capacity=<c> length=<l> free=<f>\n`。
pub fn render_status_attr(stats: &FifoStats) -> String {
    format!("{}\n", stats.status)
}

/// 诊断报告，对应 proc 风格的多行 `key: value` 文本。
///
/// 同时派生 `Serialize`，便于工具以 JSON 形式输出。
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub device: String,
    pub wake_policy: &'static str,
    pub open_files: usize,
    pub stats: FifoStats,
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "device: {}", self.device)?;
        writeln!(f, "wake_policy: {}", self.wake_policy)?;
        writeln!(f, "capacity: {}", stats.status.capacity)?;
        writeln!(f, "length: {}", stats.status.length)?;
        writeln!(f, "free: {}", stats.status.free)?;
        writeln!(f, "open_files: {}", self.open_files)?;
        writeln!(f, "subscribers: {}", stats.subscribers)?;
        writeln!(f, "bytes_written: {}", stats.bytes_written)?;
        writeln!(f, "bytes_read: {}", stats.bytes_read)?;
        writeln!(f, "writes: {}", stats.writes)?;
        writeln!(f, "reads: {}", stats.reads)?;
        writeln!(f, "clears: {}", stats.clears)?;
        writeln!(f, "notifications: {}", stats.notifications)
    }
}
