//! 状态快照与累计统计。

use core::fmt;

/// `{capacity, length, free}` 三元组，在同一次持锁期间采集。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FifoStatus {
    pub capacity: usize,
    pub length: usize,
    pub free: usize,
}

impl FifoStatus {
    pub(crate) fn new(capacity: usize, length: usize) -> Self {
        Self {
            capacity,
            length,
            free: capacity - length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.free == 0
    }
}

impl fmt::Display for FifoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capacity={} length={} free={}",
            self.capacity, self.length, self.free
        )
    }
}

/// 自实例创建以来的累计计数，与 [`FifoStatus`] 一同在锁内采集。
///
/// # 契约说明（What）
/// - `writes`/`reads` 只统计成功返回的调用（包括接受/取走 0 字节的调用）；
/// - `notifications` 统计已快照待投递的通知条数，而非回调实际执行成功的次数；
/// - 计数单调递增，溢出时回绕（`u64` 在实际负载下不会触及）。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FifoStats {
    pub status: FifoStatus,
    pub subscribers: usize,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub writes: u64,
    pub reads: u64,
    pub clears: u64,
    pub notifications: u64,
}

/// 锁内维护的原始计数器。
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub(crate) bytes_written: u64,
    pub(crate) bytes_read: u64,
    pub(crate) writes: u64,
    pub(crate) reads: u64,
    pub(crate) clears: u64,
    pub(crate) notifications: u64,
}

impl Counters {
    pub(crate) fn record_write(&mut self, accepted: usize) {
        self.writes = self.writes.wrapping_add(1);
        self.bytes_written = self.bytes_written.wrapping_add(accepted as u64);
    }

    pub(crate) fn record_read(&mut self, taken: usize) {
        self.reads = self.reads.wrapping_add(1);
        self.bytes_read = self.bytes_read.wrapping_add(taken as u64);
    }

    pub(crate) fn record_clear(&mut self) {
        self.clears = self.clears.wrapping_add(1);
    }

    pub(crate) fn record_notifications(&mut self, count: usize) {
        self.notifications = self.notifications.wrapping_add(count as u64);
    }

    pub(crate) fn snapshot(&self, status: FifoStatus, subscribers: usize) -> FifoStats {
        FifoStats {
            status,
            subscribers,
            bytes_written: self.bytes_written,
            bytes_read: self.bytes_read,
            writes: self.writes,
            reads: self.reads,
            clears: self.clears,
            notifications: self.notifications,
        }
    }
}
