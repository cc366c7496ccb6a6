//! 设备节点。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::channel::mpsc::UnboundedReceiver;
use globalfifo::{BoundedBuffer, ChannelNotifier, FifoError, NotifyEvent, SubscriberId, WakePolicy};

use crate::config::FifoConfig;
use crate::error::DeviceError;
use crate::file::{FifoFile, OpenFlags};
use crate::report::{DiagnosticReport, render_status_attr};

/// 已挂载的设备实例，持有唯一的 [`BoundedBuffer`]。
///
/// # 教案式说明
/// - **意图 (Why)**：取代驱动中的全局设备结构体，所有打开的文件都通过 `Arc<FifoDevice>`
///   共享同一缓冲区；
/// - **契约 (What)**：
///   - [`FifoDevice::open`] 为每个文件分配唯一的 [`SubscriberId`]，永不复用；
///   - 移除（detach）后 `open`/`status_attr`/`report` 均返回 `Closed`，已打开的文件随之失效；
/// - **执行逻辑 (How)**：仅维护打开计数与 id 分配器，其余状态全部委托给核心。
pub struct FifoDevice {
    name: String,
    buffer: BoundedBuffer,
    next_file: AtomicU64,
    open_files: AtomicUsize,
}

impl FifoDevice {
    pub(crate) fn attach(config: &FifoConfig) -> Result<Self, DeviceError> {
        config.validate()?;
        let buffer = BoundedBuffer::with_policy(config.capacity, config.wake_policy)?;
        Ok(Self {
            name: config.name.clone(),
            buffer,
            next_file: AtomicU64::new(1),
            open_files: AtomicUsize::new(0),
        })
    }

    pub(crate) fn detach(&self) -> bool {
        self.buffer.close()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 共享缓冲区句柄，供需要直接访问核心 API 的宿主使用。
    pub fn buffer(&self) -> &BoundedBuffer {
        &self.buffer
    }

    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Acquire)
    }

    /// 打开设备，得到一个独立的文件句柄。
    ///
    /// `flags.async_notify` 为真时立即以通道方式登记异步通知，
    /// 事件流可通过 [`FifoFile::events`] 取得。
    pub fn open(self: &Arc<Self>, flags: OpenFlags) -> Result<FifoFile, DeviceError> {
        if self.buffer.is_closed() {
            return Err(FifoError::Closed.into());
        }
        let id = SubscriberId::new(self.next_file.fetch_add(1, Ordering::Relaxed));
        let events = if flags.async_notify {
            Some(self.subscribe_channel(id)?)
        } else {
            None
        };
        self.open_files.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(device = %self.name, %id, ?flags, "fifo file opened");
        Ok(FifoFile::new(Arc::clone(self), id, flags, events))
    }

    fn subscribe_channel(&self, id: SubscriberId) -> Result<UnboundedReceiver<NotifyEvent>, DeviceError> {
        let (notifier, events) = ChannelNotifier::channel();
        self.buffer.subscribe(id, Arc::new(notifier))?;
        Ok(events)
    }

    pub(crate) fn release(&self, id: SubscriberId) {
        self.buffer.unsubscribe(id);
        self.open_files.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(device = %self.name, %id, "fifo file released");
    }

    /// 状态属性文本：`capacity=<c> length=<l> free=<f>\n`。
    pub fn status_attr(&self) -> Result<String, DeviceError> {
        Ok(render_status_attr(&self.buffer.stats()?))
    }

    /// 结构化诊断报告。
    pub fn diagnostics(&self) -> Result<DiagnosticReport, DeviceError> {
        let stats = self.buffer.stats()?;
        Ok(DiagnosticReport {
            device: self.name.clone(),
            wake_policy: match self.buffer.wake_policy() {
                WakePolicy::All => "all",
                WakePolicy::One => "one",
            },
            open_files: self.open_files(),
            stats,
        })
    }

    /// 诊断报告的文本形式。
    pub fn report(&self) -> Result<String, DeviceError> {
        Ok(self.diagnostics()?.to_string())
    }
}

impl fmt::Debug for FifoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoDevice")
            .field("name", &self.name)
            .field("buffer", &self.buffer)
            .field("open_files", &self.open_files())
            .finish()
    }
}
