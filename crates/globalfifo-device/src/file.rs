//! 打开的文件句柄。
//!
//! # 设计背景（Why）
//! - 驱动以 `struct file` 区分每次打开：`O_NONBLOCK` 与 `fasync` 登记都是“每个文件”的属性，
//!   缓冲区则由所有文件共享；
//! - 这里以 [`FifoFile`] 承载这些每文件属性，数据面调用一律转发给核心。
//!
//! # 契约说明（What）
//! - `read`/`write` 在非阻塞模式下无法推进即返回 `EAGAIN` 对应的错误；
//! - 析构即 `release`：注销本文件的异步通知登记并递减设备打开计数。

use std::fmt;
use std::io;
use std::sync::Arc;

use futures::channel::mpsc::UnboundedReceiver;
use globalfifo::{Notifier, NotifyEvent, SubscriberId, WaitContext};

use crate::device::FifoDevice;
use crate::error::DeviceError;
use crate::ioctl::FifoCommand;
use crate::poll::PollMask;

/// 打开标志。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpenFlags {
    /// 等价于 `O_NONBLOCK`。
    pub nonblocking: bool,
    /// 打开时即登记异步通知（等价于打开后立刻设置 `FASYNC`）。
    pub async_notify: bool,
}

impl OpenFlags {
    pub fn nonblocking() -> Self {
        Self {
            nonblocking: true,
            ..Self::default()
        }
    }

    pub fn with_async_notify(mut self) -> Self {
        self.async_notify = true;
        self
    }
}

/// 一次打开得到的文件句柄。
pub struct FifoFile {
    device: Arc<FifoDevice>,
    id: SubscriberId,
    nonblocking: bool,
    events: Option<UnboundedReceiver<NotifyEvent>>,
}

impl FifoFile {
    pub(crate) fn new(
        device: Arc<FifoDevice>,
        id: SubscriberId,
        flags: OpenFlags,
        events: Option<UnboundedReceiver<NotifyEvent>>,
    ) -> Self {
        Self {
            device,
            id,
            nonblocking: flags.nonblocking,
            events,
        }
    }

    /// 本文件的订阅标识。
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn device(&self) -> &Arc<FifoDevice> {
        &self.device
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// 对应 `fcntl(F_SETFL, O_NONBLOCK)`。
    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.nonblocking = nonblocking;
    }

    fn wait_context(&self) -> WaitContext {
        WaitContext::from_flag(!self.nonblocking)
    }

    /// 读取到 `buf`，返回读到的字节数；遵循本文件的阻塞模式。
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.read_with(buf, &self.wait_context())
    }

    /// 以显式等待参数读取，忽略本文件的阻塞模式。
    pub fn read_with(&self, buf: &mut [u8], ctx: &WaitContext) -> Result<usize, DeviceError> {
        Ok(self.device.buffer().read_into(buf, ctx)?)
    }

    /// 写入 `data`，返回实际接受的字节数（可能短写）。
    pub fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        self.write_with(data, &self.wait_context())
    }

    pub fn write_with(&self, data: &[u8], ctx: &WaitContext) -> Result<usize, DeviceError> {
        Ok(self.device.buffer().write_with(data, ctx)?)
    }

    /// 控制命令入口；目前只识别 [`FIFO_CLEAR`](crate::FIFO_CLEAR)。
    pub fn ioctl(&self, cmd: u32) -> Result<(), DeviceError> {
        match FifoCommand::try_from(cmd)? {
            FifoCommand::Clear => self.device.buffer().clear()?,
        }
        Ok(())
    }

    pub fn poll(&self) -> Result<PollMask, DeviceError> {
        Ok(self.device.buffer().poll_readiness()?.into())
    }

    /// 登记或注销异步通知，对应 `fasync_helper` 的 on/off。
    ///
    /// 传入 `None` 时注销；注销未登记的文件不是错误。
    pub fn fasync(&mut self, notifier: Option<Arc<dyn Notifier>>) -> Result<(), DeviceError> {
        match notifier {
            Some(notifier) => {
                self.device.buffer().subscribe(self.id, notifier)?;
            }
            None => {
                self.device.buffer().unsubscribe(self.id);
                self.events = None;
            }
        }
        Ok(())
    }

    /// 打开时以 `async_notify` 登记的事件流。
    pub fn events(&mut self) -> Option<&mut UnboundedReceiver<NotifyEvent>> {
        self.events.as_mut()
    }
}

impl Drop for FifoFile {
    fn drop(&mut self) {
        self.device.release(self.id);
    }
}

impl fmt::Debug for FifoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoFile")
            .field("device", &self.device.name())
            .field("id", &self.id)
            .field("nonblocking", &self.nonblocking)
            .finish_non_exhaustive()
    }
}

impl io::Read for FifoFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ctx = self.wait_context();
        self.read_with(buf, &ctx).map_err(io::Error::from)
    }
}

impl io::Write for FifoFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ctx = self.wait_context();
        self.write_with(buf, &ctx).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
