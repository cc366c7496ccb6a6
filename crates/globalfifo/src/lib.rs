#![deny(unsafe_code)]

//! `globalfifo`：多读多写共享的定长字节 FIFO 核心。
//!
//! # 模块定位（Why）
//! - 提供一个固定容量、可被任意多个读者/写者并发访问的字节缓冲区，
//!   以容量作为唯一的背压手段；
//! - 同时支持阻塞与非阻塞两种语义、无阻塞的就绪查询以及“数据到达”的异步通知，
//!   让外层的设备前端（打开/读写/ioctl/poll/fasync）只做薄转发。
//!
//! # 设计概要（How）
//! - [`BoundedBuffer`] 以一把互斥锁保护全部可变状态，两个条件变量分别承载
//!   “等待非空”的读者与“等待非满”的写者，醒来后总是重新检查谓词；
//! - [`Cancellation`] 让阻塞中的调用可被外部打断，[`WaitContext`] 汇总
//!   “是否允许阻塞 / 取消令牌 / 截止时间”三项等待参数；
//! - [`Notifier`] 将异步通知抽象为回调，具体投递通道（信号、事件、消息）由宿主决定。
//!
//! # 契约说明（What）
//! - 任意调用返回后 `0 <= length <= capacity`；
//! - `WouldBlock`/`Interrupted`/`TimedOut` 均不改变缓冲区状态；
//! - 关闭后的实例对所有操作返回 [`FifoError::Closed`]（`unsubscribe` 除外，其始终幂等）。

pub mod buffer;
pub mod cancel;
pub mod error;
pub mod notify;
pub mod readiness;
pub mod status;
mod sync;
pub mod wait;

pub use buffer::BoundedBuffer;
pub use cancel::Cancellation;
pub use error::{FifoError, Result};
pub use notify::{ChannelNotifier, NotifyEvent, Notifier, SubscriberId};
pub use readiness::Readiness;
pub use status::{FifoStats, FifoStatus};
pub use wait::{WaitContext, WakePolicy};
