#![deny(unsafe_code)]

//! `globalfifo-device`：把 [`globalfifo::BoundedBuffer`] 包装成“字符设备”的薄前端。
//!
//! # 模块定位（Why）
//! - 核心 crate 只关心缓冲区的并发契约；探测/移除、设备节点、每次打开的文件句柄、
//!   ioctl、poll、fasync 以及状态属性这些外围职责集中在这里；
//! - 前端不持有任何额外的状态机，所有数据面与控制面调用都直接转发给核心。
//!
//! # 组成（How）
//! - [`FifoDriver`]：平台驱动，负责 attach/detach，保证同一时刻至多一个实例；
//! - [`FifoDevice`]：设备节点，负责打开文件、生成状态属性与诊断报告；
//! - [`FifoFile`]：一次打开得到的句柄，提供 read/write/ioctl/poll/fasync，析构即 release；
//! - [`FifoConfig`]：从 TOML 加载的设备参数；
//! - [`DeviceError`]：前端错误域，可映射为 errno 与 [`std::io::Error`]。
//!
//! # 契约说明（What）
//! - 文件句柄的读写遵循 `O_NONBLOCK` 语义：非阻塞时无法推进即返回 `EAGAIN`；
//! - 文件关闭时自动注销其异步通知登记，重复注销不会报错。

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod file;
pub mod ioctl;
pub mod poll;
pub mod report;

pub use config::FifoConfig;
pub use device::FifoDevice;
pub use driver::FifoDriver;
pub use error::{ConfigError, DeviceError};
pub use file::{FifoFile, OpenFlags};
pub use ioctl::{FIFO_CLEAR, FifoCommand};
pub use poll::PollMask;
pub use report::DiagnosticReport;
