//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 在核心错误 [`FifoError`] 之上补充设备生命周期与配置加载两类失败；
//! - 为宿主提供 Linux 风格的 errno 与 [`io::Error`] 转换，使文件句柄可以直接接入
//!   `std::io::Read`/`std::io::Write` 生态。
//!
//! ## 设计要求（What）
//! - 全部错误派生 `thiserror::Error`；
//! - errno 取值与内核头文件保持一致（`EAGAIN = 11` 等），`ERESTARTSYS` 沿用内核内部值 512。

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use globalfifo::FifoError;
use thiserror::Error;

/// 与驱动返回值对应的 errno 常量。
pub mod errno {
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const EAGAIN: i32 = 11;
    pub const ETIMEDOUT: i32 = 110;
    pub const ERESTARTSYS: i32 = 512;
}

/// 配置加载与校验错误。
///
/// ### 逻辑解析（How）
/// - `Source`：配置文件读取失败；
/// - `Decode`：TOML 解析失败，保留底层解析器的位置信息；
/// - `Validation`：字段取值违反约束，例如容量为 0。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read fifo config `{}`: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode fifo config: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("invalid fifo config field `{field}`: {detail}")]
    Validation {
        field: &'static str,
        detail: Cow<'static, str>,
    },
}

impl ConfigError {
    pub(crate) fn validation(field: &'static str, detail: impl Into<Cow<'static, str>>) -> Self {
        ConfigError::Validation {
            field,
            detail: detail.into(),
        }
    }
}

/// 设备前端错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：核心错误描述“缓冲区能否推进”，前端还需要表达“设备是否已挂载”
///   与“配置是否可用”；把三者汇总成一个枚举，`probe`/`open`/`read` 等入口都能用 `?` 传播；
/// - **契约 (What)**：[`DeviceError::errno`] 给出驱动层返回值的绝对值，
///   `From<DeviceError> for io::Error` 给出对应的 [`io::ErrorKind`]；
/// - **设计权衡 (Trade-offs)**：`Config` 变体内含 `io::Error`，因此本类型不实现 `Clone`/`PartialEq`，
///   测试中请使用 `matches!` 断言。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeviceError {
    #[error(transparent)]
    Fifo(#[from] FifoError),

    #[error("fifo device `{name}` is already attached")]
    AlreadyAttached { name: String },

    #[error("no fifo device is attached")]
    NotAttached,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DeviceError {
    /// 驱动层错误码（正值）。
    pub fn errno(&self) -> i32 {
        match self {
            DeviceError::Fifo(FifoError::WouldBlock) => errno::EAGAIN,
            DeviceError::Fifo(FifoError::Interrupted) => errno::ERESTARTSYS,
            DeviceError::Fifo(FifoError::TimedOut) => errno::ETIMEDOUT,
            DeviceError::Fifo(FifoError::Closed) | DeviceError::NotAttached => errno::ENODEV,
            DeviceError::AlreadyAttached { .. } => errno::EBUSY,
            DeviceError::Fifo(_) | DeviceError::Config(_) => errno::EINVAL,
        }
    }

    /// 稳定错误码：核心错误沿用 `fifo.*`，前端错误使用 `device.*`。
    pub fn code(&self) -> &'static str {
        match self {
            DeviceError::Fifo(err) => err.code(),
            DeviceError::AlreadyAttached { .. } => "device.already_attached",
            DeviceError::NotAttached => "device.not_attached",
            DeviceError::Config(_) => "device.invalid_config",
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            DeviceError::Fifo(FifoError::WouldBlock) => io::ErrorKind::WouldBlock,
            DeviceError::Fifo(FifoError::Interrupted) => io::ErrorKind::Interrupted,
            DeviceError::Fifo(FifoError::TimedOut) => io::ErrorKind::TimedOut,
            DeviceError::Fifo(FifoError::Closed) => io::ErrorKind::BrokenPipe,
            DeviceError::NotAttached => io::ErrorKind::NotConnected,
            DeviceError::AlreadyAttached { .. } => io::ErrorKind::ResourceBusy,
            DeviceError::Fifo(_) | DeviceError::Config(_) => io::ErrorKind::InvalidInput,
        }
    }
}

impl From<DeviceError> for io::Error {
    fn from(err: DeviceError) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}
