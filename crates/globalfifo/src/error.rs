//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义 FIFO 核心对外暴露的全部失败语义，调用方只需匹配一个枚举；
//! - 区分“可恢复”（稍后重试或改用轮询）与“终态”（实例已销毁）两类错误，
//!   避免上层在关闭后的句柄上空转重试。
//!
//! ## 设计要求（What）
//! - 所有变体派生 `thiserror::Error`，可直接交给 `std::error::Error` 生态；
//! - 每个变体提供稳定错误码（`fifo.*`），便于日志检索与告警聚合；
//! - 任何错误返回时缓冲区状态均保持调用前的样子，核心内部不做重试。

use std::borrow::Cow;

use thiserror::Error;

/// FIFO 核心的结果别名。
pub type Result<T, E = FifoError> = core::result::Result<T, E>;

/// FIFO 核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：将非阻塞失败、阻塞被打断、等待超时、参数非法与实例关闭五类路径显式化，
///   与设备前端的 `EAGAIN`/`ERESTARTSYS`/`ETIMEDOUT`/`EINVAL`/`ENODEV` 一一对应；
/// - **契约 (What)**：
///   - 变体均满足 `Send + Sync + 'static`，可跨线程传播；
///   - [`FifoError::is_recoverable`] 为 `true` 的错误允许调用方自行重试；
///   - [`FifoError::Closed`] 为终态，对同一实例的后续调用将持续返回该错误。
/// - **设计权衡 (Trade-offs)**：`InvalidArgument` 使用 `Cow<'static, str>` 承载描述，
///   常量描述零分配，动态描述（如非法 ioctl 号）才分配字符串。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum FifoError {
    /// 非阻塞调用无法立即推进：读时缓冲区为空，或写时缓冲区已满。
    #[error("operation would block")]
    WouldBlock,

    /// 阻塞等待在条件满足前被外部取消，缓冲区未发生任何变化。
    #[error("blocking wait was interrupted before its condition held")]
    Interrupted,

    /// 阻塞等待在条件满足前越过了调用方给定的截止时间。
    #[error("blocking wait timed out before its condition held")]
    TimedOut,

    /// 参数或控制命令不合法，未产生任何状态变化。
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: Cow<'static, str> },

    /// 实例已被销毁（detach），句柄不再可用。
    #[error("fifo has been closed")]
    Closed,
}

impl FifoError {
    /// 以静态或动态描述构造 [`FifoError::InvalidArgument`]。
    pub fn invalid_argument(detail: impl Into<Cow<'static, str>>) -> Self {
        FifoError::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// 稳定错误码，供日志字段与指标标签使用。
    pub fn code(&self) -> &'static str {
        match self {
            FifoError::WouldBlock => "fifo.would_block",
            FifoError::Interrupted => "fifo.interrupted",
            FifoError::TimedOut => "fifo.timed_out",
            FifoError::InvalidArgument { .. } => "fifo.invalid_argument",
            FifoError::Closed => "fifo.closed",
        }
    }

    /// 调用方是否可以在不更换句柄的前提下重试。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FifoError::WouldBlock | FifoError::Interrupted | FifoError::TimedOut
        )
    }
}
