//! 等待参数与唤醒策略。

use std::time::{Duration, Instant};

use crate::cancel::Cancellation;

/// 状态变化时唤醒同类等待者的策略。
///
/// # 教案式说明
/// - **意图 (Why)**：内核实现对读/写等待队列一律“全部唤醒”，多个同类等待者并存时会带来
///   惊群；`One` 提供逐个唤醒的选项，供等待者众多的宿主降低无效调度；
/// - **契约 (What)**：两种策略都不保证 FIFO 公平，醒来的等待者总会重新检查谓词；
///   `One` 通过“接力”维持无丢失唤醒：每次成功读取返回前若仍有剩余，会再唤醒一个读者，
///   每次成功写入返回前若仍有空间，会再唤醒一个写者（包括搬运 0 字节的调用）；
/// - **设计权衡 (Trade-offs)**：`All` 实现最简单、最接近内核驱动，默认采用；
///   `One` 减少惊群，但在“每次只挪动少量字节”的场景下接力链可能变长。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WakePolicy {
    /// 唤醒全部同类等待者。
    #[default]
    All,
    /// 仅唤醒一个同类等待者，并依靠接力避免唤醒丢失。
    One,
}

/// 一次 `read`/`write` 调用的等待参数。
///
/// # 设计背景（Why）
/// - 设备前端需要把 `O_NONBLOCK`、可中断睡眠与（扩展的）超时统一转交给核心；
/// - 将三者聚合在一个值对象中，避免 `read`/`write` 的参数列表随扩展膨胀。
///
/// # 契约说明（What）
/// - `allow_block == false` 时取消令牌与截止时间均不生效：无法立即推进即返回 `WouldBlock`；
/// - 取消令牌仅在调用确实需要等待时被检查，能够立即推进的调用即便令牌已取消也会照常完成；
/// - 截止时间为绝对时刻，越过后仍未满足条件返回 `TimedOut`。
#[derive(Clone, Debug)]
pub struct WaitContext {
    allow_block: bool,
    cancellation: Option<Cancellation>,
    deadline: Option<Instant>,
}

impl WaitContext {
    /// 允许阻塞、无取消、无超时。
    pub fn blocking() -> Self {
        Self::from_flag(true)
    }

    /// 不允许阻塞。
    pub fn non_blocking() -> Self {
        Self::from_flag(false)
    }

    /// 由布尔开关构造，对应驱动中的 `O_NONBLOCK` 取反。
    pub fn from_flag(allow_block: bool) -> Self {
        Self {
            allow_block,
            cancellation: None,
            deadline: None,
        }
    }

    /// 附加取消令牌。
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// 附加绝对截止时间。
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 以“当前时刻 + 时长”设置截止时间；溢出时视为不设超时。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    pub fn allow_block(&self) -> bool {
        self.allow_block
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::blocking()
    }
}
