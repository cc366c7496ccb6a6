//! 可唤醒的取消令牌。
//!
//! 仅有原子位的取消令牌无法打断已经挂在条件变量上的线程：等待方不会主动轮询。
//! 因此这里在原子位之外维护一张“中断钩子”表，阻塞中的读写在进入等待前登记自身所属的
//! 缓冲区，`cancel` 置位后逐一唤醒这些缓冲区，等待方醒来重新检查取消位即可退出。

use std::fmt;
use std::sync::{Arc, Weak};

use crate::sync::{AtomicBool, Mutex, Ordering};

/// 能够被取消令牌唤醒的等待方所属对象。
///
/// 实现方需在持有自身互斥锁的前提下唤醒全部等待者，
/// 以保证与“检查取消位 → 进入等待”之间不存在窗口。
pub(crate) trait Interruptible: Send + Sync {
    fn interrupt(&self);
}

/// 取消原语，让阻塞中的 `read`/`write` 可以被外部主动打断。
///
/// # 设计背景（Why）
/// - 内核驱动依赖“信号挂起 + 可中断睡眠”退出阻塞；用户态没有对等机制，
///   需要一个显式的、可跨线程共享的取消令牌；
/// - 令牌与缓冲区解耦：同一令牌可同时打断挂在多个缓冲区上的调用。
///
/// # 逻辑解析（How）
/// - `flag` 使用原子位记录取消状态，`cancel` 通过比较交换保证只有首次调用返回 `true`；
/// - `hooks` 记录当前正在等待的缓冲区（弱引用），`cancel` 在置位之后快照钩子表、
///   释放表锁、再逐个调用 [`Interruptible::interrupt`]，从不在持有表锁时获取缓冲区锁；
/// - 等待方在持有缓冲区锁时登记钩子并检查取消位，两把锁的获取顺序固定为
///   “缓冲区 → 钩子表”，不会形成环。
///
/// # 契约说明（What）
/// - **前置条件**：无，默认处于未取消状态；
/// - **后置条件**：`cancel` 返回后，所有已登记或即将检查取消位的等待方都会以
///   [`FifoError::Interrupted`](crate::FifoError::Interrupted) 退出（除非其等待条件已先行满足）；
/// - 取消不可撤销，需要新的可取消窗口时请创建新令牌。
#[derive(Clone)]
pub struct Cancellation {
    inner: Arc<CancellationState>,
}

struct CancellationState {
    flag: AtomicBool,
    hooks: Mutex<HookTable>,
}

#[derive(Default)]
struct HookTable {
    next_key: u64,
    entries: Vec<(u64, Weak<dyn Interruptible>)>,
}

impl Cancellation {
    /// 创建处于“未取消”状态的取消令牌。
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                flag: AtomicBool::new(false),
                hooks: Mutex::new(HookTable::default()),
            }),
        }
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// 将令牌标记为取消，并唤醒所有登记在案的等待方。
    ///
    /// 返回值为 `true` 表示本次调用首次触发取消；返回 `false` 表示之前已被取消。
    pub fn cancel(&self) -> bool {
        let first = self
            .inner
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !first {
            return false;
        }

        let targets: Vec<Arc<dyn Interruptible>> = {
            let table = self.inner.hooks.lock();
            table
                .entries
                .iter()
                .filter_map(|(_, target)| target.upgrade())
                .collect()
        };
        tracing::debug!(waiters = targets.len(), "cancellation fired");
        for target in targets {
            target.interrupt();
        }
        true
    }

    /// 派生共享同一取消位的子令牌。
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// 为一次阻塞等待登记中断钩子，返回值析构时自动注销。
    pub(crate) fn register(&self, target: Weak<dyn Interruptible>) -> InterruptRegistration<'_> {
        let mut table = self.inner.hooks.lock();
        let key = table.next_key;
        table.next_key = table.next_key.wrapping_add(1);
        table.entries.push((key, target));
        InterruptRegistration { token: self, key }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.hooks.lock().entries.len()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// 中断钩子的登记凭证；析构即把自身从钩子表移除，对应驱动中的 `remove_wait_queue`。
pub(crate) struct InterruptRegistration<'a> {
    token: &'a Cancellation,
    key: u64,
}

impl Drop for InterruptRegistration<'_> {
    fn drop(&mut self) {
        let mut table = self.token.inner.hooks.lock();
        table.entries.retain(|(key, _)| *key != self.key);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingTarget(AtomicUsize);

    impl Interruptible for CountingTarget {
        fn interrupt(&self) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_is_idempotent_and_shared_with_children() {
        let root = Cancellation::new();
        let child = root.child();
        assert!(!child.is_cancelled());
        assert!(child.cancel(), "首次取消应返回 true");
        assert!(root.is_cancelled());
        assert!(!root.cancel(), "重复取消应返回 false");
    }

    #[test]
    fn cancel_interrupts_registered_targets_once() {
        let token = Cancellation::new();
        let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
        let weak: Weak<dyn Interruptible> = Arc::downgrade(&target) as Weak<dyn Interruptible>;
        let registration = token.register(weak);
        assert_eq!(token.registered(), 1);

        token.cancel();
        token.cancel();
        assert_eq!(target.0.load(std::sync::atomic::Ordering::SeqCst), 1);

        drop(registration);
        assert_eq!(token.registered(), 0, "登记凭证析构后钩子必须移除");
    }

    #[test]
    fn dropped_targets_are_skipped() {
        let token = Cancellation::new();
        let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
        let weak: Weak<dyn Interruptible> = Arc::downgrade(&target) as Weak<dyn Interruptible>;
        let _registration = token.register(weak);
        drop(target);
        assert!(token.cancel());
    }
}
