//! 定长共享字节 FIFO。
//!
//! # 模块角色（Why）
//! - 承载全部并发正确性契约：互斥、等待/唤醒、取消与就绪上报；
//! - 对外只暴露显式持有的句柄 [`BoundedBuffer`]，不存在进程级全局状态，
//!   创建即 attach，[`BoundedBuffer::close`] 即 detach。
//!
//! # 核心机制（How）
//! - 单把互斥锁守护 `storage`、`length`、生命周期、订阅表与统计；`capacity` 构造后只读；
//! - `not_empty` 挂读者，`not_full` 挂写者；等待总在循环内进行，醒来先检查关闭，再检查谓词；
//! - 所有唤醒都在持锁期间发出，数据变更与唤醒对被唤醒方而言是原子的；
//! - 存储始终前对齐：读出后把剩余字节搬到下标 0，不使用环形下标。
//!
//! # 契约说明（What）
//! - 写入为“短写”：只接受 `min(n, capacity - length)` 字节，剩余部分既不缓存也不报错；
//! - 读取为“短读”：只取 `min(max_len, length)` 字节；
//! - 任一错误路径上 `length`/`storage` 均保持原样。

use std::fmt;
use std::sync::{Arc, Weak};

use crate::cancel::Interruptible;
use crate::error::{FifoError, Result};
use crate::notify::{Notifier, SubscriberId, Subscribers};
use crate::readiness::Readiness;
use crate::status::{Counters, FifoStats, FifoStatus};
use crate::sync::{Condvar, Mutex, MutexGuard};
use crate::wait::{WaitContext, WakePolicy};

/// 多读多写共享的定长字节缓冲区句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：以可克隆句柄的形式在设备前端与每个打开的文件之间共享同一实例，
///   代替驱动里的全局设备结构体；
/// - **契约 (What)**：
///   - `read`/`write` 是仅有的挂起点，且只在调用方允许阻塞时挂起；
///   - `clear`、`poll_readiness`、`status` 从不挂起；
///   - 同类等待者之间不保证 FIFO 公平；
/// - **执行逻辑 (How)**：见模块文档；唤醒策略由 [`WakePolicy`] 决定；
/// - **风险提示 (Trade-offs)**：读出后整体搬移剩余字节，单次读的代价与剩余长度成正比；
///   换来的是存储区 `[0, length)` 始终按写入顺序排列，便于快照与排障。
#[derive(Clone)]
pub struct BoundedBuffer {
    shared: Arc<Shared>,
}

struct Shared {
    capacity: usize,
    policy: WakePolicy,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct State {
    storage: Box<[u8]>,
    length: usize,
    lifecycle: Lifecycle,
    subscribers: Subscribers,
    counters: Counters,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Lifecycle {
    Active,
    Closed,
}

#[derive(Clone, Copy, Debug)]
enum WaitSet {
    NotEmpty,
    NotFull,
}

impl State {
    fn ensure_active(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::Closed => Err(FifoError::Closed),
        }
    }

    fn satisfies(&self, set: WaitSet) -> bool {
        match set {
            WaitSet::NotEmpty => self.length > 0,
            WaitSet::NotFull => self.length < self.storage.len(),
        }
    }
}

impl Shared {
    fn condvar(&self, set: WaitSet) -> &Condvar {
        match set {
            WaitSet::NotEmpty => &self.not_empty,
            WaitSet::NotFull => &self.not_full,
        }
    }

    /// 按策略唤醒某一等待集合，调用方必须持有状态锁。
    fn wake(&self, set: WaitSet) {
        match self.policy {
            WakePolicy::All => self.condvar(set).notify_all(),
            WakePolicy::One => self.condvar(set).notify_one(),
        }
    }

    /// `One` 策略下的接力：谓词仍成立时再唤醒一个同类等待者。
    fn relay(&self, state: &State, set: WaitSet) {
        if self.policy == WakePolicy::One && state.satisfies(set) {
            self.condvar(set).notify_one();
        }
    }
}

impl Interruptible for Shared {
    fn interrupt(&self) {
        let _state = self.state.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl BoundedBuffer {
    /// 以默认唤醒策略（全部唤醒）创建实例，对应驱动的 probe/attach。
    ///
    /// `capacity` 必须为正，否则返回 [`FifoError::InvalidArgument`]。
    pub fn open(capacity: usize) -> Result<Self> {
        Self::with_policy(capacity, WakePolicy::default())
    }

    /// 以指定唤醒策略创建实例。
    pub fn with_policy(capacity: usize, policy: WakePolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(FifoError::invalid_argument("capacity must be positive"));
        }
        let state = State {
            storage: vec![0u8; capacity].into_boxed_slice(),
            length: 0,
            lifecycle: Lifecycle::Active,
            subscribers: Subscribers::default(),
            counters: Counters::default(),
        };
        tracing::debug!(capacity, ?policy, "fifo opened");
        Ok(Self {
            shared: Arc::new(Shared {
                capacity,
                policy,
                state: Mutex::new(state),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn wake_policy(&self) -> WakePolicy {
        self.shared.policy
    }

    /// 写入字节，`allow_block` 为 `false` 时等价于 `O_NONBLOCK`。
    ///
    /// 返回实际接受的字节数，可能小于 `data.len()`。
    pub fn write(&self, data: &[u8], allow_block: bool) -> Result<usize> {
        self.write_with(data, &WaitContext::from_flag(allow_block))
    }

    /// 带完整等待参数的写入。
    ///
    /// # 执行逻辑（How）
    /// 1. 持锁等待 `length < capacity`（或按 `ctx` 返回 `WouldBlock`/`Interrupted`/`TimedOut`）；
    /// 2. 追加 `min(n, room)` 字节到 `storage[length..]`；
    /// 3. `One` 策略下只要仍有空间就接力唤醒一个写者；接受字节数大于 0 时唤醒读者；
    /// 4. 接受字节数大于 0 时在锁内快照订阅者，释放锁后逐一投递通知。
    pub fn write_with(&self, data: &[u8], ctx: &WaitContext) -> Result<usize> {
        let guard = self.shared.state.lock();
        let mut state = self.wait_for(guard, WaitSet::NotFull, ctx)?;

        let start = state.length;
        let accepted = data.len().min(self.shared.capacity - start);
        state.storage[start..start + accepted].copy_from_slice(&data[..accepted]);
        state.length += accepted;
        state.counters.record_write(accepted);

        // 接受 0 字节的写入同样可能消耗了一次 `notify_one`，接力与字节数无关。
        self.shared.relay(&state, WaitSet::NotFull);
        let pending = if accepted > 0 {
            self.shared.wake(WaitSet::NotEmpty);
            let pending = state.subscribers.prepare(
                Readiness::of(state.length, self.shared.capacity),
                state.length,
            );
            state.counters.record_notifications(pending.len());
            Some(pending)
        } else {
            None
        };
        tracing::debug!(bytes = accepted, current_len = state.length, "fifo write");
        drop(state);

        if let Some(pending) = pending {
            pending.deliver();
        }
        Ok(accepted)
    }

    /// 读取至多 `max_len` 字节，`allow_block` 为 `false` 时等价于 `O_NONBLOCK`。
    pub fn read(&self, max_len: usize, allow_block: bool) -> Result<Vec<u8>> {
        self.read_with(max_len, &WaitContext::from_flag(allow_block))
    }

    /// 带完整等待参数的读取，返回取出的字节。
    pub fn read_with(&self, max_len: usize, ctx: &WaitContext) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.take(max_len, ctx, |bytes| out.extend_from_slice(bytes))?;
        Ok(out)
    }

    /// 读取到调用方提供的切片中，返回写入 `buf` 的字节数。
    ///
    /// 与 `copy_to_user` 的用法一致，避免为每次读取分配新的 `Vec`。
    pub fn read_into(&self, buf: &mut [u8], ctx: &WaitContext) -> Result<usize> {
        self.take(buf.len(), ctx, |bytes| buf[..bytes.len()].copy_from_slice(bytes))
    }

    fn take(&self, max_len: usize, ctx: &WaitContext, sink: impl FnOnce(&[u8])) -> Result<usize> {
        let guard = self.shared.state.lock();
        let mut state = self.wait_for(guard, WaitSet::NotEmpty, ctx)?;

        let length = state.length;
        let taken = max_len.min(length);
        sink(&state.storage[..taken]);
        state.storage.copy_within(taken..length, 0);
        state.length = length - taken;
        state.counters.record_read(taken);

        if taken > 0 {
            self.shared.wake(WaitSet::NotFull);
        }
        self.shared.relay(&state, WaitSet::NotEmpty);
        tracing::debug!(bytes = taken, current_len = state.length, "fifo read");
        Ok(taken)
    }

    /// 清空缓冲区，对应 `FIFO_CLEAR` ioctl。
    ///
    /// 从不挂起；存储区清零以保证确定性。只唤醒写者：清空不会让任何读者的条件成立。
    pub fn clear(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_active()?;
        state.length = 0;
        state.storage.fill(0);
        state.counters.record_clear();
        self.shared.wake(WaitSet::NotFull);
        tracing::info!(capacity = self.shared.capacity, "fifo cleared");
        Ok(())
    }

    /// 在同一次持锁期间计算就绪掩码。
    pub fn poll_readiness(&self) -> Result<Readiness> {
        let state = self.shared.state.lock();
        state.ensure_active()?;
        Ok(Readiness::of(state.length, self.shared.capacity))
    }

    /// 登记“数据到达”通知；同一标识重复登记时替换旧的通知端。
    pub fn subscribe(&self, id: SubscriberId, notifier: Arc<dyn Notifier>) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_active()?;
        let replaced = state.subscribers.insert(id, notifier);
        tracing::debug!(%id, replaced, "fifo subscribe");
        Ok(())
    }

    /// 注销通知；未知或已注销的标识不视为错误，关闭后同样可调用。
    ///
    /// 返回本次调用是否真正移除了登记。
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.shared.state.lock().subscribers.remove(id);
        if removed {
            tracing::debug!(%id, "fifo unsubscribe");
        }
        removed
    }

    /// `{capacity, length, free}` 的原子快照。
    pub fn status(&self) -> Result<FifoStatus> {
        let state = self.shared.state.lock();
        state.ensure_active()?;
        Ok(FifoStatus::new(self.shared.capacity, state.length))
    }

    /// 状态快照与累计统计，在同一次持锁期间采集。
    pub fn stats(&self) -> Result<FifoStats> {
        let state = self.shared.state.lock();
        state.ensure_active()?;
        let status = FifoStatus::new(self.shared.capacity, state.length);
        Ok(state.counters.snapshot(status, state.subscribers.len()))
    }

    /// 销毁实例（detach）。
    ///
    /// 幂等：首次调用返回 `true`。关闭后唤醒全部等待者使其以 `Closed` 退出，
    /// 并丢弃全部订阅登记；缓冲中尚未读出的字节随之作废。
    pub fn close(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.lifecycle == Lifecycle::Closed {
            return false;
        }
        state.lifecycle = Lifecycle::Closed;
        let discarded = state.length;
        state.length = 0;
        state.subscribers.clear();
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        tracing::info!(capacity = self.shared.capacity, discarded, "fifo closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().lifecycle == Lifecycle::Closed
    }

    /// 等待某一谓词成立，返回时仍持有锁。
    ///
    /// 循环顺序固定为：关闭检查 → 谓词 → 非阻塞短路 → 取消检查 → 挂起。
    /// 谓词先于取消检查，保证能够立即推进的调用不会因令牌已取消而失败；
    /// 中断钩子在第一次需要挂起时登记，函数返回时随 `registration` 析构注销。
    fn wait_for<'a>(
        &'a self,
        mut state: MutexGuard<'a, State>,
        set: WaitSet,
        ctx: &WaitContext,
    ) -> Result<MutexGuard<'a, State>> {
        let mut registration = None;
        loop {
            state.ensure_active()?;
            if state.satisfies(set) {
                return Ok(state);
            }
            if !ctx.allow_block() {
                return Err(FifoError::WouldBlock);
            }
            if let Some(token) = ctx.cancellation() {
                if registration.is_none() {
                    let target: Weak<dyn Interruptible> = self.interrupt_target();
                    registration = Some(token.register(target));
                }
                if token.is_cancelled() {
                    tracing::debug!(?set, "fifo wait interrupted");
                    return Err(FifoError::Interrupted);
                }
            }

            let condvar = self.shared.condvar(set);
            match ctx.deadline() {
                None => state = condvar.wait(state),
                Some(deadline) => {
                    let (guard, timed_out) = condvar.wait_until(state, deadline);
                    state = guard;
                    if timed_out && state.lifecycle == Lifecycle::Active && !state.satisfies(set)
                    {
                        tracing::debug!(?set, "fifo wait timed out");
                        return Err(FifoError::TimedOut);
                    }
                }
            }
        }
    }

    fn interrupt_target(&self) -> Weak<dyn Interruptible> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        weak
    }
}

impl fmt::Debug for BoundedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}
