//! 异步通知：订阅者登记与“数据到达”事件扇出。
//!
//! # 设计背景（Why）
//! - 内核版 globalfifo 驱动在每次成功写入后向 `fasync` 队列投递 `SIGIO`；这里把投递通道抽象成
//!   [`Notifier`] 回调，信号、事件描述符或消息队列都可以作为实现；
//! - 通知是“尽力而为、发后即忘”的边沿信号，不是可靠队列：订阅者漏收时应调用
//!   `poll_readiness` 自行确认状态。
//!
//! # 契约说明（What）
//! - 每次接受字节数大于 0 的写入，对写入时刻登记在案的每个订阅者恰好通知一次；
//! - 接受 0 字节的写入不产生通知；
//! - `Notifier::notify` 必须快速返回且不得阻塞，否则会拖慢写入方。

use std::fmt;
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::readiness::Readiness;

/// 订阅者标识，由宿主分配（通常对应一次打开的文件句柄）。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub const fn new(raw: u64) -> Self {
        SubscriberId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// 一次“数据已可读”通知，语义上对应 `SIGIO` + `POLL_IN`。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotifyEvent {
    /// 接收方的订阅标识。
    pub subscriber: SubscriberId,
    /// 写入完成瞬间的就绪掩码，必然包含 `READABLE`。
    pub readiness: Readiness,
    /// 写入完成瞬间缓冲区内的字节数。
    pub available: usize,
}

/// 通知投递端。
///
/// # 契约说明（What）
/// - 由写入方线程在释放缓冲区锁之后同步调用；
/// - 实现不得阻塞，也不应 panic；失败时静默丢弃即可。
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotifyEvent);
}

impl<F> Notifier for F
where
    F: Fn(&NotifyEvent) + Send + Sync,
{
    fn notify(&self, event: &NotifyEvent) {
        self(event)
    }
}

/// 基于无界通道的通知实现，便于异步宿主以 `Stream` 形式消费事件。
///
/// 发送永不阻塞；接收端被丢弃后发送失败会被忽略。
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    sender: UnboundedSender<NotifyEvent>,
}

impl ChannelNotifier {
    /// 创建一对通知端与接收流。
    pub fn channel() -> (Self, UnboundedReceiver<NotifyEvent>) {
        let (sender, receiver) = mpsc::unbounded();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &NotifyEvent) {
        let _ = self.sender.unbounded_send(event.clone());
    }
}

/// 订阅者登记表，只在缓冲区锁内被修改。
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Vec<(SubscriberId, Arc<dyn Notifier>)>,
}

impl Subscribers {
    /// 登记或替换同一标识的通知端；返回是否发生了替换。
    pub(crate) fn insert(&mut self, id: SubscriberId, notifier: Arc<dyn Notifier>) -> bool {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                slot.1 = notifier;
                true
            }
            None => {
                self.entries.push((id, notifier));
                false
            }
        }
    }

    /// 移除登记；未知标识返回 `false` 而不是报错。
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        before != self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// 在写入的线性化点快照当前订阅者，实际投递推迟到释放锁之后。
    pub(crate) fn prepare(&self, readiness: Readiness, available: usize) -> PendingNotification {
        PendingNotification {
            targets: self.entries.clone(),
            readiness,
            available,
        }
    }
}

/// 已快照、待投递的一批通知。
#[must_use = "快照后的通知需要调用 deliver 才会送达"]
pub(crate) struct PendingNotification {
    targets: Vec<(SubscriberId, Arc<dyn Notifier>)>,
    readiness: Readiness,
    available: usize,
}

impl PendingNotification {
    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn deliver(self) {
        for (subscriber, notifier) in self.targets {
            let event = NotifyEvent {
                subscriber,
                readiness: self.readiness,
                available: self.available,
            };
            tracing::trace!(%subscriber, available = self.available, "fifo notify");
            notifier.notify(&event);
        }
    }
}
