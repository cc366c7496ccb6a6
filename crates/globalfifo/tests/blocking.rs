//! 阻塞、唤醒、取消与超时的多线程测试。
//!
//! # 教案级导览
//!
//! - **Why**：无丢失唤醒与可中断等待是本 crate 唯一真正的并发契约，需要真实线程去竞争；
//! - **How**：先让等待方在后台线程挂起（`spawn_blocked` 确认其尚未返回），
//!   再由测试线程推动状态变化，最后断言等待方的返回值与缓冲区状态；
//! - **What**：覆盖读者被写入唤醒、写者被读出/清空唤醒、取消与超时不改变状态、
//!   关闭唤醒残留等待者，以及两种唤醒策略下的多读多写压力场景。

#![cfg(not(loom))]

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use globalfifo::{BoundedBuffer, Cancellation, FifoError, WaitContext, WakePolicy};

/// 给等待方足够时间进入条件变量。
fn settle() {
    thread::sleep(Duration::from_millis(50));
}

/// 在后台线程执行阻塞调用，并确认它在 `settle` 之后仍未返回。
fn spawn_blocked<T, F>(f: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    settle();
    assert!(
        rx.try_recv().is_err(),
        "调用应当仍处于阻塞状态，而不是立即返回"
    );
    rx
}

fn recv<T>(rx: &mpsc::Receiver<T>) -> T {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("等待方必须在 5 秒内被唤醒")
}

#[test]
fn blocked_reader_is_woken_by_writer() {
    let fifo = BoundedBuffer::open(8).expect("创建缓冲区");
    let reader = fifo.clone();
    let rx = spawn_blocked(move || reader.read(8, true));

    assert_eq!(fifo.write(b"wake", false), Ok(4));
    assert_eq!(recv(&rx), Ok(b"wake".to_vec()));
    assert_eq!(fifo.status().expect("状态").length, 0);
}

#[test]
fn blocked_writer_is_woken_by_reader() {
    let fifo = BoundedBuffer::open(2).expect("创建缓冲区");
    fifo.write(b"ab", false).expect("写满");
    let writer = fifo.clone();
    let rx = spawn_blocked(move || writer.write(b"cd", true));

    assert_eq!(fifo.read(1, false).expect("读出"), b"a");
    assert_eq!(recv(&rx), Ok(1), "只腾出 1 字节，写者应短写 1 字节");
    assert_eq!(fifo.read(2, false).expect("读出"), b"bc");
}

#[test]
fn blocked_writer_is_woken_by_clear() {
    let fifo = BoundedBuffer::open(2).expect("创建缓冲区");
    fifo.write(b"ab", false).expect("写满");
    let writer = fifo.clone();
    let rx = spawn_blocked(move || writer.write(b"xy", true));

    fifo.clear().expect("清空");
    assert_eq!(recv(&rx), Ok(2));
    assert_eq!(fifo.read(2, false).expect("读出"), b"xy");
}

#[test]
fn cancellation_interrupts_blocked_reader_without_side_effects() {
    let fifo = BoundedBuffer::open(4).expect("创建缓冲区");
    let token = Cancellation::new();
    let reader = fifo.clone();
    let ctx = WaitContext::blocking().with_cancellation(token.child());
    let rx = spawn_blocked(move || reader.read_with(4, &ctx));

    assert!(token.cancel());
    assert_eq!(recv(&rx), Err(FifoError::Interrupted));

    let stats = fifo.stats().expect("统计");
    assert_eq!(stats.status.length, 0);
    assert_eq!(stats.reads, 0, "被打断的读取不得计入统计");
    fifo.write(b"ok", false).expect("打断后缓冲区仍然可用");
    assert_eq!(fifo.read(2, false).expect("读出"), b"ok");
}

#[test]
fn cancellation_interrupts_blocked_writer() {
    let fifo = BoundedBuffer::open(1).expect("创建缓冲区");
    fifo.write(b"z", false).expect("写满");
    let token = Cancellation::new();
    let writer = fifo.clone();
    let ctx = WaitContext::blocking().with_cancellation(token.clone());
    let rx = spawn_blocked(move || writer.write_with(b"late", &ctx));

    token.cancel();
    assert_eq!(recv(&rx), Err(FifoError::Interrupted));
    assert_eq!(fifo.read(4, false).expect("读出"), b"z", "原有数据保持不变");
}

#[test]
fn cancelled_token_does_not_block_ready_calls() {
    let fifo = BoundedBuffer::open(4).expect("创建缓冲区");
    let token = Cancellation::new();
    token.cancel();
    let ctx = WaitContext::blocking().with_cancellation(token);

    assert_eq!(fifo.write_with(b"go", &ctx), Ok(2), "无需等待的写入照常完成");
    assert_eq!(fifo.read_with(2, &ctx), Ok(b"go".to_vec()));
    assert_eq!(fifo.read_with(1, &ctx), Err(FifoError::Interrupted));
}

#[test]
fn one_token_interrupts_waiters_on_several_buffers() {
    let first = BoundedBuffer::open(1).expect("创建缓冲区");
    let second = BoundedBuffer::open(1).expect("创建缓冲区");
    let token = Cancellation::new();

    let ctx = WaitContext::blocking().with_cancellation(token.clone());
    let reader = first.clone();
    let rx_first = spawn_blocked(move || reader.read_with(1, &ctx));
    let ctx = WaitContext::blocking().with_cancellation(token.clone());
    let reader = second.clone();
    let rx_second = spawn_blocked(move || reader.read_with(1, &ctx));

    token.cancel();
    assert_eq!(recv(&rx_first), Err(FifoError::Interrupted));
    assert_eq!(recv(&rx_second), Err(FifoError::Interrupted));
}

#[test]
fn deadline_expires_with_timed_out() {
    let fifo = BoundedBuffer::open(4).expect("创建缓冲区");
    let deadline = Instant::now() + Duration::from_millis(30);
    let ctx = WaitContext::blocking().with_deadline(deadline);
    assert_eq!(fifo.read_with(1, &ctx), Err(FifoError::TimedOut));

    fifo.write(b"abcd", false).expect("写满");
    let ctx = WaitContext::blocking().with_timeout(Duration::from_millis(10));
    assert_eq!(fifo.write_with(b"e", &ctx), Err(FifoError::TimedOut));
    assert_eq!(fifo.status().expect("状态").length, 4);
}

#[test]
fn writer_arriving_before_deadline_wins() {
    let fifo = BoundedBuffer::open(4).expect("创建缓冲区");
    let reader = fifo.clone();
    let ctx = WaitContext::blocking().with_timeout(Duration::from_secs(10));
    let rx = spawn_blocked(move || reader.read_with(4, &ctx));
    fifo.write(b"in", false).expect("写入");
    assert_eq!(recv(&rx), Ok(b"in".to_vec()));
}

#[test]
fn close_releases_blocked_waiters() {
    let fifo = BoundedBuffer::open(1).expect("创建缓冲区");
    let reader = fifo.clone();
    let rx = spawn_blocked(move || reader.read(1, true));

    assert!(fifo.close());
    assert_eq!(recv(&rx), Err(FifoError::Closed));
}

/// `One` 策略下，搬运 0 字节的读者被唤醒后也必须把信号接力给下一个读者。
#[test]
fn wake_one_zero_length_reader_passes_the_baton() {
    let fifo = BoundedBuffer::with_policy(8, WakePolicy::One).expect("创建缓冲区");
    let zero = fifo.clone();
    let rx_zero = spawn_blocked(move || zero.read(0, true));
    let reader = fifo.clone();
    let rx_reader = spawn_blocked(move || reader.read(4, true));

    fifo.write(b"data", false).expect("写入");
    assert_eq!(recv(&rx_reader), Ok(b"data".to_vec()), "数据可读时读者不得滞留");

    // 若读者先被唤醒取走了全部数据，0 长度读者仍在等待非空，再补一个字节放行它。
    fifo.write(b"x", false).expect("写入");
    assert_eq!(recv(&rx_zero), Ok(Vec::new()));
}

/// 写侧对称场景：0 长度写者被唤醒后同样要接力给仍在等待空间的写者。
#[test]
fn wake_one_zero_length_writer_passes_the_baton() {
    let fifo = BoundedBuffer::with_policy(1, WakePolicy::One).expect("创建缓冲区");
    fifo.write(b"q", false).expect("写满");
    let zero = fifo.clone();
    let rx_zero = spawn_blocked(move || zero.write(b"", true));
    let writer = fifo.clone();
    let rx_writer = spawn_blocked(move || writer.write(b"z", true));

    assert_eq!(fifo.read(1, false).expect("读出"), b"q");
    assert_eq!(recv(&rx_writer), Ok(1), "有空间时写者不得滞留");

    assert_eq!(fifo.read(1, false).expect("读出"), b"z");
    assert_eq!(recv(&rx_zero), Ok(0));
}

/// 多写者写入带标签的字节序列、多读者并发取走，读出的多重集合必须与写入完全一致。
fn stress(policy: WakePolicy, capacity: usize, writers: u8, readers: usize, per_writer: usize) {
    let fifo = BoundedBuffer::with_policy(capacity, policy).expect("创建缓冲区");
    let total = usize::from(writers) * per_writer;
    let start = Arc::new(Barrier::new(usize::from(writers) + readers));

    let mut writer_handles = Vec::new();
    for tag in 0..writers {
        let fifo = fifo.clone();
        let start = Arc::clone(&start);
        writer_handles.push(thread::spawn(move || {
            start.wait();
            let payload = vec![tag; per_writer];
            let mut sent = 0;
            while sent < payload.len() {
                sent += fifo.write(&payload[sent..], true).expect("写入失败");
            }
        }));
    }

    let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(total));
    let stop = Cancellation::new();
    let mut reader_handles = Vec::new();
    for _ in 0..readers {
        let fifo = fifo.clone();
        let start = Arc::clone(&start);
        let remaining = Arc::clone(&remaining);
        let ctx = WaitContext::blocking().with_cancellation(stop.clone());
        let stop = stop.clone();
        reader_handles.push(thread::spawn(move || {
            start.wait();
            let mut seen: BTreeMap<u8, usize> = BTreeMap::new();
            loop {
                match fifo.read_with(3, &ctx) {
                    Ok(bytes) => {
                        for byte in &bytes {
                            *seen.entry(*byte).or_default() += 1;
                        }
                        let before = remaining
                            .fetch_sub(bytes.len(), std::sync::atomic::Ordering::SeqCst);
                        if before == bytes.len() {
                            stop.cancel();
                        }
                    }
                    Err(FifoError::Interrupted) => break,
                    Err(other) => panic!("读者遇到意外错误: {other}"),
                }
            }
            seen
        }));
    }

    for handle in writer_handles {
        handle.join().expect("写者线程不应 panic");
    }
    let mut merged: BTreeMap<u8, usize> = BTreeMap::new();
    for handle in reader_handles {
        for (tag, count) in handle.join().expect("读者线程不应 panic") {
            *merged.entry(tag).or_default() += count;
        }
    }

    assert_eq!(merged.len(), usize::from(writers));
    for tag in 0..writers {
        assert_eq!(merged.get(&tag), Some(&per_writer), "标签 {tag} 的字节有丢失或重复");
    }
    let stats = fifo.stats().expect("统计");
    assert_eq!(stats.bytes_written, total as u64);
    assert_eq!(stats.bytes_read, total as u64);
    assert_eq!(stats.status.length, 0);
}

#[test]
fn stress_wake_all_preserves_every_byte() {
    stress(WakePolicy::All, 16, 4, 3, 2_000);
}

#[test]
fn stress_wake_one_preserves_every_byte() {
    stress(WakePolicy::One, 7, 5, 4, 1_500);
}

#[test]
fn stress_total_within_capacity() {
    stress(WakePolicy::All, 64, 4, 2, 16);
}
