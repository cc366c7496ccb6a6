//! 单线程无竞争路径的读写吞吐基准。
//!
//! 关注两件事：短写/短读的固定开销，以及“读出后前移剩余字节”在不同剩余长度下的代价。

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use globalfifo::{BoundedBuffer, WaitContext};

const CAPACITY: usize = 4096;

fn write_then_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_then_drain");
    for chunk in [16usize, 256, 4096] {
        let fifo = BoundedBuffer::open(CAPACITY).expect("创建缓冲区");
        let payload = vec![0xa5u8; chunk];
        let mut sink = vec![0u8; chunk];
        let ctx = WaitContext::non_blocking();
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, _| {
            b.iter(|| {
                let written = fifo.write(black_box(&payload), false).expect("写入");
                let read = fifo.read_into(&mut sink, &ctx).expect("读取");
                black_box((written, read));
            });
        });
    }
    group.finish();
}

fn partial_read_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_read_compaction");
    for resident in [64usize, 1024, 4032] {
        let fifo = BoundedBuffer::open(CAPACITY).expect("创建缓冲区");
        fifo.write(&vec![1u8; resident], false).expect("预填充");
        let ctx = WaitContext::non_blocking();
        let mut sink = [0u8; 32];
        group.bench_with_input(BenchmarkId::from_parameter(resident), &resident, |b, _| {
            b.iter(|| {
                let read = fifo.read_into(&mut sink, &ctx).expect("读取");
                fifo.write(&sink[..read], false).expect("回填");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, write_then_drain, partial_read_compaction);
criterion_main!(benches);
