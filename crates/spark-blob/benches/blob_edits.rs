use criterion::{BatchSize, Criterion, black_box};
use spark_blob::{Blob, Buffer, FixedSizeFactory, PooledBufferFactory};
use std::{env, sync::Arc, time::Duration};

/// 基准：Blob 的典型编辑路径。
///
/// # 设计背景（Why）
/// - Blob 的卖点是“编辑只搬运句柄”；这里盯住增长、清零重用、前置报头与跨 Blob 拼接的成本，
///   一旦某个操作退化为按字节复制或重复分配，基准会立即回归。
///
/// # 逻辑解析（How）
/// - `set_length_reuse`：增长到 64 KiB 后反复清零再设回，稳态下不应再触发工厂；
/// - `pooled_growth`：每轮新建 Blob 并增长，缓冲来自池，region 释放后回到自由链表；
/// - `prepend_and_append`：模拟在消息前插报头、再把整条消息接到输出流后面。
fn bench_blob_edits(c: &mut Criterion) {
    c.bench_function("set_length_reuse", |b| {
        let mut blob = Blob::with_factory(Arc::new(FixedSizeFactory::new(4096)));
        blob.set_length(64 * 1024).expect("预热增长");
        b.iter(|| {
            blob.set_length(0).expect("清零");
            blob.set_length(black_box(64 * 1024)).expect("恢复长度");
        });
    });

    c.bench_function("pooled_growth", |b| {
        let pool = Arc::new(PooledBufferFactory::new(4096));
        b.iter(|| {
            let mut blob = Blob::with_factory(pool.clone());
            blob.set_length(black_box(32 * 1024)).expect("池化增长");
            black_box(blob.num_buffers())
        });
    });

    c.bench_function("prepend_and_append", |b| {
        b.iter_batched(
            || {
                let mut message = Blob::with_factory(Arc::new(FixedSizeFactory::new(1024)));
                message.append_bytes(&[7u8; 3000]).expect("填充消息");
                (message, Blob::new())
            },
            |(mut message, mut output)| {
                message.prepend_data_buffer(Buffer::from(&b"HDR:"[..]));
                output.move_and_append_data_buffers(&mut message);
                black_box(output.length())
            },
            BatchSize::SmallInput,
        );
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_blob_edits(&mut criterion);
    criterion.final_summary();
}
