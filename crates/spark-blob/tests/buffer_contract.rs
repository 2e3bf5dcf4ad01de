//! `buffer_contract` 集成测试：聚焦 `Buffer` 句柄与共享 region 的生命周期契约。
//!
//! # 测试总览（Why）
//! - 校验句柄的身份相等、部分别名、重绑定与移出后的空状态；
//! - 以 `RecordingRecycler` 观察 region 回收事件，验证“最后一个持有者释放时恰好回收一次”。

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use spark_blob::{BlobError, Buffer, ReclaimedRegion, Region, RegionRecycler};

/// `RecordingRecycler`：测试场景下用于捕获回收事件的探针实现。
///
/// - 利用 `Mutex<Vec<(usize, Vec<u8>)>>` 保存每一次 `reclaim` 的容量与回收时的内容；
/// - `take_events` 在断言前清空事件队列，确保各个测试相互独立。
#[derive(Default)]
struct RecordingRecycler {
    events: Mutex<Vec<(usize, Vec<u8>)>>,
}

impl RecordingRecycler {
    fn take_events(&self) -> Vec<(usize, Vec<u8>)> {
        self.events
            .lock()
            .expect("mutex poisoned")
            .drain(..)
            .collect()
    }
}

impl RegionRecycler for RecordingRecycler {
    fn reclaim(&self, reclaimed: ReclaimedRegion) {
        let capacity = reclaimed.capacity();
        let bytes = reclaimed.into_bytes().to_vec();
        self.events
            .lock()
            .expect("mutex poisoned")
            .push((capacity, bytes));
    }
}

fn recycled_region(recycler: &Arc<RecordingRecycler>, capacity: usize) -> Arc<Region> {
    let hook: Arc<dyn RegionRecycler> = recycler.clone();
    Arc::new(Region::with_recycler(BytesMut::zeroed(capacity), hook))
}

/// 多个句柄（含部分别名）共享同一 region，只在最后一个句柄释放时回收一次，且内容保持写入结果。
#[test]
fn region_is_reclaimed_once_after_every_alias_drops() {
    let recycler = Arc::new(RecordingRecycler::default());
    let buffer = Buffer::from_region(recycled_region(&recycler, 4), 4).expect("绑定 region");
    let tail = buffer.slice(2, 2).expect("部分别名");
    tail.write_at(0, b"xy").expect("写入尾部");

    drop(buffer);
    assert!(recycler.take_events().is_empty(), "别名仍存活时不得回收");
    drop(tail);
    assert_eq!(recycler.take_events(), vec![(4, b"\0\0xy".to_vec())]);
}

/// `reset` 一步重绑定 region 与大小，原 region 随即失去该持有者。
#[test]
fn reset_rebinds_region_and_size() {
    let recycler = Arc::new(RecordingRecycler::default());
    let mut buffer = Buffer::from_region(recycled_region(&recycler, 8), 8).expect("绑定 region");
    let fresh = Arc::new(Region::zeroed(16));

    buffer.reset(Arc::clone(&fresh), 10).expect("重绑定");
    assert_eq!(buffer.size(), 10);
    assert_eq!(buffer.capacity(), 16);
    assert!(Arc::ptr_eq(buffer.region().expect("存在 region"), &fresh));
    assert_eq!(recycler.take_events().len(), 1);

    let err = buffer
        .reset(Arc::new(Region::zeroed(2)), 3)
        .expect_err("大小超过容量");
    assert_eq!(
        err,
        BlobError::SizeExceedsCapacity {
            size: 3,
            capacity: 2
        }
    );
    assert_eq!(buffer.size(), 10, "失败的重绑定不改变句柄");
}

/// 相等性比较身份：同 region、同偏移、同大小。
#[test]
fn equality_tracks_region_offset_and_size() {
    let region = Arc::new(Region::zeroed(6));
    let lhs = Buffer::from_region(Arc::clone(&region), 6).expect("绑定");
    let rhs = Buffer::from_region(Arc::clone(&region), 6).expect("绑定");
    assert_eq!(lhs, rhs);
    assert_ne!(lhs, lhs.slice(1, 5).expect("偏移别名"));
    assert_ne!(lhs, lhs.trimmed(5).expect("缩小别名"));
    assert_eq!(lhs.slice(1, 2).expect("别名"), rhs.slice(1, 2).expect("别名"));
    assert!(lhs.shares_region(&rhs.slice(3, 3).expect("别名")));
}

/// `swap` 交换全部身份信息；`take` 留下空句柄。
#[test]
fn swap_and_take_are_total() {
    let mut lhs = Buffer::from(vec![1u8, 2, 3]);
    let mut rhs = Buffer::new();
    let lhs_ptr = lhs.as_ptr();

    lhs.swap(&mut rhs);
    assert!(lhs.as_ptr().is_null());
    assert_eq!(rhs.as_ptr(), lhs_ptr);
    assert_eq!(rhs.to_vec(), vec![1, 2, 3]);

    let taken = rhs.take();
    assert_eq!(rhs, Buffer::default());
    assert_eq!(taken.size(), 3);
}

/// 字节访问严格限定在句柄覆盖的范围内。
#[test]
fn content_access_is_bounded_by_size() {
    let buffer = Buffer::zeroed(8).trimmed(3).expect("缩小别名");
    buffer.fill(0x5A);
    let mut out = [0u8; 2];
    buffer.read_at(1, &mut out).expect("区间内读取");
    assert_eq!(out, [0x5A, 0x5A]);

    assert_eq!(
        buffer.write_at(2, &[1, 2]),
        Err(BlobError::OutOfBounds {
            offset: 2,
            len: 2,
            available: 3
        })
    );
    let mut whole = buffer.clone();
    whole.set_size(8).expect("恢复至物理容量");
    assert_eq!(whole.to_vec(), vec![0x5A, 0x5A, 0x5A, 0, 0, 0, 0, 0]);
}

/// 句柄可以跨线程释放，引用计数是原子的。
#[test]
fn handles_drop_from_other_threads() {
    let recycler = Arc::new(RecordingRecycler::default());
    let buffer = Buffer::from_region(recycled_region(&recycler, 4), 4).expect("绑定");
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let alias = buffer.clone();
            std::thread::spawn(move || drop(alias))
        })
        .collect();
    for worker in workers {
        worker.join().expect("线程正常退出");
    }
    assert!(recycler.take_events().is_empty());
    drop(buffer);
    assert_eq!(recycler.take_events().len(), 1);
}

/// 内容访问闭包内读取别名句柄的地址与调试输出不会自锁。
///
/// 在工作线程中执行，超时即判定为卡死，避免回归时整个测试进程挂起。
#[test]
fn identity_is_readable_inside_content_access() {
    let (done, finished) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let recycler = Arc::new(RecordingRecycler::default());
        for buffer in [
            Buffer::zeroed(8),
            Buffer::from_region(recycled_region(&recycler, 8), 8).expect("构造池化句柄"),
        ] {
            let alias = buffer.clone();
            let tail = buffer.slice(2, 4).expect("部分别名");
            let observed = buffer.with_slice_mut(|bytes| {
                bytes[0] = 0xAB;
                let rendered = format!("{alias:?}");
                (
                    alias.as_ptr() == buffer.as_ptr(),
                    tail.as_ptr() == buffer.as_ptr().wrapping_add(2),
                    rendered.contains("size: 8"),
                )
            });
            assert_eq!(observed, (true, true, true));
            assert_eq!(alias.to_vec()[0], 0xAB);
        }
        done.send(()).expect("主线程仍在等待");
    });
    finished
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("闭包内读取身份信息不应卡死");
}
