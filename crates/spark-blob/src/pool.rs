use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use spin::Mutex;
use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::error::{BlobError, Result};
use crate::factory::BufferFactory;
use crate::region::{ReclaimedRegion, Region, RegionRecycler};

/// `PooledBufferFactory` 交付固定大小的缓冲，并在 region 的最后一个句柄释放时回收其存储。
///
/// # 模块角色（Why）
/// - Blob 在消息处理路径上反复增长、清空，若每次都向全局分配器申请定长块，
///   分配次数与消息数量成正比；池化后稳态下几乎不再分配；
/// - 回收时机由 [`Region`] 的 `Drop` 决定，调用方无需显式归还，
///   即使缓冲被多个 Blob 共享、或在同一 Blob 中自别名，也只会在最后一个持有者释放时回收一次。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<BytesMut>>` 作为自由链表，分配时优先弹出复用块；
/// - `PoolMetrics` 以原子计数跟踪累计分配、驻留、可复用字节数与活跃租约，`statistics` 读取快照；
/// - 可选的 `max_resident_bytes` 限制驻留总量，超限时返回 [`BlobError::Exhausted`]
///   并累加 `failed_acquisitions`。
///
/// # 契约说明（What）
/// - **线程安全**：克隆共享同一个池，所有状态由自旋锁与原子量保护；
/// - **后置条件**：交付的缓冲大小恒为 `buffer_size`，内容为全零（复用块在交付前清零）；
/// - **统计口径**：`resident_bytes = 活跃租约容量 + available_bytes`。
///
/// # 设计权衡（Trade-offs）
/// - 驻留上限的检查与计数通过一次 `fetch_update` 完成，并发分配不会越过上限；
/// - `shrink_to_fit` 采取“清空自由链表”的简单策略，便于在峰值过后一次性归还内存。
#[derive(Clone)]
pub struct PooledBufferFactory {
    inner: Arc<PoolInner>,
}

/// 池统计快照。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// 池创建以来向全局分配器申请的累计字节数。
    pub allocated_bytes: usize,
    /// 当前由池负责的字节数（活跃 + 空闲）。
    pub resident_bytes: usize,
    /// 自由链表中可直接复用的字节数。
    pub available_bytes: usize,
    /// 尚未回收的 region 数量。
    pub active_leases: usize,
    /// 因驻留上限被拒绝的分配次数。
    pub failed_acquisitions: u64,
    /// 自由链表长度。
    pub free_slots: usize,
}

impl PooledBufferFactory {
    /// 创建不限驻留总量的池。
    pub fn new(buffer_size: usize) -> Self {
        Self::build(buffer_size, None)
    }

    /// 创建驻留总量不超过 `max_resident_bytes` 的池。
    pub fn with_limit(buffer_size: usize, max_resident_bytes: usize) -> Self {
        Self::build(buffer_size, Some(max_resident_bytes))
    }

    fn build(buffer_size: usize, max_resident_bytes: Option<usize>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_size,
                max_resident_bytes,
                free_list: Mutex::new(Vec::new()),
                metrics: PoolMetrics::default(),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// 释放自由链表中的全部存储，返回归还的字节数。
    pub fn shrink_to_fit(&self) -> usize {
        self.inner.shrink_free_list()
    }

    pub fn statistics(&self) -> PoolStats {
        self.inner.snapshot()
    }
}

impl BufferFactory for PooledBufferFactory {
    fn allocate(&self) -> Result<Buffer> {
        let bytes = self.inner.acquire_bytes()?;
        let recycler: Arc<dyn RegionRecycler> = self.inner.clone();
        let region = Arc::new(Region::with_recycler(bytes, recycler));
        Buffer::from_region(region, self.inner.buffer_size)
    }
}

impl core::fmt::Debug for PooledBufferFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledBufferFactory")
            .field("buffer_size", &self.inner.buffer_size)
            .field("max_resident_bytes", &self.inner.max_resident_bytes)
            .field("stats", &self.inner.snapshot())
            .finish()
    }
}

struct PoolInner {
    buffer_size: usize,
    max_resident_bytes: Option<usize>,
    free_list: Mutex<Vec<BytesMut>>,
    metrics: PoolMetrics,
}

impl PoolInner {
    /// 从自由链表或堆上获取一块 `buffer_size` 字节的存储。
    fn acquire_bytes(&self) -> Result<BytesMut> {
        let reused = self.free_list.lock().pop();
        let bytes = match reused {
            Some(mut bytes) => {
                bytes.fill(0);
                self.metrics.decrease_available(self.buffer_size);
                bytes
            }
            None => {
                self.reserve_resident()?;
                self.metrics
                    .allocated_bytes
                    .fetch_add(self.buffer_size, Ordering::Relaxed);
                trace!(
                    buffer_size = self.buffer_size,
                    resident_bytes = self.metrics.resident_bytes.load(Ordering::Relaxed),
                    "buffer pool allocated fresh storage"
                );
                BytesMut::zeroed(self.buffer_size)
            }
        };
        self.metrics.active_leases.fetch_add(1, Ordering::Relaxed);
        Ok(bytes)
    }

    fn reserve_resident(&self) -> Result<()> {
        let size = self.buffer_size;
        let limit = self.max_resident_bytes;
        let reserved = self.metrics.resident_bytes.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| {
                let next = current.checked_add(size)?;
                match limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            },
        );
        match reserved {
            Ok(_) => Ok(()),
            Err(resident) => {
                self.metrics
                    .failed_acquisitions
                    .fetch_add(1, Ordering::Relaxed);
                Err(BlobError::Exhausted {
                    detail: format!(
                        "pool of {size}-byte buffers holds {resident} bytes, limit is {}",
                        limit.unwrap_or(usize::MAX)
                    ),
                })
            }
        }
    }

    fn shrink_free_list(&self) -> usize {
        let released: usize = {
            let mut list = self.free_list.lock();
            let released = list.len() * self.buffer_size;
            list.clear();
            released
        };
        self.metrics.decrease_available(released);
        saturating_sub(&self.metrics.resident_bytes, released);
        debug!(released, "buffer pool shrank free list");
        released
    }

    fn snapshot(&self) -> PoolStats {
        let free_slots = self.free_list.lock().len();
        PoolStats {
            allocated_bytes: self.metrics.allocated_bytes.load(Ordering::Relaxed),
            resident_bytes: self.metrics.resident_bytes.load(Ordering::Relaxed),
            available_bytes: self.metrics.available_bytes.load(Ordering::Relaxed),
            active_leases: self.metrics.active_leases.load(Ordering::Relaxed),
            failed_acquisitions: self.metrics.failed_acquisitions.load(Ordering::Relaxed),
            free_slots,
        }
    }
}

impl RegionRecycler for PoolInner {
    fn reclaim(&self, reclaimed: ReclaimedRegion) {
        saturating_sub(&self.metrics.active_leases, 1);
        let capacity = reclaimed.capacity();
        self.metrics
            .available_bytes
            .fetch_add(capacity, Ordering::Relaxed);
        self.free_list.lock().push(reclaimed.into_bytes());
    }
}

#[derive(Default)]
struct PoolMetrics {
    allocated_bytes: AtomicUsize,
    resident_bytes: AtomicUsize,
    available_bytes: AtomicUsize,
    active_leases: AtomicUsize,
    failed_acquisitions: AtomicU64,
}

impl PoolMetrics {
    fn decrease_available(&self, bytes: usize) {
        saturating_sub(&self.available_bytes, bytes);
    }
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}
