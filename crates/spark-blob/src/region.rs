use core::{fmt, mem};
use std::sync::Arc;

use bytes::BytesMut;
use spin::Mutex;

/// `RegionRecycler` 描述 region 在最后一个句柄释放时的回收入口。
///
/// # 设计初衷（Why）
/// - [`BufferFactory`](crate::BufferFactory) 只负责“交付”侧，不约束 region 何时、如何归还；
/// - 由于同一块 region 可能被多个 [`Buffer`](crate::Buffer) 句柄、甚至同一个 Blob 的多个槽位共享，
///   只有 `Arc` 引用计数归零的那一刻才能安全归还，回收逻辑因此落在 `Region::drop` 中。
///
/// # 使用方式（How）
/// - 池化工厂将自身内部状态封装为 `Arc<dyn RegionRecycler>`，在创建 region 时一并注入；
/// - 所有引用同一 region 的句柄全部释放后，`reclaim` 恰好被调用一次。
///
/// # 契约定义（What）
/// - **前置条件**：实现必须线程安全且不得 panic，否则 `Drop` 路径上的 panic 会直接终止进程；
/// - **后置条件**：`reclaim` 返回后，region 的存储已移交给实现者，可复用也可直接丢弃。
pub trait RegionRecycler: Send + Sync + 'static {
    /// 接收一块已无任何句柄引用的存储。
    fn reclaim(&self, reclaimed: ReclaimedRegion);
}

/// 一次回收动作所携带的上下文。
///
/// - `capacity`：region 创建时登记的物理容量，池侧据此维护统计；
/// - `bytes`：region 的底层存储，长度等于 `capacity`，内容保持释放前的样子。
#[derive(Debug)]
pub struct ReclaimedRegion {
    capacity: usize,
    bytes: BytesMut,
}

impl ReclaimedRegion {
    pub(crate) fn new(capacity: usize, bytes: BytesMut) -> Self {
        Self { capacity, bytes }
    }

    /// 本次回收的容量。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 取出底层存储。
    pub fn into_bytes(self) -> BytesMut {
        self.bytes
    }
}

/// `Region` 是一段固定容量、可被多个句柄共享的连续内存。
///
/// # 设计动机（Why）
/// - Blob 的全部结构编辑只移动句柄，从不复制内容；region 是内容真正所在之处，
///   它的寿命等于“最后一个持有者”的寿命；
/// - 别名句柄（同一 Blob 的两个槽位、或跨 Blob 共享）都可以写入同一块内存，
///   因此内容访问经由 `spin::Mutex` 串行化，保持 `Send + Sync` 而无需 `unsafe`。
///
/// # 结构设计（How）
/// - `bytes`：长度恒等于 `capacity` 的 `BytesMut`，创建后从不扩缩，首字节地址因此稳定；
/// - `base`：构造时记下的首字节地址，读取身份时无需加锁；
/// - `recycler`：可选的回收钩子，`Drop` 时把 `bytes` 交还给池。
///
/// # 契约说明（What）
/// - 内容访问闭包内不得再次访问同一 region 的内容（自旋锁不可重入，会自锁）；地址与容量不受此限；
/// - 并发写同一 region 的不同句柄之间的顺序由调用方负责，这里只保证不产生数据竞争。
pub struct Region {
    bytes: Mutex<BytesMut>,
    base: usize,
    capacity: usize,
    recycler: Option<Arc<dyn RegionRecycler>>,
}

impl Region {
    /// 分配 `capacity` 字节的零初始化 region。
    pub fn zeroed(capacity: usize) -> Self {
        Self::from_bytes(BytesMut::zeroed(capacity))
    }

    /// 以现有存储构造 region，容量取 `bytes.len()`（而非 `bytes.capacity()`）。
    pub fn from_bytes(bytes: BytesMut) -> Self {
        let capacity = bytes.len();
        let base = bytes.as_ptr() as usize;
        Self {
            bytes: Mutex::new(bytes),
            base,
            capacity,
            recycler: None,
        }
    }

    /// 构造携带回收钩子的 region，供池化工厂使用。
    pub fn with_recycler(bytes: BytesMut, recycler: Arc<dyn RegionRecycler>) -> Self {
        let capacity = bytes.len();
        let base = bytes.as_ptr() as usize;
        Self {
            bytes: Mutex::new(bytes),
            base,
            capacity,
            recycler: Some(recycler),
        }
    }

    /// 物理容量。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 首字节地址，仅用于身份比较与诊断。不加锁，内容访问闭包内也可调用。
    pub(crate) fn base_ptr(&self) -> *const u8 {
        self.base as *const u8
    }

    /// 以只读方式访问 `[offset, offset + len)`。调用方已保证区间合法。
    pub(crate) fn with_range<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> R {
        let guard = self.bytes.lock();
        f(&guard[offset..offset + len])
    }

    /// 以可写方式访问 `[offset, offset + len)`。调用方已保证区间合法。
    pub(crate) fn with_range_mut<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> R {
        let mut guard = self.bytes.lock();
        f(&mut guard[offset..offset + len])
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // 引用计数已归零，`get_mut` 不会与任何句柄竞争。
        if let Some(recycler) = self.recycler.take() {
            let bytes = mem::take(self.bytes.get_mut());
            recycler.reclaim(ReclaimedRegion::new(self.capacity, bytes));
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("capacity", &self.capacity)
            .field("recyclable", &self.recycler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CountingRecycler {
        events: StdMutex<Vec<usize>>,
    }

    impl RegionRecycler for CountingRecycler {
        fn reclaim(&self, reclaimed: ReclaimedRegion) {
            assert_eq!(reclaimed.capacity(), reclaimed.into_bytes().len());
            self.events.lock().expect("mutex poisoned").push(1);
        }
    }

    #[test]
    fn recycler_runs_once_after_last_handle() {
        let recycler = Arc::new(CountingRecycler::default());
        let region = Arc::new(Region::with_recycler(BytesMut::zeroed(8), recycler.clone()));
        let alias = Arc::clone(&region);
        drop(region);
        assert!(recycler.events.lock().expect("mutex poisoned").is_empty());
        drop(alias);
        assert_eq!(*recycler.events.lock().expect("mutex poisoned"), vec![1]);
    }

    #[test]
    fn capacity_tracks_length_not_allocation() {
        let mut bytes = BytesMut::with_capacity(64);
        bytes.extend_from_slice(&[7; 5]);
        let region = Region::from_bytes(bytes);
        assert_eq!(region.capacity(), 5);
        region.with_range(0, 5, |slice| assert_eq!(slice, &[7; 5]));
    }

    #[test]
    fn base_ptr_is_readable_while_locked() {
        let region = Region::zeroed(4);
        let outside = region.base_ptr();
        let inside = region.with_range_mut(0, 4, |slice| {
            slice[0] = 1;
            region.base_ptr()
        });
        assert_eq!(inside, outside);
        assert!(!inside.is_null());
    }
}
