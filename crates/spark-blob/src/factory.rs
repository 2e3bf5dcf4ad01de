use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::Buffer;
use crate::error::Result;

/// `BufferFactory` 是 Blob 增长时唯一的外部协作者：按需交付一块新缓冲。
///
/// # 设计初衷（Why）
/// - Blob 的核心逻辑与内存策略解耦：固定大小、几何增长、池化复用都只是工厂的不同实现；
/// - 工厂以 `Arc<dyn BufferFactory>` 注入，多个 Blob（以及它们的克隆）可以共享同一个工厂。
///
/// # 契约定义（What）
/// - `allocate` 返回一块新鲜存储上的缓冲，大小由工厂自行决定；
/// - 有状态的工厂需自行使用内部可变性（原子量、锁），因为调用只拿到 `&self`；
/// - 返回零字节缓冲会被 Blob 视为“停滞”，以 [`BlobError::FactoryStalled`](crate::BlobError::FactoryStalled) 结束增长；
/// - 资源不足时返回 [`BlobError::Exhausted`](crate::BlobError::Exhausted)，Blob 原样向上传播。
pub trait BufferFactory: Send + Sync + 'static {
    /// 交付一块新缓冲。
    fn allocate(&self) -> Result<Buffer>;
}

/// 每次交付固定大小的零初始化缓冲。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedSizeFactory {
    buffer_size: usize,
}

impl FixedSizeFactory {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl BufferFactory for FixedSizeFactory {
    fn allocate(&self) -> Result<Buffer> {
        Ok(Buffer::zeroed(self.buffer_size))
    }
}

/// 几何增长工厂：从 `initial_size` 起每次翻倍，封顶 `max_size`。
///
/// 对于小消息，前几块缓冲很小；大消息则迅速达到上限，缓冲数量按对数增长。
/// 例如 `GrowingFactory::new(1, 1024)` 依次交付 1、2、4、8…… 字节。
#[derive(Debug)]
pub struct GrowingFactory {
    next_size: AtomicUsize,
    max_size: usize,
}

impl GrowingFactory {
    /// `initial_size` 大于 `max_size` 时按 `max_size` 起步。
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            next_size: AtomicUsize::new(initial_size.min(max_size)),
            max_size,
        }
    }

    /// 下一次 `allocate` 将交付的大小。
    pub fn next_size(&self) -> usize {
        self.next_size.load(Ordering::Relaxed)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl BufferFactory for GrowingFactory {
    fn allocate(&self) -> Result<Buffer> {
        let max = self.max_size;
        let size = match self
            .next_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_mul(2).min(max))
            }) {
            Ok(previous) | Err(previous) => previous,
        };
        Ok(Buffer::zeroed(size))
    }
}

/// 将闭包包装为工厂，便于测试或临时策略直接注入。
pub struct FnFactory<F> {
    allocate: F,
}

impl<F> FnFactory<F>
where
    F: Fn() -> Result<Buffer> + Send + Sync + 'static,
{
    pub fn new(allocate: F) -> Self {
        Self { allocate }
    }
}

impl<F> BufferFactory for FnFactory<F>
where
    F: Fn() -> Result<Buffer> + Send + Sync + 'static,
{
    fn allocate(&self) -> Result<Buffer> {
        (self.allocate)()
    }
}

impl<F> fmt::Debug for FnFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory").finish_non_exhaustive()
    }
}
