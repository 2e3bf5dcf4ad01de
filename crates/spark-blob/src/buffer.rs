use core::{fmt, mem, ptr};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::error::{BlobError, Result};
use crate::region::Region;

/// `Buffer` 是指向共享 [`Region`] 的值语义句柄：一个 region 引用、一个起始偏移、一个报告大小。
///
/// # 设计初衷（Why）
/// - Blob 的编辑代数只搬运句柄，从不复制内容；句柄必须廉价可克隆，克隆即共享同一 region；
/// - 同一个 region 可能出现在多个 Blob 中，甚至在同一个 Blob 中出现两次（自别名），
///   因此相等性比较的是“身份”而非内容，用于识别别名关系。
///
/// # 结构设计（How）
/// - `region`：`Option<Arc<Region>>`，`None` 即空句柄，也是 `take`/`Default` 之后的确定状态；
/// - `offset`：句柄在 region 内的起始位置，使 [`Buffer::slice`] 可以表达“部分别名”；
/// - `size`：句柄对外暴露的字节数，恒满足 `offset + size <= region.capacity()`。
///
/// # 契约说明（What）
/// - 两个句柄相等，当且仅当它们引用同一个 region、起始偏移一致且大小一致；
/// - `swap`/`take` 为常数时间，不分配、不失败；
/// - 内容访问经由 region 内部的自旋锁，访问闭包内不得再访问同一 region 的内容；`as_ptr` 与 `Debug` 不加锁。
#[derive(Clone, Default)]
pub struct Buffer {
    region: Option<Arc<Region>>,
    offset: usize,
    size: usize,
}

impl Buffer {
    /// 空句柄：无 region，大小为 0。
    pub const fn new() -> Self {
        Self {
            region: None,
            offset: 0,
            size: 0,
        }
    }

    /// 分配一块 `size` 字节的零初始化 region，并返回覆盖整块 region 的句柄。
    pub fn zeroed(size: usize) -> Self {
        Self {
            region: Some(Arc::new(Region::zeroed(size))),
            offset: 0,
            size,
        }
    }

    /// 以现有 region 构造句柄。
    ///
    /// # Errors
    /// `size` 超过 region 容量时返回 [`BlobError::SizeExceedsCapacity`]。
    pub fn from_region(region: Arc<Region>, size: usize) -> Result<Self> {
        check_capacity(size, region.capacity())?;
        Ok(Self {
            region: Some(region),
            offset: 0,
            size,
        })
    }

    /// 报告大小。
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// 句柄在 region 内的起始偏移。
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 从起始偏移算起可用的物理容量；空句柄为 0。
    pub fn capacity(&self) -> usize {
        self.region
            .as_ref()
            .map_or(0, |region| region.capacity() - self.offset)
    }

    /// 共享所有权令牌本身，供调用方比较或再次共享 region。
    pub fn region(&self) -> Option<&Arc<Region>> {
        self.region.as_ref()
    }

    /// 首字节地址；空句柄返回空指针。
    ///
    /// 地址只用于身份比较与诊断，读写内容请使用 [`Buffer::with_slice`] 系列方法。
    pub fn as_ptr(&self) -> *const u8 {
        match &self.region {
            Some(region) => region.base_ptr().wrapping_add(self.offset),
            None => ptr::null(),
        }
    }

    /// 两个句柄是否引用同一个 region（不要求偏移或大小一致）。
    pub fn shares_region(&self, other: &Buffer) -> bool {
        match (&self.region, &other.region) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }

    /// 创建覆盖 `[offset, offset + len)` 的部分别名句柄，与 `self` 共享 region。
    ///
    /// # Errors
    /// 区间超出 `self.size()` 时返回 [`BlobError::OutOfBounds`]。
    pub fn slice(&self, offset: usize, len: usize) -> Result<Buffer> {
        check_range(offset, len, self.size)?;
        Ok(Buffer {
            region: self.region.clone(),
            offset: self.offset + offset,
            size: len,
        })
    }

    /// 创建起点相同、大小为 `len` 的别名句柄。Blob 的 trim 就是用它完成的。
    pub fn trimmed(&self, len: usize) -> Result<Buffer> {
        self.slice(0, len)
    }

    /// 调整报告大小，上限为物理容量。
    ///
    /// # Errors
    /// `size > self.capacity()` 时返回 [`BlobError::SizeExceedsCapacity`]，句柄保持不变。
    pub fn set_size(&mut self, size: usize) -> Result<()> {
        check_capacity(size, self.capacity())?;
        self.size = size;
        Ok(())
    }

    /// 缩小报告大小；`len >= size()` 时无效果。
    pub fn truncate(&mut self, len: usize) {
        if len < self.size {
            self.size = len;
        }
    }

    /// 一步将句柄重新绑定到新的 region 与大小。
    ///
    /// # Errors
    /// `size` 超过 region 容量时返回错误，原句柄保持不变。
    pub fn reset(&mut self, region: Arc<Region>, size: usize) -> Result<()> {
        check_capacity(size, region.capacity())?;
        self.region = Some(region);
        self.offset = 0;
        self.size = size;
        Ok(())
    }

    /// 与另一句柄交换 region、偏移与大小。
    pub fn swap(&mut self, other: &mut Buffer) {
        mem::swap(self, other);
    }

    /// 取走句柄，原位置留下空句柄。
    pub fn take(&mut self) -> Buffer {
        mem::take(self)
    }

    /// 以只读方式访问句柄覆盖的字节。
    pub fn with_slice<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.region {
            Some(region) => region.with_range(self.offset, self.size, f),
            None => f(&[]),
        }
    }

    /// 以可写方式访问句柄覆盖的字节。
    ///
    /// 接收 `&self`：内容属于共享 region，别名句柄同样能观察到写入结果。
    pub fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match &self.region {
            Some(region) => region.with_range_mut(self.offset, self.size, f),
            None => f(&mut []),
        }
    }

    /// 将句柄覆盖的全部字节置为 `byte`。
    pub fn fill(&self, byte: u8) {
        self.with_slice_mut(|bytes| bytes.fill(byte));
    }

    /// 从 `offset` 起读取 `dst.len()` 个字节。
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let len = dst.len();
        check_range(offset, len, self.size)?;
        self.with_slice(|bytes| dst.copy_from_slice(&bytes[offset..offset + len]));
        Ok(())
    }

    /// 从 `offset` 起写入 `src`。
    pub fn write_at(&self, offset: usize, src: &[u8]) -> Result<()> {
        check_range(offset, src.len(), self.size)?;
        self.with_slice_mut(|bytes| bytes[offset..offset + src.len()].copy_from_slice(src));
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.with_slice(<[u8]>::to_vec)
    }
}

impl From<BytesMut> for Buffer {
    fn from(bytes: BytesMut) -> Self {
        let size = bytes.len();
        Self {
            region: Some(Arc::new(Region::from_bytes(bytes))),
            offset: 0,
            size,
        }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(vec: Vec<u8>) -> Self {
        // 独占的 `Bytes` 可以零拷贝转回 `BytesMut`。
        let bytes = match Bytes::from(vec).try_into_mut() {
            Ok(bytes) => bytes,
            Err(shared) => BytesMut::from(&shared[..]),
        };
        Self::from(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(slice: &[u8]) -> Self {
        Self::from(BytesMut::from(slice))
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        let same_region = match (&self.region, &other.region) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        };
        same_region && self.offset == other.offset && self.size == other.size
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("ptr", &self.as_ptr())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .finish()
    }
}

fn check_capacity(size: usize, capacity: usize) -> Result<()> {
    if size > capacity {
        return Err(BlobError::SizeExceedsCapacity { size, capacity });
    }
    Ok(())
}

fn check_range(offset: usize, len: usize, available: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(()),
        _ => Err(BlobError::OutOfBounds {
            offset,
            len,
            available,
        }),
    }
}
