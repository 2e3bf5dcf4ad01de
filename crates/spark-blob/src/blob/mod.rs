//! # blob 模块说明
//!
//! ## 角色定位（Why）
//! - [`Blob`] 把一条逻辑字节流表示为一串共享定长缓冲，长度与已分配容量解耦；
//! - 所有结构编辑只搬运 [`Buffer`] 句柄、调整大小与计数，从不检查或复制内容。
//!
//! ## 模块划分（How）
//! - `mod.rs`：结构体本身、构造、访问器、`set_length` 与不变式校验；
//! - `partition`：数据/容量分界的唯一计算入口；
//! - `edit`：插入、删除、追加、交换、跨 Blob 移动等结构编辑；
//! - `content`：按逻辑偏移读写字节。
//!
//! ## 不变式（What）
//! 每个公开的修改操作结束时都满足：
//! - `total_size == Σ buffers[i].size()`，`length <= total_size`；
//! - 分界满足 [`Partition`] 文档中的全部条件；
//! - 调试构建下以 `debug_assert!` 在每个修改操作末尾核对以上条件。

mod content;
mod edit;
mod partition;

use core::{fmt, mem};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::buffer::Buffer;
use crate::error::{BlobError, Result};
use crate::factory::BufferFactory;

pub use partition::Partition;

/// 由共享缓冲拼接而成的分段字节流。
///
/// # 教案式说明
/// - **意图 (Why)**：协议层需要在不复制的前提下拼接、前置、切分消息；
///   Blob 以句柄序列承载字节，编辑代价只与触及的缓冲数量相关。
/// - **结构 (How)**：
///   - `buffers`：逻辑字节按插入顺序排列；前 `num_data_buffers` 块为数据缓冲，其后为容量缓冲；
///   - `length`/`total_size`：逻辑长度与全部缓冲大小之和的缓存；
///   - `partition`：数据/容量分界；
///   - `factory`：可选的增长来源，不被 Blob 独占，克隆后共享。
/// - **契约 (What)**：
///   - 单线程数据结构，修改需要 `&mut self`；region 的引用计数是原子的，可跨线程释放；
///   - 违反前置条件（越界下标、无工厂增长等）以 `Err` 返回，Blob 状态不变；
///   - 增长中途失败时，已追加的缓冲作为容量保留，长度保持调用前的值。
#[derive(Clone, Default)]
pub struct Blob {
    buffers: Vec<Buffer>,
    length: usize,
    total_size: usize,
    partition: Partition,
    factory: Option<Arc<dyn BufferFactory>>,
}

impl Blob {
    /// 空 Blob，未绑定工厂，只能容纳显式追加的缓冲。
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定工厂的空 Blob，`set_length` 可按需增长。
    pub fn with_factory(factory: Arc<dyn BufferFactory>) -> Self {
        Self {
            factory: Some(factory),
            ..Self::default()
        }
    }

    /// 以现有缓冲构造 Blob：全部缓冲视为容量，长度为 0。
    pub fn from_buffers<I>(buffers: I, factory: Option<Arc<dyn BufferFactory>>) -> Self
    where
        I: IntoIterator<Item = Buffer>,
    {
        let buffers: Vec<Buffer> = buffers.into_iter().collect();
        let total_size = buffers.iter().map(Buffer::size).sum();
        let blob = Self {
            buffers,
            length: 0,
            total_size,
            partition: Partition::EMPTY,
            factory,
        };
        blob.debug_check();
        blob
    }

    /// 复制句柄序列（共享 region），但换用另一个工厂绑定。
    pub fn clone_with_factory(&self, factory: Option<Arc<dyn BufferFactory>>) -> Self {
        Self {
            buffers: self.buffers.clone(),
            length: self.length,
            total_size: self.total_size,
            partition: self.partition,
            factory,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// 全部缓冲大小之和。
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn num_data_buffers(&self) -> usize {
        self.partition.num_data_buffers()
    }

    /// 最后一块数据缓冲中承载逻辑字节的部分；长度为 0 时为 0。
    pub fn last_data_buffer_length(&self) -> usize {
        self.partition.last_data_buffer_length()
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, index: usize) -> Option<&Buffer> {
        self.buffers.get(index)
    }

    /// 数据缓冲前缀（最后一块可能只用了一部分，见 [`Blob::data_segments`]）。
    pub fn data_buffers(&self) -> &[Buffer] {
        &self.buffers[..self.partition.num_data_buffers()]
    }

    pub fn factory(&self) -> Option<&Arc<dyn BufferFactory>> {
        self.factory.as_ref()
    }

    /// 与另一 Blob 交换全部状态，包括工厂绑定。
    pub fn swap(&mut self, other: &mut Blob) {
        mem::swap(self, other);
    }

    /// 设置逻辑长度。
    ///
    /// # 执行逻辑（How）
    /// 1. `length == 0`：只改簿记，缓冲全部保留为容量；
    /// 2. `length > total_size`：反复向工厂索取缓冲并追加到末尾，直到容量足够；
    /// 3. 从下标 0 起重新定位分界，缓冲数量不变。
    ///
    /// # Errors
    /// - 需要增长但未绑定工厂：[`BlobError::NoFactory`]；
    /// - 工厂交付零字节缓冲：[`BlobError::FactoryStalled`]；
    /// - 工厂自身失败：原样返回；
    /// - 簿记数组无法扩容：[`BlobError::AllocationFailed`]。
    ///
    /// 失败时长度不变；失败前已经追加的缓冲保留为容量。
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        if length == 0 {
            self.length = 0;
            self.partition = Partition::EMPTY;
            self.debug_check();
            return Ok(());
        }
        if length > self.total_size {
            self.grow_to(length)?;
        }
        self.partition =
            Partition::locate(&self.buffers, length).ok_or_else(|| BlobError::Invariant {
                detail: format!(
                    "length {length} not reachable with total size {}",
                    self.total_size
                ),
            })?;
        self.length = length;
        self.debug_check();
        Ok(())
    }

    fn grow_to(&mut self, requested: usize) -> Result<()> {
        let Some(factory) = self.factory.clone() else {
            return Err(BlobError::NoFactory {
                requested,
                total_size: self.total_size,
            });
        };

        let mut allocated = 0usize;
        while self.total_size < requested {
            let buffer = match factory.allocate() {
                Ok(buffer) => buffer,
                Err(error) => {
                    warn!(
                        requested,
                        total_size = self.total_size,
                        error = %error,
                        "buffer factory failed while growing blob"
                    );
                    return Err(error);
                }
            };
            if buffer.is_empty() {
                let error = BlobError::FactoryStalled { requested };
                warn!(
                    requested,
                    total_size = self.total_size,
                    error = %error,
                    "buffer factory failed while growing blob"
                );
                return Err(error);
            }
            self.buffers
                .try_reserve(1)
                .map_err(|_| BlobError::AllocationFailed { additional: 1 })?;
            self.total_size += buffer.size();
            self.buffers.push(buffer);
            allocated += 1;
        }
        trace!(
            requested,
            allocated,
            total_size = self.total_size,
            "blob grew through buffer factory"
        );
        Ok(())
    }

    /// 独立核对缓存的长度、总大小与分界。
    ///
    /// # Errors
    /// 返回 [`BlobError::Invariant`]，描述第一处不一致。
    pub fn check_invariants(&self) -> Result<()> {
        self.partition
            .verify(&self.buffers, self.length, self.total_size)
            .map_err(|detail| BlobError::Invariant { detail })
    }

    #[inline]
    fn debug_check(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "{:?} on {:?}",
            self.check_invariants(),
            self
        );
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.buffers == other.buffers
    }
}

impl Eq for Blob {}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("length", &self.length)
            .field("total_size", &self.total_size)
            .field("partition", &self.partition)
            .field("buffers", &self.buffers)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}
