//! Blob 的结构编辑。
//!
//! 每个操作先按自身语义增量调整 `length`/`total_size`/分界，再以 [`Partition::settle`]
//! 规整零长度状态，最后在调试构建下核对不变式。

use core::mem;

use tracing::debug;

use super::{Blob, Partition};
use crate::buffer::Buffer;
use crate::error::{BlobError, Result, SizeRequirement};

impl Blob {
    /// 在末尾追加一块容量缓冲；长度不变。
    pub fn append_buffer(&mut self, buffer: Buffer) {
        self.total_size += buffer.size();
        self.buffers.push(buffer);
        self.debug_check();
    }

    /// 在数据之后紧接着追加一块数据缓冲。
    ///
    /// 先裁掉最后一块数据缓冲的空闲尾部，使新字节与现有数据连续；
    /// 插入位置是原数据缓冲之后，容量缓冲保持在更后面。
    /// 零字节缓冲同样会被插入：长度大于 0 时它成为新的（零长度）最后一块数据缓冲，
    /// 长度为 0 时它停留在容量区的开头，长度仍为 0。
    pub fn append_data_buffer(&mut self, buffer: Buffer) {
        self.trim_last_data_buffer();
        let index = self.partition.num_data_buffers();
        let size = buffer.size();
        self.buffers.insert(index, buffer);
        self.total_size += size;
        self.length += size;
        self.partition = Partition::new(index + 1, size).settle(self.length);
        self.debug_check();
    }

    /// 在最前面插入一块数据缓冲，现有内容整体后移。
    ///
    /// 与 `insert_buffer(0, ..)` 的区别在于长度为 0 的情形：
    /// 这里新缓冲总是成为数据缓冲，`insert_buffer` 则把它当作容量。
    pub fn prepend_data_buffer(&mut self, buffer: Buffer) {
        let size = buffer.size();
        self.buffers.insert(0, buffer);
        self.total_size += size;
        self.partition = if self.length == 0 {
            Partition::new(1, size)
        } else {
            Partition::new(
                self.partition.num_data_buffers() + 1,
                self.partition.last_data_buffer_length(),
            )
        };
        self.length += size;
        self.partition = self.partition.settle(self.length);
        self.debug_check();
    }

    /// 在 `index` 处插入缓冲。
    ///
    /// `index` 落在数据缓冲之间（`index < num_data_buffers`）时新缓冲计入长度，
    /// 否则作为容量缓冲。
    ///
    /// # Errors
    /// `index > num_buffers()` 时返回 [`BlobError::IndexOutOfRange`]。
    pub fn insert_buffer(&mut self, index: usize, buffer: Buffer) -> Result<()> {
        check_insert_index(index, self.buffers.len())?;
        let size = buffer.size();
        self.buffers.insert(index, buffer);
        self.total_size += size;
        if index < self.partition.num_data_buffers() {
            self.length += size;
            self.partition = Partition::new(
                self.partition.num_data_buffers() + 1,
                self.partition.last_data_buffer_length(),
            );
        }
        self.debug_check();
        Ok(())
    }

    /// 移除并返回 `index` 处的缓冲。
    ///
    /// - 完整数据缓冲：长度减去其大小；
    /// - 最后一块数据缓冲：长度只减去其已用部分，前一块数据缓冲变为“满”的最后一块；
    /// - 容量缓冲：长度不变。
    ///
    /// # Errors
    /// `index >= num_buffers()` 时返回 [`BlobError::IndexOutOfRange`]。
    pub fn remove_buffer(&mut self, index: usize) -> Result<Buffer> {
        let len = self.buffers.len();
        if index >= len {
            return Err(BlobError::IndexOutOfRange { index, len });
        }
        let data = self.partition.num_data_buffers();
        let size = self.buffers[index].size();
        if index + 1 < data {
            self.length -= size;
            self.partition =
                Partition::new(data - 1, self.partition.last_data_buffer_length());
        } else if index + 1 == data {
            self.length -= self.partition.last_data_buffer_length();
            let last = if index > 0 {
                self.buffers[index - 1].size()
            } else {
                0
            };
            self.partition = Partition::new(data - 1, last);
        }
        let removed = self.buffers.remove(index);
        self.total_size -= size;
        self.partition = self.partition.settle(self.length);
        self.debug_check();
        Ok(removed)
    }

    /// 一次移除 `[index, index + count)`，逐块计长规则与 [`Blob::remove_buffer`] 相同。
    ///
    /// # Errors
    /// 区间超出缓冲序列时返回 [`BlobError::RangeOutOfBounds`]，Blob 保持不变。
    pub fn remove_buffers(&mut self, index: usize, count: usize) -> Result<()> {
        let len = self.buffers.len();
        let end = match index.checked_add(count) {
            Some(end) if end <= len => end,
            _ => return Err(BlobError::RangeOutOfBounds { index, count, len }),
        };
        if count == 0 {
            return Ok(());
        }

        let data = self.partition.num_data_buffers();
        let removed_size: usize = self.buffers[index..end].iter().map(Buffer::size).sum();
        if end < data {
            self.length -= removed_size;
            self.partition =
                Partition::new(data - count, self.partition.last_data_buffer_length());
        } else if index < data {
            self.length = self.buffers[..index].iter().map(Buffer::size).sum();
            let last = if index > 0 {
                self.buffers[index - 1].size()
            } else {
                0
            };
            self.partition = Partition::new(index, last);
        }
        self.buffers.drain(index..end);
        self.total_size -= removed_size;
        self.partition = self.partition.settle(self.length);
        self.debug_check();
        Ok(())
    }

    /// 丢弃全部容量缓冲；最后一块数据缓冲的空闲尾部仍计入 `total_size`。
    pub fn remove_unused_buffers(&mut self) {
        let data = self.partition.num_data_buffers();
        let dropped = self.buffers.len() - data;
        if dropped == 0 {
            return;
        }
        self.buffers.truncate(data);
        let total_size = self.buffers.iter().map(Buffer::size).sum();
        debug!(
            dropped,
            released_bytes = self.total_size - total_size,
            "blob dropped unused capacity buffers"
        );
        self.total_size = total_size;
        self.debug_check();
    }

    /// 清空全部缓冲。
    pub fn remove_all(&mut self) {
        self.buffers.clear();
        self.length = 0;
        self.total_size = 0;
        self.partition = Partition::EMPTY;
        self.debug_check();
    }

    /// 把最后一块数据缓冲替换为同 region、大小恰为已用部分的句柄。幂等。
    pub fn trim_last_data_buffer(&mut self) {
        if self.length == 0 {
            return;
        }
        let index = self.partition.num_data_buffers() - 1;
        let used = self.partition.last_data_buffer_length();
        let slot = &mut self.buffers[index];
        let slack = slot.size() - used;
        if slack == 0 {
            return;
        }
        slot.truncate(used);
        self.total_size -= slack;
        self.debug_check();
    }

    /// 将 `index` 处的缓冲与 `buffer` 原地交换；长度与缓冲数量不变。
    ///
    /// 交换进来的缓冲必须能占据该槽位：
    /// - 最后一块数据缓冲之前的槽位：大小必须完全一致；
    /// - 最后一块数据缓冲：大小至少为已用部分；
    /// - 容量槽位：任意大小。
    ///
    /// # Errors
    /// 下标越界返回 [`BlobError::IndexOutOfRange`]，大小不符返回 [`BlobError::SizeMismatch`]；
    /// 两种情况下都不做交换。
    pub fn swap_buffer_raw(&mut self, index: usize, buffer: &mut Buffer) -> Result<()> {
        let len = self.buffers.len();
        if index >= len {
            return Err(BlobError::IndexOutOfRange { index, len });
        }
        let data = self.partition.num_data_buffers();
        let current = self.buffers[index].size();
        let incoming = buffer.size();
        let required = if index + 1 < data {
            Some(SizeRequirement::Exactly(current))
        } else if index + 1 == data {
            Some(SizeRequirement::AtLeast(
                self.partition.last_data_buffer_length(),
            ))
        } else {
            None
        };
        let fits = match required {
            Some(SizeRequirement::Exactly(size)) => incoming == size,
            Some(SizeRequirement::AtLeast(size)) => incoming >= size,
            None => true,
        };
        if let (false, Some(required)) = (fits, required) {
            return Err(BlobError::SizeMismatch {
                index,
                required,
                actual: incoming,
            });
        }

        self.buffers[index].swap(buffer);
        self.total_size = self.total_size - current + incoming;
        self.debug_check();
        Ok(())
    }

    /// 接管 `source` 的全部缓冲与长度，`source` 变为空；`self` 的工厂绑定保留。
    pub fn move_buffers(&mut self, source: &mut Blob) {
        self.buffers = mem::take(&mut source.buffers);
        self.length = mem::take(&mut source.length);
        self.total_size = mem::take(&mut source.total_size);
        self.partition = mem::replace(&mut source.partition, Partition::EMPTY);
        self.debug_check();
        source.debug_check();
    }

    /// 以 `source` 的数据缓冲替换 `self` 的全部缓冲；`source` 保留其容量缓冲，长度归零。
    ///
    /// `source` 长度为 0 时不搬运任何缓冲，`self` 的长度归零、原有缓冲全部留作容量。
    pub fn move_data_buffers(&mut self, source: &mut Blob) {
        if source.length == 0 {
            self.length = 0;
            self.partition = Partition::EMPTY;
            self.debug_check();
            return;
        }
        let data = source.partition.num_data_buffers();
        let moved: Vec<Buffer> = source.buffers.drain(..data).collect();
        let moved_size: usize = moved.iter().map(Buffer::size).sum();
        source.total_size -= moved_size;

        self.buffers = moved;
        self.total_size = moved_size;
        self.length = mem::take(&mut source.length);
        self.partition = mem::replace(&mut source.partition, Partition::EMPTY);
        self.debug_check();
        source.debug_check();
    }

    /// 把 `source` 的数据缓冲接到 `self` 的数据之后（先裁掉 `self` 最后一块的空闲尾部）；
    /// `self` 原有的容量缓冲排在新数据之后。`source` 为空时什么也不做。
    pub fn move_and_append_data_buffers(&mut self, source: &mut Blob) {
        if source.length == 0 {
            return;
        }
        self.trim_last_data_buffer();

        let data = source.partition.num_data_buffers();
        let at = self.partition.num_data_buffers();
        let moved_size: usize = source.buffers[..data].iter().map(Buffer::size).sum();
        self.buffers.splice(at..at, source.buffers.drain(..data));
        self.total_size += moved_size;
        self.length += source.length;
        self.partition = Partition::new(at + data, source.partition.last_data_buffer_length());

        source.total_size -= moved_size;
        source.length = 0;
        source.partition = Partition::EMPTY;
        self.debug_check();
        source.debug_check();
    }
}

fn check_insert_index(index: usize, len: usize) -> Result<()> {
    if index > len {
        return Err(BlobError::IndexOutOfRange { index, len });
    }
    Ok(())
}
