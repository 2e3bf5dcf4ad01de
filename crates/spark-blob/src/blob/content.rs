use bytes::Bytes;

use super::Blob;
use crate::buffer::Buffer;
use crate::error::{BlobError, Result};

impl Blob {
    /// 按逻辑顺序遍历数据缓冲及其已用字节数。
    pub fn data_segments(&self) -> impl ExactSizeIterator<Item = (&Buffer, usize)> + '_ {
        let data = self.partition.num_data_buffers();
        let last = self.partition.last_data_buffer_length();
        self.buffers[..data]
            .iter()
            .enumerate()
            .map(move |(index, buffer)| {
                let used = if index + 1 == data { last } else { buffer.size() };
                (buffer, used)
            })
    }

    /// 从逻辑偏移 `offset` 起读满 `dst`。
    ///
    /// # Errors
    /// 区间超出逻辑长度时返回 [`BlobError::OutOfBounds`]。
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check_range(offset, dst.len())?;
        let mut cursor = 0usize;
        self.for_each_overlap(offset, dst.len(), |buffer, start, len| {
            buffer.with_slice(|bytes| {
                dst[cursor..cursor + len].copy_from_slice(&bytes[start..start + len]);
            });
            cursor += len;
        });
        Ok(())
    }

    /// 从逻辑偏移 `offset` 起写入 `src`；内容写入共享 region，别名句柄可见。
    ///
    /// # Errors
    /// 区间超出逻辑长度时返回 [`BlobError::OutOfBounds`]。
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_range(offset, src.len())?;
        let mut cursor = 0usize;
        self.for_each_overlap(offset, src.len(), |buffer, start, len| {
            buffer.with_slice_mut(|bytes| {
                bytes[start..start + len].copy_from_slice(&src[cursor..cursor + len]);
            });
            cursor += len;
        });
        Ok(())
    }

    /// 在数据末尾追加字节，必要时经工厂增长。
    pub fn append_bytes(&mut self, src: &[u8]) -> Result<()> {
        let offset = self.length;
        let length = offset
            .checked_add(src.len())
            .ok_or(BlobError::OutOfBounds {
                offset,
                len: src.len(),
                available: usize::MAX - offset,
            })?;
        self.set_length(length)?;
        self.write_at(offset, src)
    }

    /// 将逻辑字节流复制为连续的 `Vec<u8>`。
    pub fn copy_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length);
        for (buffer, used) in self.data_segments() {
            buffer.with_slice(|bytes| out.extend_from_slice(&bytes[..used]));
        }
        out
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.copy_to_vec())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.length => Ok(()),
            _ => Err(BlobError::OutOfBounds {
                offset,
                len,
                available: self.length,
            }),
        }
    }

    /// 对 `[offset, offset + len)` 与每个数据段的交集调用 `visit(buffer, 段内起点, 字节数)`。
    ///
    /// 每次回调只持有一个 region 的锁，自别名的两个槽位会被依次访问。
    fn for_each_overlap(
        &self,
        offset: usize,
        len: usize,
        mut visit: impl FnMut(&Buffer, usize, usize),
    ) {
        let end = offset + len;
        let mut position = 0usize;
        for (buffer, used) in self.data_segments() {
            if position >= end {
                break;
            }
            let segment_end = position + used;
            if segment_end > offset && used > 0 {
                let start = offset.max(position);
                let stop = end.min(segment_end);
                visit(buffer, start - position, stop - start);
            }
            position = segment_end;
        }
    }
}
