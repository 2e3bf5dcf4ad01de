use crate::buffer::Buffer;

/// 数据缓冲与容量缓冲的分界。
///
/// # 教案式说明
/// - **意图 (Why)**：Blob 的每个结构编辑都需要重新确定“前几块缓冲承载逻辑字节、最后一块用了多少”。
///   把这对派生量收敛到一个值类型和一个规范遍历 [`Partition::locate`] 上，
///   各个编辑操作只做增量调整，最终一律经 [`Partition::verify`] 对账，避免簿记在操作之间漂移。
/// - **契约 (What)**：对缓冲序列 `buffers`、逻辑长度 `length`：
///   - `length == 0` 时分界恒为 [`Partition::EMPTY`]；
///   - `length > 0` 时 `1 <= num_data_buffers <= buffers.len()`，前 `num_data_buffers - 1` 块
///     全部计入长度，最后一块计入 `last_data_buffer_length` 字节，二者之和等于 `length`；
///   - `last_data_buffer_length` 不超过最后一块数据缓冲的大小，且只有该缓冲本身为零字节时才允许为 0。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Partition {
    num_data_buffers: usize,
    last_data_buffer_length: usize,
}

impl Partition {
    /// 长度为 0 时的唯一分界。
    pub const EMPTY: Partition = Partition::new(0, 0);

    pub(crate) const fn new(num_data_buffers: usize, last_data_buffer_length: usize) -> Self {
        Self {
            num_data_buffers,
            last_data_buffer_length,
        }
    }

    pub fn num_data_buffers(&self) -> usize {
        self.num_data_buffers
    }

    pub fn last_data_buffer_length(&self) -> usize {
        self.last_data_buffer_length
    }

    /// 从下标 0 起累加缓冲大小，找到累计值首次达到 `length` 的位置。
    ///
    /// 途经的零字节缓冲计入数据缓冲数量；达到 `length` 之后的零字节缓冲不计入。
    /// `length` 超过全部缓冲大小之和时返回 `None`。
    pub fn locate(buffers: &[Buffer], length: usize) -> Option<Partition> {
        if length == 0 {
            return Some(Partition::EMPTY);
        }
        let mut cumulative = 0usize;
        for (index, buffer) in buffers.iter().enumerate() {
            let reached = cumulative + buffer.size();
            if reached >= length {
                return Some(Partition::new(index + 1, length - cumulative));
            }
            cumulative = reached;
        }
        None
    }

    /// 长度归零时把分界规整为 [`Partition::EMPTY`]。
    pub(crate) fn settle(self, length: usize) -> Partition {
        if length == 0 { Partition::EMPTY } else { self }
    }

    /// 以 `buffers` 为准独立核对分界、长度与总大小，返回第一处不一致的描述。
    pub(crate) fn verify(
        self,
        buffers: &[Buffer],
        length: usize,
        total_size: usize,
    ) -> Result<(), String> {
        let actual_total: usize = buffers.iter().map(Buffer::size).sum();
        if actual_total != total_size {
            return Err(format!(
                "cached total size {total_size} differs from buffer sum {actual_total}"
            ));
        }
        if length > total_size {
            return Err(format!("length {length} exceeds total size {total_size}"));
        }
        if length == 0 {
            return if self == Partition::EMPTY {
                Ok(())
            } else {
                Err(format!("zero length with partition {self:?}"))
            };
        }

        let k = self.num_data_buffers;
        let last = self.last_data_buffer_length;
        if k == 0 || k > buffers.len() {
            return Err(format!(
                "{k} data buffers out of range for {} buffers at length {length}",
                buffers.len()
            ));
        }
        let last_size = buffers[k - 1].size();
        if last > last_size {
            return Err(format!(
                "last data buffer length {last} exceeds its size {last_size}"
            ));
        }
        if last == 0 && last_size != 0 {
            return Err(format!(
                "last data buffer of size {last_size} holds no data"
            ));
        }
        let prefix: usize = buffers[..k - 1].iter().map(Buffer::size).sum();
        if prefix + last != length {
            return Err(format!(
                "full data buffers ({prefix}) plus last ({last}) differ from length {length}"
            ));
        }
        Ok(())
    }
}
