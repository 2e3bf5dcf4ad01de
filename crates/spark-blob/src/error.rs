//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总 Blob、缓冲句柄与缓冲工厂在契约被违反或资源耗尽时的全部失败语义；
//! - 每个变体都附带足以复现问题的数值上下文（索引、长度、容量），便于排障。
//!
//! ## 设计要求（What）
//! - 派生 [`thiserror::Error`]，兼容 `std::error::Error` 生态；
//! - 通过 [`BlobError::code`] 暴露稳定的 `blob.*` 错误码，日志与告警以码值而非文案聚合。

use thiserror::Error;

/// 稳定错误码集合。
///
/// 码值遵循 `<域>.<语义>` 约定，一经发布不得修改，只允许新增。
pub mod codes {
    pub const INDEX_OUT_OF_RANGE: &str = "blob.index_out_of_range";
    pub const RANGE_OUT_OF_BOUNDS: &str = "blob.range_out_of_bounds";
    pub const NO_FACTORY: &str = "blob.no_factory";
    pub const FACTORY_STALLED: &str = "blob.factory_stalled";
    pub const EXHAUSTED: &str = "blob.exhausted";
    pub const ALLOCATION_FAILED: &str = "blob.allocation_failed";
    pub const OUT_OF_BOUNDS: &str = "blob.out_of_bounds";
    pub const SIZE_EXCEEDS_CAPACITY: &str = "blob.size_exceeds_capacity";
    pub const SIZE_MISMATCH: &str = "blob.size_mismatch";
    pub const INVALID_CONFIG: &str = "blob.invalid_config";
    pub const INVARIANT: &str = "blob.invariant";
}

/// `spark-blob` 的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：Blob 的结构编辑大多是纯内存簿记，唯一的“外部”失败来源是缓冲工厂；
///   其余错误均为调用方违反前置条件。将两类失败放进同一个枚举，调用方可以用 `?` 一路传播。
/// - **契约 (What)**：
///   - 返回错误的操作保证 Blob 仍满足不变式，且未对调用方可见状态做部分修改；
///     唯一例外是 [`BlobError::Exhausted`]/[`BlobError::FactoryStalled`] 等增长期错误：
///     失败前已经追加的缓冲会作为容量缓冲保留下来；
///   - 所有变体均为 `Send + Sync + 'static`，可以跨线程传递。
/// - **设计权衡 (Trade-offs)**：工厂耗尽原因使用 `String` 承载，牺牲一次分配换取可读的排障信息。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BlobError {
    /// 缓冲索引越界。
    #[error("buffer index {index} is out of range for {len} buffers")]
    IndexOutOfRange { index: usize, len: usize },

    /// `[index, index + count)` 区间超出缓冲序列。
    #[error("buffer range starting at {index} with {count} buffers exceeds {len} buffers")]
    RangeOutOfBounds {
        index: usize,
        count: usize,
        len: usize,
    },

    /// 需要增长但 Blob 没有绑定缓冲工厂。
    #[error("cannot grow blob to {requested} bytes: total size is {total_size} and no buffer factory is bound")]
    NoFactory { requested: usize, total_size: usize },

    /// 工厂在增长过程中交付了零字节缓冲，继续循环将永不终止。
    #[error("buffer factory returned an empty buffer while growing to {requested} bytes")]
    FactoryStalled { requested: usize },

    /// 工厂拒绝继续分配（例如池达到驻留上限）。
    #[error("buffer factory exhausted: {detail}")]
    Exhausted { detail: String },

    /// Blob 自身的缓冲簿记数组无法扩容。
    #[error("failed to reserve bookkeeping space for {additional} more buffers")]
    AllocationFailed { additional: usize },

    /// 字节区间超出逻辑长度或缓冲大小。
    #[error("byte range {offset}..{offset}+{len} exceeds available {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// 句柄报告的大小超过了底层 region 的物理容量。
    #[error("buffer size {size} exceeds region capacity {capacity}")]
    SizeExceedsCapacity { size: usize, capacity: usize },

    /// `swap_buffer_raw` 交换进来的缓冲无法占据该槽位。
    #[error("buffer of size {actual} cannot occupy slot {index} (requires {required})")]
    SizeMismatch {
        index: usize,
        required: SizeRequirement,
        actual: usize,
    },

    /// 缓冲工厂配置非法。
    #[error("invalid buffer factory configuration: {detail}")]
    InvalidConfig { detail: String },

    /// 不变式校验失败，只会由 [`crate::Blob::check_invariants`] 返回。
    #[error("blob invariant violated: {detail}")]
    Invariant { detail: String },
}

/// 槽位对缓冲大小的要求，用于 [`BlobError::SizeMismatch`]。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeRequirement {
    /// 最后一个数据缓冲之前的槽位必须大小完全一致。
    Exactly(usize),
    /// 最后一个数据缓冲至少要容纳已用字节。
    AtLeast(usize),
}

impl core::fmt::Display for SizeRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SizeRequirement::Exactly(size) => write!(f, "exactly {size} bytes"),
            SizeRequirement::AtLeast(size) => write!(f, "at least {size} bytes"),
        }
    }
}

impl BlobError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            BlobError::IndexOutOfRange { .. } => codes::INDEX_OUT_OF_RANGE,
            BlobError::RangeOutOfBounds { .. } => codes::RANGE_OUT_OF_BOUNDS,
            BlobError::NoFactory { .. } => codes::NO_FACTORY,
            BlobError::FactoryStalled { .. } => codes::FACTORY_STALLED,
            BlobError::Exhausted { .. } => codes::EXHAUSTED,
            BlobError::AllocationFailed { .. } => codes::ALLOCATION_FAILED,
            BlobError::OutOfBounds { .. } => codes::OUT_OF_BOUNDS,
            BlobError::SizeExceedsCapacity { .. } => codes::SIZE_EXCEEDS_CAPACITY,
            BlobError::SizeMismatch { .. } => codes::SIZE_MISMATCH,
            BlobError::InvalidConfig { .. } => codes::INVALID_CONFIG,
            BlobError::Invariant { .. } => codes::INVARIANT,
        }
    }

    /// 是否属于资源类失败（工厂耗尽或簿记分配失败）。
    ///
    /// 上层若实现重试/退避，应只针对这类错误；其余变体都是调用方缺陷，重试没有意义。
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            BlobError::Exhausted { .. } | BlobError::AllocationFailed { .. }
        )
    }
}

/// 本 crate 的结果别名。
pub type Result<T, E = BlobError> = core::result::Result<T, E>;
