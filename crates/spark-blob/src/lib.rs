//! `spark-blob` 提供以共享定长缓冲拼接而成的分段字节流 [`Blob`]。
//!
//! # 模块定位（Why）
//! - 协议栈在组帧、前置报头、插入时间戳、转发消息时需要大量结构性编辑；
//!   若字节流是一块连续内存，每次编辑都意味着一次复制。
//! - `Blob` 把字节流表示为一串 [`Buffer`] 句柄，编辑只搬运句柄与调整簿记，
//!   同一块内存可以同时出现在多个 Blob 中，甚至在同一个 Blob 中出现两次。
//!
//! # 设计概要（How）
//! - `region`/`buffer`：以 `Arc<Region>` 共享的定长内存与其值语义句柄；
//! - `factory`/`pool`：`BufferFactory` 能力接口及固定大小、几何增长、池化三种实现，
//!   池化实现借助 `RegionRecycler` 在最后一个句柄释放时回收存储；
//! - `blob`：长度与容量解耦的核心数据结构，分界计算收敛到 [`Partition`]；
//! - `config`：以 serde/TOML 声明工厂策略。
//!
//! # 契约（What）
//! - `Blob` 是单线程数据结构；`Buffer`、`Region` 与全部工厂满足 `Send + Sync`；
//! - 违反前置条件的操作返回 [`BlobError`]，不会 panic，也不会破坏不变式；
//! - 调试构建在每个修改操作末尾核对不变式。

mod blob;
mod buffer;
pub mod config;
pub mod error;
mod factory;
mod pool;
mod region;

pub use blob::{Blob, Partition};
pub use buffer::Buffer;
pub use config::FactoryConfig;
pub use error::{BlobError, Result, SizeRequirement};
pub use factory::{BufferFactory, FixedSizeFactory, FnFactory, GrowingFactory};
pub use pool::{PoolStats, PooledBufferFactory};
pub use region::{ReclaimedRegion, Region, RegionRecycler};
