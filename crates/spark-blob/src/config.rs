//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 让部署方以声明式文档选择 Blob 的增长策略，而不是在代码里硬编码工厂类型；
//! - 统一校验入口：非法组合（零大小、起始大于上限）在构建工厂之前就被拒绝。
//!
//! ## 使用方式（How）
//! ```toml
//! kind = "growing"
//! initial_size = 64
//! max_size = 4096
//! ```
//! 经 [`FactoryConfig::from_toml_str`] 解析（需启用 `config-toml` 特性）后调用
//! [`FactoryConfig::build`]，得到可注入 [`Blob::with_factory`](crate::Blob::with_factory) 的工厂。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BlobError, Result};
use crate::factory::{BufferFactory, FixedSizeFactory, GrowingFactory};
use crate::pool::PooledBufferFactory;

/// 几何增长工厂未显式配置上限时使用的默认上限。
pub const DEFAULT_GROWING_MAX_SIZE: usize = 1024;

fn default_growing_max_size() -> usize {
    DEFAULT_GROWING_MAX_SIZE
}

/// 缓冲工厂配置。
///
/// 以 `kind` 字段区分策略，其余字段随策略变化。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactoryConfig {
    /// 每块缓冲大小相同。
    Fixed { buffer_size: usize },
    /// 从 `initial_size` 起翻倍，封顶 `max_size`。
    Growing {
        initial_size: usize,
        #[serde(default = "default_growing_max_size")]
        max_size: usize,
    },
    /// 定长缓冲池，可选驻留上限。
    Pooled {
        buffer_size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_resident_bytes: Option<usize>,
    },
}

impl FactoryConfig {
    /// 校验配置。
    ///
    /// # Errors
    /// - 任一缓冲大小为 0（工厂会交付空缓冲，增长永远无法推进）；
    /// - `initial_size > max_size`；
    /// - 驻留上限小于单块缓冲大小（池连一块缓冲都无法交付）。
    pub fn validate(&self) -> Result<()> {
        match *self {
            FactoryConfig::Fixed { buffer_size } => non_zero("buffer_size", buffer_size),
            FactoryConfig::Growing {
                initial_size,
                max_size,
            } => {
                non_zero("initial_size", initial_size)?;
                non_zero("max_size", max_size)?;
                if initial_size > max_size {
                    return Err(invalid(format!(
                        "initial_size {initial_size} exceeds max_size {max_size}"
                    )));
                }
                Ok(())
            }
            FactoryConfig::Pooled {
                buffer_size,
                max_resident_bytes,
            } => {
                non_zero("buffer_size", buffer_size)?;
                match max_resident_bytes {
                    Some(limit) if limit < buffer_size => Err(invalid(format!(
                        "max_resident_bytes {limit} is smaller than buffer_size {buffer_size}"
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }

    /// 校验后构建工厂。
    pub fn build(&self) -> Result<Arc<dyn BufferFactory>> {
        self.validate()?;
        let factory: Arc<dyn BufferFactory> = match *self {
            FactoryConfig::Fixed { buffer_size } => Arc::new(FixedSizeFactory::new(buffer_size)),
            FactoryConfig::Growing {
                initial_size,
                max_size,
            } => Arc::new(GrowingFactory::new(initial_size, max_size)),
            FactoryConfig::Pooled {
                buffer_size,
                max_resident_bytes: Some(limit),
            } => Arc::new(PooledBufferFactory::with_limit(buffer_size, limit)),
            FactoryConfig::Pooled {
                buffer_size,
                max_resident_bytes: None,
            } => Arc::new(PooledBufferFactory::new(buffer_size)),
        };
        Ok(factory)
    }

    /// 解析 TOML 文档并校验。
    #[cfg(feature = "config-toml")]
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: FactoryConfig =
            toml::from_str(document).map_err(|err| invalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn non_zero(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(invalid(format!("{field} must be greater than zero")));
    }
    Ok(())
}

fn invalid(detail: String) -> BlobError {
    BlobError::InvalidConfig { detail }
}
