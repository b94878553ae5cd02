//! 统一错误处理模块
//!
//! 提供骨骼/姿态子系统的错误类型定义
//!
//! ## 错误分类
//!
//! - **索引错误** (`IndexOutOfRange`): 骨骼索引越界，立即失败
//! - **参数错误** (`IllegalArgument`): 姿态与骨骼归属不匹配、数组长度与骨骼数量不符
//! - **记录并跳过**: 层级解析时找不到骨骼名称，只记录日志，不返回错误

use crate::config::ConfigError;
use thiserror::Error;

/// 骨骼系统错误类型
#[derive(Error, Debug)]
pub enum SkeletonError {
    #[error("Bone index {index} out of range (bone count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Skeleton description parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SkeletonError {
    /// 构造参数错误
    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalArgument(msg.into())
    }
}

/// 骨骼系统结果类型别名
pub type SkeletonResult<T> = Result<T, SkeletonError>;

/// 检查骨骼索引是否在 `0..count` 范围内
#[inline]
pub(crate) fn check_index(index: usize, count: usize) -> SkeletonResult<()> {
    if index < count {
        Ok(())
    } else {
        Err(SkeletonError::IndexOutOfRange { index, count })
    }
}

/// 检查扁平数组长度是否为 `count * stride`
#[inline]
pub(crate) fn check_len(what: &str, len: usize, count: usize, stride: usize) -> SkeletonResult<()> {
    if len == count * stride {
        Ok(())
    } else {
        Err(SkeletonError::IllegalArgument(format!(
            "{what} array has {len} floats, expected {} ({count} bones x {stride})",
            count * stride
        )))
    }
}
