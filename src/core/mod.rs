//! 核心模块
//!
//! 包含骨骼子系统共用的基础设施：
//! - `error` - 错误类型定义
//! - `macros` - 默认值宏

pub mod error;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{SkeletonError, SkeletonResult};
