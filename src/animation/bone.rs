//! 骨骼选项与姿态空间

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// 骨骼选项，控制骨骼如何被驱动
    ///
    /// 位值与原生骨骼数据保持兼容。
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BoneOptions: u32 {
        /// 锁定旋转，冻结当前局部旋转
        const LOCK_ROTATION = 1;
        /// 由物理（刚体动力学）驱动
        const PHYSICS = 2;
        /// 由动画驱动
        const ANIMATE = 4;
    }
}

impl BoneOptions {
    #[inline]
    pub fn is_locked(self) -> bool {
        self.contains(Self::LOCK_ROTATION)
    }
}

/// 输入姿态的坐标空间
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseSpace {
    /// 矩阵相对于骨架根骨骼，直接替换当前姿态的局部矩阵
    SkeletonRoot,
    /// 局部旋转是相对于绑定姿态的增量，平移被忽略
    BindPoseRelative,
    /// 只包含局部旋转，平移被忽略
    RotationOnly,
}

impl PoseSpace {
    /// 原生接口使用的整数编码
    pub fn code(self) -> i32 {
        match self {
            Self::SkeletonRoot => 0,
            Self::BindPoseRelative => 1,
            Self::RotationOnly => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::SkeletonRoot),
            1 => Some(Self::BindPoseRelative),
            4 => Some(Self::RotationOnly),
            _ => None,
        }
    }
}
