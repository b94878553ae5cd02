//! 骨骼动画模块
//!
//! 提供骨架层级、双表示（局部/世界）姿态、绑定姿态与蒙皮矩阵计算，
//! 以及骨骼与场景节点之间的绑定。
//!
//! ## 功能特性
//!
//! - 骨架层级与骨骼选项（旋转锁定、物理驱动、动画驱动）
//! - 姿态的局部/世界矩阵按需同步
//! - 绑定姿态、逆绑定姿态与蒙皮姿态
//! - 从场景节点读写姿态
//! - 骨架合并
//!
//! ## 使用示例
//!
//! ```rust
//! use xr_skeleton::animation::{PoseSpace, Skeleton};
//! use glam::{Quat, Vec3};
//!
//! // 创建三根骨骼的链：root -> mid -> tip
//! let mut skeleton = Skeleton::new(&[-1, 0, 1]).unwrap();
//! let mut bind = skeleton.new_pose();
//! bind.set_local_position(1, Vec3::Y).unwrap();
//! bind.set_local_position(2, Vec3::Y).unwrap();
//! skeleton.set_bind_pose(&bind).unwrap();
//!
//! // 相对绑定姿态旋转中间骨骼
//! let mut delta = skeleton.new_pose();
//! delta.set_local_rotation(1, Quat::from_rotation_z(0.5)).unwrap();
//! skeleton.apply_pose(&mut delta, PoseSpace::BindPoseRelative).unwrap();
//!
//! let skin = skeleton.compute_skin_pose().unwrap();
//! assert_eq!(skin.bone_count(), 3);
//! ```

pub mod binding;
pub mod bone;
pub mod debug;
pub mod pose;
pub mod sink;
pub mod skeleton;
pub mod source;
pub mod system;

pub use binding::{NodeId, SceneGraph, SceneTree};
pub use bone::{BoneOptions, PoseSpace};
pub use debug::{DebugShape, GeometrySink, SkeletonGeometry};
pub use pose::{Pose, SyncState};
pub use sink::{SkeletonBuffer, SkinningSink};
pub use skeleton::{Skeleton, SkeletonId, SkeletonState};
pub use source::{BoneDesc, SkeletonDesc, SkeletonSource};
pub use system::{bone_pose_system, skin_pose_system};
