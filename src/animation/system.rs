//! 骨骼ECS系统
//!
//! - `bone_pose_system`：从场景节点拉取动画驱动骨骼的局部变换
//! - `skin_pose_system`：计算蒙皮矩阵并推送到各骨架的输出端

use bevy_ecs::prelude::*;

use super::binding::SceneTree;
use super::bone::BoneOptions;
use super::skeleton::{Skeleton, SkeletonState};

/// 从场景树拉取 `ANIMATE` 骨骼的姿态
pub fn bone_pose_system(scene: Res<SceneTree>, mut query: Query<(Entity, &mut Skeleton)>) {
    for (entity, mut skeleton) in query.iter_mut() {
        if skeleton.owner().is_none() {
            continue;
        }
        if let Err(err) = skeleton.pose_from_bones_masked(&*scene, BoneOptions::ANIMATE) {
            tracing::warn!(target: "skeleton", "Failed to pull pose for {:?}: {}", entity, err);
        }
    }
}

/// 为已建立绑定姿态的骨架更新蒙皮矩阵
pub fn skin_pose_system(mut query: Query<&mut Skeleton>) {
    for mut skeleton in query.iter_mut() {
        if skeleton.state() != SkeletonState::Unbound {
            skeleton.update_skin_pose();
        }
    }
}
