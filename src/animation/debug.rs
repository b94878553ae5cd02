//! 骨骼调试几何
//!
//! 为每根骨骼生成一个关节球体，为每对父子骨骼生成一段连接圆柱。
//! 几何以骨架根坐标系描述，由 [`GeometrySink`] 决定如何绘制。

use glam::{Mat4, Quat, Vec3};

use super::pose::Pose;
use super::skeleton::Skeleton;
use crate::config::DebugGeometryConfig;

/// 调试图元
#[derive(Clone, Debug, PartialEq)]
pub enum DebugShape {
    /// 关节球体
    Joint {
        bone: usize,
        center: Vec3,
        radius: f32,
    },
    /// 父子骨骼之间的圆柱，局部Y轴沿骨骼方向
    Segment {
        bone: usize,
        parent: usize,
        transform: Mat4,
        radius: f32,
        height: f32,
        segments: u32,
    },
}

/// 调试几何的接收端
pub trait GeometrySink {
    fn add_shape(&mut self, shape: DebugShape);
}

impl GeometrySink for Vec<DebugShape> {
    fn add_shape(&mut self, shape: DebugShape) {
        self.push(shape);
    }
}

/// 骨骼调试几何生成器
pub struct SkeletonGeometry;

impl SkeletonGeometry {
    /// 根据绑定姿态生成调试几何
    pub fn bind_pose<G: GeometrySink>(skeleton: &Skeleton, config: &DebugGeometryConfig, sink: &mut G) {
        Self::from_pose(skeleton.bind_pose(), config, sink);
    }

    /// 根据当前姿态生成调试几何
    pub fn current_pose<G: GeometrySink>(skeleton: &Skeleton, config: &DebugGeometryConfig, sink: &mut G) {
        Self::from_pose(skeleton.pose(), config, sink);
    }

    /// 根据任意姿态生成调试几何，零长度骨骼不生成圆柱
    pub fn from_pose<G: GeometrySink>(pose: &Pose, config: &DebugGeometryConfig, sink: &mut G) {
        let worlds = pose.world_matrices();
        for (bone, world) in worlds.iter().enumerate() {
            let center = world.w_axis.truncate();
            sink.add_shape(DebugShape::Joint {
                bone,
                center,
                radius: config.sphere_radius,
            });

            let Ok(Some(parent)) = pose.parent_index(bone) else {
                continue;
            };
            let start = worlds[parent].w_axis.truncate();
            let offset = center - start;
            let height = offset.length();
            if height <= f32::EPSILON {
                continue;
            }
            let rotation = Quat::from_rotation_arc(Vec3::NEG_Y, offset / height);
            sink.add_shape(DebugShape::Segment {
                bone,
                parent,
                transform: Mat4::from_rotation_translation(rotation, start + offset * 0.5),
                radius: config.cylinder_radius,
                height,
                segments: config.cylinder_segments,
            });
        }
    }
}
