//! 骨骼姿态性能基准测试
//!
//! 测试姿态同步、蒙皮矩阵计算和场景节点读取的性能

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Mat4, Quat, Vec3};
use xr_skeleton::animation::{PoseSpace, SceneTree, Skeleton};

/// 构建一条 `count` 根骨骼的链
fn chain(count: usize) -> Skeleton {
    let parents: Vec<i32> = (0..count as i32).map(|i| i - 1).collect();
    let mut skeleton = Skeleton::new(&parents).unwrap();
    let mut bind = skeleton.new_pose();
    for i in 1..count {
        bind.set_local_position(i, Vec3::Y).unwrap();
    }
    skeleton.set_bind_pose(&bind).unwrap();
    skeleton
}

fn bench_pose_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_sync");

    for count in [16usize, 64, 256] {
        let skeleton = chain(count);
        group.bench_with_input(BenchmarkId::new("local_to_world", count), &count, |b, &count| {
            let mut pose = skeleton.new_pose();
            b.iter(|| {
                for i in 0..count {
                    pose.set_local_rotation(i, Quat::from_rotation_z(0.01)).unwrap();
                }
                pose.sync();
                black_box(pose.world_matrices().len())
            });
        });
    }

    group.finish();
}

fn bench_skin_pose(c: &mut Criterion) {
    let mut group = c.benchmark_group("skin_pose");

    for count in [16usize, 64, 256] {
        let mut skeleton = chain(count);
        let mut delta = skeleton.new_pose();
        group.bench_with_input(BenchmarkId::new("apply_and_skin", count), &count, |b, &count| {
            b.iter(|| {
                for i in 0..count {
                    delta.set_local_rotation(i, Quat::from_rotation_x(0.02)).unwrap();
                }
                skeleton.apply_pose(&mut delta, PoseSpace::BindPoseRelative).unwrap();
                black_box(skeleton.update_skin_pose())
            });
        });
    }

    group.finish();
}

fn bench_pose_from_bones(c: &mut Criterion) {
    let count = 64;
    let mut scene = SceneTree::new();
    let mut names = Vec::with_capacity(count);
    let root = scene.add_node("bone_0", None, Mat4::IDENTITY);
    names.push("bone_0".to_string());
    let mut parent = root;
    for i in 1..count {
        let name = format!("bone_{}", i);
        parent = scene.add_node(name.clone(), Some(parent), Mat4::from_translation(Vec3::Y));
        names.push(name);
    }
    let mut skeleton = Skeleton::from_hierarchy(&scene, root, &names).unwrap();

    c.bench_function("pose_from_bones_64", |b| {
        b.iter(|| {
            skeleton.pose_from_bones(&scene).unwrap();
            black_box(skeleton.pose_matrices().len())
        });
    });
}

criterion_group!(benches, bench_pose_sync, bench_skin_pose, bench_pose_from_bones);
criterion_main!(benches);
