//! 骨骼姿态
//!
//! 每根骨骼同时保存局部矩阵（相对父骨骼）和世界矩阵（相对骨架根）。
//! 任一时刻只有一种表示是权威的，另一种在 [`Pose::sync`] 时重新推导：
//!
//! - 修改局部矩阵后，按索引顺序（父骨骼总在子骨骼之前）自上而下重新计算世界矩阵
//! - 修改世界矩阵后，局部矩阵由父骨骼世界矩阵的逆乘以自身世界矩阵得到
//!
//! 所有读取接口都会先同步，不会读到过期数据。

use std::borrow::Cow;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use super::skeleton::SkeletonId;
use crate::core::error::{check_index, check_len, SkeletonError, SkeletonResult};

/// 局部/世界两种表示的同步状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// 两种表示一致
    Synced,
    /// 局部矩阵被修改，世界矩阵过期
    LocalDirty,
    /// 世界矩阵被修改，局部矩阵过期
    WorldDirty,
}

/// 骨骼姿态 - 存储所有骨骼的变换状态
///
/// 姿态属于创建它的骨架，不能在骨架之间共享。骨骼只有旋转和平移，不建模缩放。
#[derive(Clone, Debug)]
pub struct Pose {
    skeleton: SkeletonId,
    parents: Arc<[Option<usize>]>,
    local: Vec<Mat4>,
    world: Vec<Mat4>,
    changed: Vec<bool>,
    state: SyncState,
}

impl Pose {
    /// 创建所有骨骼为单位矩阵的姿态
    pub(crate) fn new(skeleton: SkeletonId, parents: Arc<[Option<usize>]>) -> Self {
        let bone_count = parents.len();
        Self {
            skeleton,
            parents,
            local: vec![Mat4::IDENTITY; bone_count],
            world: vec![Mat4::IDENTITY; bone_count],
            changed: vec![false; bone_count],
            state: SyncState::Synced,
        }
    }

    /// 所属骨架
    pub fn skeleton_id(&self) -> SkeletonId {
        self.skeleton
    }

    /// 骨骼数量，创建后不可变
    pub fn bone_count(&self) -> usize {
        self.parents.len()
    }

    pub fn parent_index(&self, bone: usize) -> SkeletonResult<Option<usize>> {
        check_index(bone, self.bone_count())?;
        Ok(self.parents[bone])
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
    }

    // ------------------------------------------------------------------
    // 同步
    // ------------------------------------------------------------------

    /// 同步局部与世界表示
    ///
    /// 没有修改时为空操作；连续调用两次结果相同。
    pub fn sync(&mut self) {
        match self.state {
            SyncState::Synced => {}
            SyncState::LocalDirty => {
                for i in 0..self.local.len() {
                    self.world[i] = match self.parents[i] {
                        Some(p) => self.world[p] * self.local[i],
                        None => self.local[i],
                    };
                }
            }
            SyncState::WorldDirty => {
                for i in 0..self.world.len() {
                    self.local[i] = match self.parents[i] {
                        Some(p) => self.world[p].inverse() * self.world[i],
                        None => self.world[i],
                    };
                }
            }
        }
        self.state = SyncState::Synced;
    }

    /// 不修改自身地读取已同步的世界矩阵
    pub fn world_matrices(&self) -> Cow<'_, [Mat4]> {
        match self.state {
            SyncState::LocalDirty => Cow::Owned(worlds_from_locals(&self.parents, &self.local)),
            _ => Cow::Borrowed(&self.world),
        }
    }

    /// 不修改自身地读取已同步的局部矩阵
    pub fn local_matrices(&self) -> Cow<'_, [Mat4]> {
        match self.state {
            SyncState::WorldDirty => Cow::Owned(locals_from_worlds(&self.parents, &self.world)),
            _ => Cow::Borrowed(&self.local),
        }
    }

    // ------------------------------------------------------------------
    // 局部空间
    // ------------------------------------------------------------------

    /// 设置骨骼相对父骨骼的矩阵
    pub fn set_local_matrix(&mut self, bone: usize, matrix: Mat4) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.begin_local_edit();
        self.local[bone] = matrix;
        self.changed[bone] = true;
        Ok(())
    }

    pub fn local_matrix(&mut self, bone: usize) -> SkeletonResult<Mat4> {
        check_index(bone, self.bone_count())?;
        self.sync();
        Ok(self.local[bone])
    }

    /// 只替换局部旋转，保留局部平移
    pub fn set_local_rotation(&mut self, bone: usize, rotation: Quat) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.begin_local_edit();
        let translation = self.local[bone].w_axis.truncate();
        self.local[bone] = Mat4::from_rotation_translation(rotation.normalize(), translation);
        self.changed[bone] = true;
        Ok(())
    }

    /// 只替换局部平移，保留局部旋转
    pub fn set_local_position(&mut self, bone: usize, position: Vec3) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.begin_local_edit();
        self.local[bone].w_axis = position.extend(1.0);
        self.changed[bone] = true;
        Ok(())
    }

    pub fn local_rotation(&mut self, bone: usize) -> SkeletonResult<Quat> {
        Ok(rotation_of(&self.local_matrix(bone)?))
    }

    pub fn local_position(&mut self, bone: usize) -> SkeletonResult<Vec3> {
        Ok(self.local_matrix(bone)?.w_axis.truncate())
    }

    /// 批量设置局部旋转，每根骨骼4个浮点数 (x, y, z, w)
    pub fn set_local_rotations(&mut self, rotations: &[f32]) -> SkeletonResult<()> {
        check_len("rotation", rotations.len(), self.bone_count(), 4)?;
        self.begin_local_edit();
        for (i, q) in rotations.chunks_exact(4).enumerate() {
            let translation = self.local[i].w_axis.truncate();
            let rotation = Quat::from_xyzw(q[0], q[1], q[2], q[3]).normalize();
            self.local[i] = Mat4::from_rotation_translation(rotation, translation);
            self.changed[i] = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 世界空间（相对骨架根）
    // ------------------------------------------------------------------

    /// 设置骨骼相对骨架根的矩阵
    pub fn set_world_matrix(&mut self, bone: usize, matrix: Mat4) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.begin_world_edit();
        self.world[bone] = matrix;
        self.changed[bone] = true;
        Ok(())
    }

    pub fn world_matrix(&mut self, bone: usize) -> SkeletonResult<Mat4> {
        check_index(bone, self.bone_count())?;
        self.sync();
        Ok(self.world[bone])
    }

    pub fn world_rotation(&mut self, bone: usize) -> SkeletonResult<Quat> {
        Ok(rotation_of(&self.world_matrix(bone)?))
    }

    pub fn world_position(&mut self, bone: usize) -> SkeletonResult<Vec3> {
        Ok(self.world_matrix(bone)?.w_axis.truncate())
    }

    /// 批量设置世界旋转，每根骨骼4个浮点数 (x, y, z, w)
    ///
    /// 旋转和平移是独立通道，世界平移保持不变。
    pub fn set_world_rotations(&mut self, rotations: &[f32]) -> SkeletonResult<()> {
        check_len("rotation", rotations.len(), self.bone_count(), 4)?;
        self.begin_world_edit();
        for (i, q) in rotations.chunks_exact(4).enumerate() {
            let translation = self.world[i].w_axis.truncate();
            let rotation = Quat::from_xyzw(q[0], q[1], q[2], q[3]).normalize();
            self.world[i] = Mat4::from_rotation_translation(rotation, translation);
            self.changed[i] = true;
        }
        Ok(())
    }

    /// 批量设置世界平移，每根骨骼3个浮点数
    pub fn set_world_positions(&mut self, positions: &[f32]) -> SkeletonResult<()> {
        check_len("position", positions.len(), self.bone_count(), 3)?;
        self.begin_world_edit();
        for (i, p) in positions.chunks_exact(3).enumerate() {
            self.world[i].w_axis = Vec3::new(p[0], p[1], p[2]).extend(1.0);
            self.changed[i] = true;
        }
        Ok(())
    }

    /// 设置根骨骼的世界平移，根骨骼的子树随之平移
    ///
    /// 其他根骨骼（父索引为 -1 的非0骨骼）不受影响。
    pub fn set_position(&mut self, position: Vec3) -> SkeletonResult<()> {
        check_index(0, self.bone_count())?;
        self.begin_local_edit();
        self.local[0].w_axis = position.extend(1.0);
        self.changed[0] = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 变更标记
    // ------------------------------------------------------------------

    /// 骨骼自上次被消费后是否被修改过
    pub fn is_changed(&self, bone: usize) -> SkeletonResult<bool> {
        check_index(bone, self.bone_count())?;
        Ok(self.changed[bone])
    }

    pub fn mark_changed(&mut self, bone: usize) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.changed[bone] = true;
        Ok(())
    }

    pub fn clear_changed(&mut self) {
        self.changed.fill(false);
    }

    pub(crate) fn take_changed(&mut self, bone: usize) -> bool {
        std::mem::replace(&mut self.changed[bone], false)
    }

    // ------------------------------------------------------------------
    // 整体运算
    // ------------------------------------------------------------------

    /// 深拷贝另一个同拓扑姿态的矩阵和变更标记
    pub fn copy_from(&mut self, other: &Pose) -> SkeletonResult<()> {
        self.check_same_size(other)?;
        self.local.copy_from_slice(&other.local);
        self.world.copy_from_slice(&other.world);
        self.changed.copy_from_slice(&other.changed);
        self.state = other.state;
        Ok(())
    }

    /// 每根骨骼：`world = world * other.world`
    ///
    /// 当前姿态与逆绑定姿态组合即为蒙皮姿态。
    pub fn combine(&mut self, other: &Pose) -> SkeletonResult<()> {
        self.check_same_size(other)?;
        self.sync();
        let other_world = other.world_matrices();
        for (m, o) in self.world.iter_mut().zip(other_world.iter()) {
            *m = *m * *o;
        }
        self.state = SyncState::WorldDirty;
        Ok(())
    }

    /// 每根骨骼：`world = inverse(other.world)`
    pub fn inverse_of(&mut self, other: &Pose) -> SkeletonResult<()> {
        self.check_same_size(other)?;
        let other_world = other.world_matrices();
        for (m, o) in self.world.iter_mut().zip(other_world.iter()) {
            *m = o.inverse();
        }
        self.state = SyncState::WorldDirty;
        Ok(())
    }

    /// 按骨骼索引顺序输出扁平的世界矩阵数组（每根骨骼16个浮点数，列主序）
    pub fn world_matrix_array(&mut self) -> Vec<f32> {
        self.sync();
        bytemuck::cast_slice::<Mat4, f32>(&self.world).to_vec()
    }

    /// 按骨骼索引顺序输出扁平的局部矩阵数组
    pub fn local_matrix_array(&mut self) -> Vec<f32> {
        self.sync();
        bytemuck::cast_slice::<Mat4, f32>(&self.local).to_vec()
    }

    /// 从扁平数组设置局部矩阵
    pub fn set_local_matrix_array(&mut self, matrices: &[f32]) -> SkeletonResult<()> {
        check_len("matrix", matrices.len(), self.bone_count(), 16)?;
        self.begin_local_edit();
        for (i, m) in matrices.chunks_exact(16).enumerate() {
            self.local[i] = Mat4::from_cols_slice(m);
            self.changed[i] = true;
        }
        Ok(())
    }

    /// 从扁平数组设置世界矩阵
    pub fn set_world_matrix_array(&mut self, matrices: &[f32]) -> SkeletonResult<()> {
        check_len("matrix", matrices.len(), self.bone_count(), 16)?;
        self.begin_world_edit();
        for (i, m) in matrices.chunks_exact(16).enumerate() {
            self.world[i] = Mat4::from_cols_slice(m);
            self.changed[i] = true;
        }
        Ok(())
    }

    /// 两个姿态的世界矩阵在容差内是否相等
    pub fn abs_diff_eq(&self, other: &Pose, max_abs_diff: f32) -> bool {
        self.bone_count() == other.bone_count()
            && self
                .world_matrices()
                .iter()
                .zip(other.world_matrices().iter())
                .all(|(a, b)| a.abs_diff_eq(*b, max_abs_diff))
    }

    fn check_same_size(&self, other: &Pose) -> SkeletonResult<()> {
        if self.bone_count() == other.bone_count() {
            Ok(())
        } else {
            Err(SkeletonError::IllegalArgument(format!(
                "pose has {} bones, expected {}",
                other.bone_count(),
                self.bone_count()
            )))
        }
    }

    /// 修改局部表示前，先把待处理的世界修改落实到局部
    fn begin_local_edit(&mut self) {
        if self.state == SyncState::WorldDirty {
            self.sync();
        }
        self.state = SyncState::LocalDirty;
    }

    fn begin_world_edit(&mut self) {
        if self.state == SyncState::LocalDirty {
            self.sync();
        }
        self.state = SyncState::WorldDirty;
    }
}

fn worlds_from_locals(parents: &[Option<usize>], local: &[Mat4]) -> Vec<Mat4> {
    let mut world: Vec<Mat4> = Vec::with_capacity(local.len());
    for (i, m) in local.iter().enumerate() {
        let w = match parents[i] {
            Some(p) => world[p] * *m,
            None => *m,
        };
        world.push(w);
    }
    world
}

fn locals_from_worlds(parents: &[Option<usize>], world: &[Mat4]) -> Vec<Mat4> {
    world
        .iter()
        .enumerate()
        .map(|(i, m)| match parents[i] {
            Some(p) => world[p].inverse() * *m,
            None => *m,
        })
        .collect()
}

/// 取矩阵的旋转部分（骨骼不含缩放）
pub(crate) fn rotation_of(matrix: &Mat4) -> Quat {
    Quat::from_mat4(matrix).normalize()
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-4;

    fn chain_pose() -> Pose {
        let parents: Arc<[Option<usize>]> = Arc::from(vec![None, Some(0), Some(1)]);
        Pose::new(SkeletonId::next(), parents)
    }

    #[test]
    fn test_new_pose_is_identity() {
        let mut pose = chain_pose();
        assert_eq!(pose.bone_count(), 3);
        assert_eq!(pose.sync_state(), SyncState::Synced);
        for i in 0..3 {
            assert_eq!(pose.world_matrix(i).unwrap(), Mat4::IDENTITY);
            assert!(!pose.is_changed(i).unwrap());
        }
    }

    #[test]
    fn test_local_to_world_chain() {
        let mut pose = chain_pose();
        pose.set_local_position(1, Vec3::Y).unwrap();
        pose.set_local_position(2, Vec3::Y).unwrap();
        assert_eq!(pose.sync_state(), SyncState::LocalDirty);

        let tip = pose.world_position(2).unwrap();
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), EPS));
        assert_eq!(pose.sync_state(), SyncState::Synced);
    }

    #[test]
    fn test_root_world_equals_local() {
        let mut pose = chain_pose();
        let m = Mat4::from_rotation_translation(Quat::from_rotation_x(0.3), Vec3::new(1.0, 2.0, 3.0));
        pose.set_local_matrix(0, m).unwrap();
        pose.sync();
        assert!(pose.world_matrix(0).unwrap().abs_diff_eq(m, EPS));
    }

    #[test]
    fn test_world_to_local() {
        let mut pose = chain_pose();
        pose.set_world_matrix(0, Mat4::from_translation(Vec3::X)).unwrap();
        pose.set_world_matrix(1, Mat4::from_translation(Vec3::new(1.0, 3.0, 0.0))).unwrap();
        let local = pose.local_position(1).unwrap();
        assert!(local.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), EPS));
    }

    #[test]
    fn test_world_edit_keeps_children_in_place() {
        let mut pose = chain_pose();
        pose.set_local_position(1, Vec3::Y).unwrap();
        pose.set_local_position(2, Vec3::Y).unwrap();
        pose.sync();

        pose.set_world_matrix(1, Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0))).unwrap();
        // 子骨骼世界矩阵保持不变，局部矩阵重新推导
        let tip_world = pose.world_position(2).unwrap();
        assert!(tip_world.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), EPS));
        let tip_local = pose.local_position(2).unwrap();
        assert!(tip_local.abs_diff_eq(Vec3::new(0.0, -3.0, 0.0), EPS));
    }

    #[test]
    fn test_out_of_range() {
        let mut pose = chain_pose();
        assert!(matches!(
            pose.set_local_matrix(3, Mat4::IDENTITY),
            Err(SkeletonError::IndexOutOfRange { index: 3, count: 3 })
        ));
        assert!(pose.world_matrix(7).is_err());
        assert!(pose.is_changed(3).is_err());
    }

    #[test]
    fn test_bulk_world_channels_are_independent() {
        let mut pose = chain_pose();
        pose.set_world_positions(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0]).unwrap();
        let q = Quat::from_rotation_z(0.5);
        let mut rotations = Vec::new();
        for _ in 0..3 {
            rotations.extend_from_slice(&[q.x, q.y, q.z, q.w]);
        }
        pose.set_world_rotations(&rotations).unwrap();

        assert!(pose.world_position(2).unwrap().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), EPS));
        assert!(pose.world_rotation(1).unwrap().abs_diff_eq(q, EPS));
        assert!(pose.set_world_positions(&[0.0; 8]).is_err());
    }

    #[test]
    fn test_set_position_moves_whole_skeleton() {
        let mut pose = chain_pose();
        pose.set_local_position(1, Vec3::Y).unwrap();
        pose.set_position(Vec3::new(10.0, 0.0, 0.0)).unwrap();

        assert!(pose.world_position(0).unwrap().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), EPS));
        assert!(pose.world_position(1).unwrap().abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), EPS));
        assert!(pose.local_position(1).unwrap().abs_diff_eq(Vec3::Y, EPS));
    }

    #[test]
    fn test_set_position_leaves_other_roots() {
        let mut pose = Pose::new(SkeletonId::next(), Arc::from(vec![None, None, Some(0)]));
        pose.set_local_position(1, Vec3::X).unwrap();
        pose.set_local_position(2, Vec3::Y).unwrap();
        pose.set_position(Vec3::new(5.0, 0.0, 0.0)).unwrap();

        assert!(pose.world_position(1).unwrap().abs_diff_eq(Vec3::X, EPS));
        assert!(pose.world_position(2).unwrap().abs_diff_eq(Vec3::new(5.0, 1.0, 0.0), EPS));

        // 之后的局部修改不会让其他骨骼跳变
        pose.set_local_position(0, Vec3::new(5.0, 0.0, 1.0)).unwrap();
        assert!(pose.world_position(1).unwrap().abs_diff_eq(Vec3::X, EPS));
        assert!(pose.local_position(1).unwrap().abs_diff_eq(Vec3::X, EPS));
        assert!(pose.world_position(2).unwrap().abs_diff_eq(Vec3::new(5.0, 1.0, 1.0), EPS));
    }

    #[test]
    fn test_copy_is_deep() {
        let mut a = chain_pose();
        a.set_local_position(1, Vec3::X).unwrap();
        let mut b = chain_pose();
        b.copy_from(&a).unwrap();
        a.set_local_position(1, Vec3::Z).unwrap();

        assert!(b.local_position(1).unwrap().abs_diff_eq(Vec3::X, EPS));
        assert!(b.is_changed(1).unwrap());
    }

    #[test]
    fn test_copy_size_mismatch() {
        let mut a = chain_pose();
        let b = Pose::new(SkeletonId::next(), Arc::from(vec![None]));
        assert!(matches!(a.copy_from(&b), Err(SkeletonError::IllegalArgument(_))));
    }

    #[test]
    fn test_inverse_then_combine_is_identity() {
        let mut pose = chain_pose();
        pose.set_local_matrix(0, Mat4::from_rotation_y(0.7)).unwrap();
        pose.set_local_position(1, Vec3::new(0.0, 1.0, 0.5)).unwrap();
        pose.set_local_rotation(2, Quat::from_rotation_x(1.1)).unwrap();

        let mut inverse = chain_pose();
        inverse.inverse_of(&pose).unwrap();
        pose.combine(&inverse).unwrap();

        for i in 0..3 {
            assert!(pose.world_matrix(i).unwrap().abs_diff_eq(Mat4::IDENTITY, EPS));
        }
    }

    #[test]
    fn test_matrix_array_layout() {
        let mut pose = chain_pose();
        pose.set_local_position(2, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let flat = pose.local_matrix_array();
        assert_eq!(flat.len(), 48);
        // 列主序，平移位于每个矩阵的 12..15
        assert_eq!(&flat[32 + 12..32 + 15], &[1.0, 2.0, 3.0]);

        let mut other = chain_pose();
        other.set_local_matrix_array(&flat).unwrap();
        assert!(other.abs_diff_eq(&pose, EPS));
    }

    #[test]
    fn test_read_without_mutation() {
        let mut pose = chain_pose();
        pose.set_local_position(1, Vec3::Y).unwrap();
        pose.set_local_position(2, Vec3::Y).unwrap();
        let worlds = pose.world_matrices();
        assert!(worlds[2].w_axis.truncate().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), EPS));
    }

    fn arb_rigid() -> impl Strategy<Value = Mat4> {
        (
            -3.0f32..3.0,
            -3.0f32..3.0,
            -3.0f32..3.0,
            -10.0f32..10.0,
            -10.0f32..10.0,
            -10.0f32..10.0,
        )
            .prop_map(|(a, b, c, x, y, z)| {
                let q = Quat::from_euler(glam::EulerRot::XYZ, a, b, c);
                Mat4::from_rotation_translation(q, Vec3::new(x, y, z))
            })
    }

    proptest! {
        #[test]
        fn sync_is_idempotent(m0 in arb_rigid(), m1 in arb_rigid(), m2 in arb_rigid()) {
            let mut pose = chain_pose();
            pose.set_local_matrix(0, m0).unwrap();
            pose.set_local_matrix(1, m1).unwrap();
            pose.set_local_matrix(2, m2).unwrap();
            pose.sync();
            let first = pose.world_matrices().into_owned();
            pose.sync();
            prop_assert_eq!(first, pose.world_matrices().into_owned());
        }

        #[test]
        fn world_local_world_round_trip(m0 in arb_rigid(), m1 in arb_rigid(), m2 in arb_rigid()) {
            let mut pose = chain_pose();
            pose.set_world_matrix(0, m0).unwrap();
            pose.set_world_matrix(1, m1).unwrap();
            pose.set_world_matrix(2, m2).unwrap();
            pose.sync();
            let locals = pose.local_matrices().into_owned();

            let mut rebuilt = chain_pose();
            for (i, m) in locals.iter().enumerate() {
                rebuilt.set_local_matrix(i, *m).unwrap();
            }
            prop_assert!(rebuilt.world_matrix(0).unwrap().abs_diff_eq(m0, 1e-3));
            prop_assert!(rebuilt.world_matrix(1).unwrap().abs_diff_eq(m1, 1e-3));
            prop_assert!(rebuilt.world_matrix(2).unwrap().abs_diff_eq(m2, 1e-3));
        }
    }
}
