//! 骨骼数据结构
//!
//! 定义骨骼层级、绑定姿态和当前姿态，支持复杂角色动画。
//!
//! 骨架持有两个持久姿态：
//! - **绑定姿态**：蒙皮网格静止时的参考姿态，修改时同步缓存其逆（逆绑定姿态）
//! - **当前姿态**：由动画、物理或场景节点持续驱动
//!
//! 蒙皮姿态 = 当前姿态 x 逆绑定姿态，按需计算后推送给 [`SkinningSink`]。

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

use super::binding::{NodeId, SceneGraph};
use super::bone::{BoneOptions, PoseSpace};
use super::pose::{rotation_of, Pose};
use super::sink::SkinningSink;
use super::source::SkeletonSource;
use crate::config::SkeletonConfig;
use crate::core::error::{check_index, check_len, SkeletonError, SkeletonResult};

static NEXT_SKELETON_ID: AtomicU64 = AtomicU64::new(1);

/// 骨架唯一标识，用于检查姿态归属
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SkeletonId(u64);

impl SkeletonId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SKELETON_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 骨架姿态生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonState {
    /// 尚未建立绑定姿态
    Unbound,
    /// 绑定姿态和逆绑定姿态已建立，当前姿态等于绑定姿态
    Bound,
    /// 当前姿态已被动画/物理/场景节点修改
    Animating,
}

// ============================================================================
// 骨骼层级（Skeleton）
// ============================================================================

/// 骨骼层级组件
#[derive(Component)]
pub struct Skeleton {
    id: SkeletonId,
    /// 父骨骼索引（None 表示根骨骼），父骨骼总在子骨骼之前
    parents: Arc<[Option<usize>]>,
    bone_names: Vec<String>,
    bone_options: Vec<BoneOptions>,
    /// 骨骼索引到场景节点的弱引用表
    bones: Vec<Option<NodeId>>,
    owner: Option<NodeId>,
    bone_axis: Vec3,
    root_offset: Vec3,
    merged_bone_options: BoneOptions,
    bind_pose: Pose,
    inverse_bind_pose: Option<Pose>,
    pose: Pose,
    skin_pose: Option<Pose>,
    animating: bool,
    /// 当前姿态局部矩阵（扁平数组）
    pose_matrices: Vec<f32>,
    /// 最终蒙皮矩阵（扁平数组）
    skin_matrices: Vec<f32>,
    sink: Option<Box<dyn SkinningSink>>,
}

impl Skeleton {
    /// 通过父索引数组创建骨架
    ///
    /// 每个元素是对应骨骼的父索引，-1 表示根骨骼。父骨骼必须出现在子骨骼之前，
    /// 因此骨骼 0 总是根骨骼。
    pub fn new(parents: &[i32]) -> SkeletonResult<Self> {
        let parents = validate_parents(parents)?;
        Ok(Self::from_parents(parents))
    }

    fn from_parents(parents: Vec<Option<usize>>) -> Self {
        let bone_count = parents.len();
        let parents: Arc<[Option<usize>]> = Arc::from(parents);
        let id = SkeletonId::next();
        let config = SkeletonConfig::default();

        Self {
            id,
            bone_names: (0..bone_count).map(|i| format!("bone_{}", i)).collect(),
            bone_options: vec![BoneOptions::empty(); bone_count],
            bones: vec![None; bone_count],
            owner: None,
            bone_axis: config.bone_axis(),
            root_offset: config.root_offset(),
            merged_bone_options: config.merged_bone_options,
            bind_pose: Pose::new(id, parents.clone()),
            inverse_bind_pose: None,
            pose: Pose::new(id, parents.clone()),
            skin_pose: None,
            animating: false,
            pose_matrices: vec![0.0; bone_count * 16],
            skin_matrices: Vec::new(),
            sink: None,
            parents,
        }
    }

    /// 根据场景节点层级创建骨架
    ///
    /// 只有名称在 `bone_names` 中的节点成为骨骼。每根骨骼的父骨骼是其节点的父节点
    /// （按名称在列表中查找）；找不到父骨骼的成为根骨骼，第一个这样的节点成为骨架
    /// 所有者，骨架随即挂接到该节点并从节点变换捕获绑定姿态。
    /// 场景中找不到的骨骼名称只记录警告。
    pub fn from_hierarchy<S, N>(scene: &S, root: NodeId, bone_names: &[N]) -> SkeletonResult<Self>
    where
        S: SceneGraph + ?Sized,
        N: AsRef<str>,
    {
        let names: Vec<String> = bone_names.iter().map(|n| n.as_ref().to_string()).collect();
        check_unique_names(&names)?;
        let (parents, skeleton_root) = resolve_parents(scene, root, &names);
        let parents = validate_parents(&parents)?;

        let mut skeleton = Self::from_parents(parents);
        skeleton.bone_names = names;
        if let Some(owner) = skeleton_root {
            skeleton.attach(scene, owner)?;
        }
        Ok(skeleton)
    }

    /// 从已有的底层骨骼表示创建骨架
    ///
    /// 骨骼数量、父子关系、名称和姿态矩阵都取自 `source`，
    /// 其姿态成为绑定姿态。
    pub fn from_source<S: SkeletonSource + ?Sized>(source: &S) -> SkeletonResult<Self> {
        let bone_count = source.bone_count();
        let parents = source.bone_parents();
        if parents.len() != bone_count {
            return Err(SkeletonError::illegal(format!(
                "source reports {} bones but {} parents",
                bone_count,
                parents.len()
            )));
        }
        let mut skeleton = Self::new(&parents)?;
        let names: Vec<String> = (0..bone_count)
            .map(|i| source.bone_name(i).unwrap_or_else(|| format!("bone_{}", i)))
            .collect();
        check_unique_names(&names)?;
        skeleton.bone_names = names;

        let matrices = source.pose_matrices();
        skeleton.bind_pose.set_local_matrix_array(&matrices)?;
        skeleton.bind_pose.sync();
        skeleton.establish_bind_pose()?;
        Ok(skeleton)
    }

    /// 应用配置中的骨骼轴、根偏移和合并选项
    pub fn with_config(mut self, config: &SkeletonConfig) -> Self {
        self.bone_axis = config.bone_axis();
        self.root_offset = config.root_offset();
        self.merged_bone_options = config.merged_bone_options;
        self
    }

    /// 从配置文件（`.json` 或 TOML）加载并应用配置，配置需通过验证
    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> SkeletonResult<Self> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SkeletonConfig::from_json_file(path)?,
            _ => SkeletonConfig::from_toml_file(path)?,
        };
        config.validate()?;
        tracing::debug!(target: "skeleton", "Applied skeleton config from {}", path.display());
        Ok(self.with_config(&config))
    }

    /// 设置渲染/蒙皮输出端，并立即推送层级和当前姿态
    pub fn set_sink(&mut self, sink: Box<dyn SkinningSink>) {
        self.sink = Some(sink);
        self.push_topology();
        self.update_bone_pose();
    }

    pub fn with_sink(mut self, sink: Box<dyn SkinningSink>) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn SkinningSink>> {
        self.sink.take()
    }

    // ------------------------------------------------------------------
    // 骨骼信息
    // ------------------------------------------------------------------

    pub fn id(&self) -> SkeletonId {
        self.id
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.parents.len()
    }

    /// 父骨骼索引，根骨骼返回 `None`
    pub fn parent_index(&self, bone: usize) -> SkeletonResult<Option<usize>> {
        check_index(bone, self.bone_count())?;
        Ok(self.parents[bone])
    }

    /// 父索引数组，-1 表示根骨骼
    pub fn parent_indices(&self) -> Vec<i32> {
        self.parents
            .iter()
            .map(|p| p.map_or(-1, |i| i as i32))
            .collect()
    }

    /// 通过名称获取骨骼索引
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.iter().position(|n| n == name)
    }

    /// 绑定到给定场景节点的骨骼索引
    pub fn bone_index_of_node(&self, node: NodeId) -> Option<usize> {
        self.bones.iter().position(|b| *b == Some(node))
    }

    pub fn bone_name(&self, bone: usize) -> SkeletonResult<&str> {
        check_index(bone, self.bone_count())?;
        Ok(&self.bone_names[bone])
    }

    pub fn set_bone_name(&mut self, bone: usize, name: impl Into<String>) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        let name = name.into();
        if let Some(other) = self.bone_index(&name).filter(|&i| i != bone) {
            return Err(SkeletonError::illegal(format!(
                "bone name {} already used by bone {}",
                name, other
            )));
        }
        self.bone_names[bone] = name;
        self.push_topology();
        Ok(())
    }

    /// 按骨骼索引顺序的名称列表
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    /// 一次设置所有骨骼名称，长度必须等于骨骼数量
    pub fn set_bone_names(&mut self, names: Vec<String>) -> SkeletonResult<()> {
        if names.len() != self.bone_count() {
            return Err(SkeletonError::illegal(format!(
                "bone names array has {} entries, expected {}",
                names.len(),
                self.bone_count()
            )));
        }
        check_unique_names(&names)?;
        self.bone_names = names;
        self.push_topology();
        Ok(())
    }

    pub fn bone_options(&self, bone: usize) -> SkeletonResult<BoneOptions> {
        check_index(bone, self.bone_count())?;
        Ok(self.bone_options[bone])
    }

    /// 设置骨骼的旋转锁定和驱动方式
    pub fn set_bone_options(&mut self, bone: usize, options: BoneOptions) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.bone_options[bone] = options;
        Ok(())
    }

    pub fn is_locked(&self, bone: usize) -> SkeletonResult<bool> {
        Ok(self.bone_options(bone)?.is_locked())
    }

    /// 骨骼绑定的场景节点
    pub fn bone(&self, bone: usize) -> SkeletonResult<Option<NodeId>> {
        check_index(bone, self.bone_count())?;
        Ok(self.bones[bone])
    }

    pub fn set_bone(&mut self, bone: usize, node: Option<NodeId>) -> SkeletonResult<()> {
        check_index(bone, self.bone_count())?;
        self.bones[bone] = node;
        Ok(())
    }

    /// 骨架挂接的场景节点
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    /// 骨骼Z轴，定义骨骼坐标系，默认 (0, 0, 1)
    pub fn bone_axis(&self) -> Vec3 {
        self.bone_axis
    }

    pub fn set_bone_axis(&mut self, axis: Vec3) {
        self.bone_axis = axis;
    }

    /// 动画输入（`apply_pose` 的 `SkeletonRoot` 空间和 `transform_pose`）中
    /// 加到根骨骼平移上的偏移，不影响从场景节点拉取的姿态
    pub fn root_offset(&self) -> Vec3 {
        self.root_offset
    }

    pub fn set_root_offset(&mut self, offset: Vec3) {
        self.root_offset = offset;
    }

    /// 骨架位置（当前姿态中根骨骼的世界平移）
    pub fn position(&self) -> Vec3 {
        self.pose.world_matrices()[0].w_axis.truncate()
    }

    pub fn set_position(&mut self, position: Vec3) -> SkeletonResult<()> {
        self.pose.set_position(position)?;
        self.animating = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 姿态
    // ------------------------------------------------------------------

    /// 创建属于本骨架的单位姿态，供动画生产者写入
    pub fn new_pose(&self) -> Pose {
        Pose::new(self.id, self.parents.clone())
    }

    pub fn state(&self) -> SkeletonState {
        match (&self.inverse_bind_pose, self.animating) {
            (None, _) => SkeletonState::Unbound,
            (Some(_), false) => SkeletonState::Bound,
            (Some(_), true) => SkeletonState::Animating,
        }
    }

    /// 绑定姿态，只读
    pub fn bind_pose(&self) -> &Pose {
        &self.bind_pose
    }

    /// 逆绑定姿态，绑定姿态建立前为 `None`
    pub fn inverse_bind_pose(&self) -> Option<&Pose> {
        self.inverse_bind_pose.as_ref()
    }

    /// 当前姿态
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// 可直接修改的当前姿态
    pub fn pose_mut(&mut self) -> &mut Pose {
        self.animating = true;
        &mut self.pose
    }

    /// 最近一次推送的当前姿态局部矩阵
    pub fn pose_matrices(&self) -> &[f32] {
        &self.pose_matrices
    }

    /// 最近一次推送的蒙皮矩阵
    pub fn skin_matrices(&self) -> &[f32] {
        &self.skin_matrices
    }

    /// 设置绑定姿态
    ///
    /// 复制输入姿态（不共享），重新计算逆绑定姿态，把当前姿态重置为绑定姿态并推送。
    pub fn set_bind_pose(&mut self, pose: &Pose) -> SkeletonResult<()> {
        self.check_pose_size(pose)?;
        self.bind_pose.copy_from(pose)?;
        self.bind_pose.sync();
        self.establish_bind_pose()
    }

    /// 用相对骨架根的旋转 (x, y, z, w) 和平移数组设置绑定姿态
    pub fn set_bind_pose_arrays(&mut self, rotations: &[f32], positions: &[f32]) -> SkeletonResult<()> {
        check_len("rotation", rotations.len(), self.bone_count(), 4)?;
        check_len("position", positions.len(), self.bone_count(), 3)?;
        self.bind_pose.set_world_rotations(rotations)?;
        self.bind_pose.set_world_positions(positions)?;
        self.bind_pose.sync();
        self.establish_bind_pose()
    }

    /// 恢复到绑定姿态
    pub fn restore_bind_pose(&mut self) -> SkeletonResult<()> {
        self.bind_pose.sync();
        self.establish_bind_pose()
    }

    fn establish_bind_pose(&mut self) -> SkeletonResult<()> {
        let mut inverse = self.inverse_bind_pose.take().unwrap_or_else(|| self.new_pose());
        inverse.inverse_of(&self.bind_pose)?;
        inverse.sync();
        self.inverse_bind_pose = Some(inverse);
        self.pose.copy_from(&self.bind_pose)?;
        self.animating = false;
        tracing::debug!(target: "skeleton", "Bind pose established for {} bones", self.bone_count());
        self.update_bone_pose();
        Ok(())
    }

    /// 用同一骨架的另一个姿态替换当前姿态
    pub fn set_pose(&mut self, pose: &Pose) -> SkeletonResult<()> {
        if pose.skeleton_id() != self.id || pose.bone_count() != self.bone_count() {
            return Err(SkeletonError::illegal(
                "set_pose: input pose has incompatible skeleton",
            ));
        }
        self.pose.copy_from(pose)?;
        self.pose.sync();
        self.animating = true;
        self.update_bone_pose();
        Ok(())
    }

    /// 就地更新当前姿态
    ///
    /// 锁定旋转的骨骼忽略输入。`BindPoseRelative` 和 `RotationOnly` 只处理输入姿态中
    /// 标记为已修改的骨骼，并在使用后清除标记。
    pub fn apply_pose(&mut self, newpose: &mut Pose, space: PoseSpace) -> SkeletonResult<()> {
        self.check_pose_size(newpose)?;
        newpose.sync();
        let src = newpose.local_matrices().into_owned();

        match space {
            PoseSpace::SkeletonRoot => {
                for (i, m) in src.iter().enumerate() {
                    if !self.bone_options[i].is_locked() {
                        let local = self.offset_root(i, *m);
                        self.pose.set_local_matrix(i, local)?;
                    }
                }
            }
            PoseSpace::BindPoseRelative => {
                let bind_locals = self.bind_pose.local_matrices().into_owned();
                for (i, m) in src.iter().enumerate() {
                    if self.bone_options[i].is_locked() || !newpose.take_changed(i) {
                        continue;
                    }
                    let rotation = rotation_of(&(bind_locals[i] * *m));
                    self.pose.set_local_rotation(i, rotation)?;
                }
            }
            PoseSpace::RotationOnly => {
                for (i, m) in src.iter().enumerate() {
                    if self.bone_options[i].is_locked() || !newpose.take_changed(i) {
                        continue;
                    }
                    self.pose.set_local_rotation(i, rotation_of(m))?;
                }
            }
        }

        self.pose.sync();
        self.animating = true;
        self.update_bone_pose();
        Ok(())
    }

    /// 更新当前姿态并应用所有者的变换
    ///
    /// 输入姿态被旋转到所有者所在坐标系：骨骼全部未锁定时，
    /// 每根骨骼的世界矩阵 = `owner_world * newpose` 的世界矩阵。
    pub fn transform_pose(&mut self, newpose: &mut Pose, owner_world: Mat4) -> SkeletonResult<()> {
        self.check_pose_size(newpose)?;
        newpose.sync();
        let src = newpose.local_matrices();

        for (i, m) in src.iter().enumerate() {
            if self.bone_options[i].is_locked() {
                continue;
            }
            let local = match self.parents[i] {
                Some(_) => *m,
                None => owner_world * self.offset_root(i, *m),
            };
            self.pose.set_local_matrix(i, local)?;
        }

        self.pose.sync();
        self.animating = true;
        self.update_bone_pose();
        Ok(())
    }

    /// 计算蒙皮姿态：每根骨骼 `current.world * inverse_bind.world`
    ///
    /// 绑定姿态建立前返回 `None`。
    pub fn compute_skin_pose(&mut self) -> Option<&Pose> {
        let inverse = self.inverse_bind_pose.as_ref()?;
        self.pose.sync();

        if self.skin_pose.as_ref().map(Pose::bone_count) != Some(self.pose.bone_count()) {
            self.skin_pose = Some(self.pose.clone());
        }
        let skin = self.skin_pose.as_mut()?;
        skin.copy_from(&self.pose).ok()?;
        skin.combine(inverse).ok()?;
        Some(&*skin)
    }

    /// 计算蒙皮姿态并推送到输出端，绑定姿态未建立时返回 `false`
    pub fn update_skin_pose(&mut self) -> bool {
        if self.compute_skin_pose().is_none() {
            return false;
        }
        if let Some(skin) = &self.skin_pose {
            let worlds = skin.world_matrices();
            self.skin_matrices.clear();
            self.skin_matrices
                .extend_from_slice(bytemuck::cast_slice::<Mat4, f32>(&worlds));
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.set_skin_pose(&self.skin_matrices);
        }
        true
    }

    /// 把当前姿态的局部矩阵推送到输出端
    pub fn update_bone_pose(&mut self) {
        self.pose_matrices = self.pose.local_matrix_array();
        if let Some(sink) = self.sink.as_mut() {
            sink.set_bone_pose(&self.pose_matrices);
        }
    }

    /// 从底层骨骼表示读取当前姿态（局部矩阵）
    pub fn pull_pose<S: SkeletonSource + ?Sized>(&mut self, source: &S) -> SkeletonResult<()> {
        let matrices = source.pose_matrices();
        self.pose.set_local_matrix_array(&matrices)?;
        self.pose.sync();
        self.animating = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 场景节点绑定
    // ------------------------------------------------------------------

    /// 挂接到场景节点
    ///
    /// 尚无绑定姿态时，从匹配节点的变换捕获绑定姿态；否则重新绑定节点并恢复绑定姿态。
    pub fn attach<S: SceneGraph + ?Sized>(&mut self, scene: &S, owner: NodeId) -> SkeletonResult<()> {
        self.owner = Some(owner);
        let captured = self.bind_nodes(scene);

        if self.inverse_bind_pose.is_none() {
            for (bone, world) in captured {
                self.bind_pose.set_world_matrix(bone, world)?;
            }
            self.bind_pose.sync();
            self.establish_bind_pose()
        } else {
            self.restore_bind_pose()
        }
    }

    /// 从场景分离，清除节点绑定但保留姿态
    pub fn detach(&mut self) {
        self.owner = None;
        self.bones.fill(None);
    }

    /// 在所有者的后代中按名称查找骨骼节点并建立绑定
    ///
    /// 提供 `save_pose` 时，把匹配节点的变换（相对所有者所在坐标系）写入该姿态。
    /// 返回绑定的骨骼数量。
    pub fn attach_bones<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        save_pose: Option<&mut Pose>,
    ) -> SkeletonResult<usize> {
        let captured = self.bind_nodes(scene);
        let count = captured.len();
        if let Some(pose) = save_pose {
            for (bone, world) in captured {
                pose.set_world_matrix(bone, world)?;
            }
        }
        Ok(count)
    }

    fn bind_nodes<S: SceneGraph + ?Sized>(&mut self, scene: &S) -> Vec<(usize, Mat4)> {
        let Some(owner) = self.owner else {
            return Vec::new();
        };
        let frame = scene
            .parent(owner)
            .map_or(Mat4::IDENTITY, |p| scene.world_matrix(p).inverse());

        let mut captured: Vec<(usize, Mat4)> = Vec::new();
        for node in scene.descendants(owner) {
            let Some(name) = scene.name(node).filter(|n| !n.is_empty()) else {
                continue;
            };
            let Some(bone) = self.bone_index(name) else {
                continue;
            };
            if captured.iter().any(|(b, _)| *b == bone) {
                continue;
            }
            self.bones[bone] = Some(node);
            captured.push((bone, frame * scene.world_matrix(node)));
        }

        let missing = self.bone_count() - captured.len();
        if missing > 0 {
            tracing::warn!(
                target: "skeleton",
                "{} of {} bones not found under owner node {:?}",
                missing,
                self.bone_count(),
                owner
            );
        }
        captured
    }

    /// 用绑定节点的局部变换更新当前姿态，跳过锁定或未绑定的骨骼
    pub fn pose_from_bones<S: SceneGraph + ?Sized>(&mut self, scene: &S) -> SkeletonResult<()> {
        self.pull_from_nodes(scene, None)
    }

    /// 同 [`pose_from_bones`](Self::pose_from_bones)，但只更新选项与 `mask` 相交的骨骼
    pub fn pose_from_bones_masked<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        mask: BoneOptions,
    ) -> SkeletonResult<()> {
        self.pull_from_nodes(scene, Some(mask))
    }

    fn pull_from_nodes<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        mask: Option<BoneOptions>,
    ) -> SkeletonResult<()> {
        for i in 0..self.bone_count() {
            let Some(node) = self.bones[i] else {
                continue;
            };
            let options = self.bone_options[i];
            if options.is_locked() || mask.is_some_and(|m| !options.intersects(m)) {
                continue;
            }
            self.pose.set_local_matrix(i, scene.local_matrix(node))?;
        }
        self.pose.sync();
        self.animating = true;
        self.update_bone_pose();
        Ok(())
    }

    /// 把当前姿态的局部矩阵写回绑定的场景节点，跳过锁定或未绑定的骨骼
    pub fn pose_to_bones<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        self.pose.sync();
        let locals = self.pose.local_matrices();
        for (i, node) in self.bones.iter().enumerate() {
            let Some(node) = *node else {
                continue;
            };
            if !self.bone_options[i].is_locked() {
                scene.set_local_matrix(node, locals[i]);
            }
        }
    }

    // ------------------------------------------------------------------
    // 合并
    // ------------------------------------------------------------------

    /// 把另一个骨架中名称不存在的骨骼追加到本骨架
    ///
    /// 原有骨骼保持索引；新骨骼的父骨骼按名称重新映射，找不到时成为根骨骼。
    /// 新骨骼的绑定/当前局部矩阵取自源骨架的绑定姿态。之前获取的姿态引用全部失效。
    /// 返回追加的骨骼数量。
    pub fn merge(&mut self, other: &Skeleton) -> SkeletonResult<usize> {
        let old_count = self.bone_count();
        let mut names = self.bone_names.clone();
        let mut parents: Vec<Option<usize>> = self.parents.to_vec();
        let mut new_locals: Vec<Mat4> = Vec::new();
        let other_bind = other.bind_pose.local_matrices();

        for (j, name) in other.bone_names.iter().enumerate() {
            if names.iter().any(|n| n == name) {
                continue;
            }
            let parent = other.parents[j].and_then(|p| {
                let parent_name = &other.bone_names[p];
                names.iter().position(|n| n == parent_name)
            });
            names.push(name.clone());
            parents.push(parent);
            new_locals.push(other_bind[j]);
        }

        if new_locals.is_empty() {
            return Ok(0);
        }
        let added = new_locals.len();
        let total = old_count + added;

        let old_bind = self.bind_pose.local_matrices().into_owned();
        let old_pose = self.pose.local_matrices().into_owned();

        self.parents = Arc::from(parents);
        self.bone_names = names;
        self.bone_options.resize(total, self.merged_bone_options);
        self.bones.resize(total, None);
        self.pose_matrices = vec![0.0; total * 16];
        self.skin_pose = None;

        let mut bind_pose = self.new_pose();
        let mut pose = self.new_pose();
        for (i, m) in old_bind.iter().chain(new_locals.iter()).enumerate() {
            bind_pose.set_local_matrix(i, *m)?;
        }
        for (i, m) in old_pose.iter().chain(new_locals.iter()).enumerate() {
            pose.set_local_matrix(i, *m)?;
        }
        bind_pose.sync();
        pose.sync();
        bind_pose.clear_changed();
        pose.clear_changed();
        self.bind_pose = bind_pose;
        self.pose = pose;

        let mut inverse = self.new_pose();
        inverse.inverse_of(&self.bind_pose)?;
        inverse.sync();
        self.inverse_bind_pose = Some(inverse);

        tracing::info!(
            target: "skeleton",
            "Merged {} bones into skeleton ({} -> {})",
            added,
            old_count,
            total
        );
        self.push_topology();
        self.update_bone_pose();
        Ok(added)
    }

    // ------------------------------------------------------------------
    // 内部辅助
    // ------------------------------------------------------------------

    /// 动画输入的根骨骼矩阵加上根偏移
    fn offset_root(&self, bone: usize, mut matrix: Mat4) -> Mat4 {
        if bone == 0 {
            matrix.w_axis += self.root_offset.extend(0.0);
        }
        matrix
    }

    fn check_pose_size(&self, pose: &Pose) -> SkeletonResult<()> {
        if pose.bone_count() == self.bone_count() {
            Ok(())
        } else {
            Err(SkeletonError::illegal(format!(
                "pose has {} bones, skeleton has {}",
                pose.bone_count(),
                self.bone_count()
            )))
        }
    }

    fn push_topology(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let parents: Vec<i32> = self
                .parents
                .iter()
                .map(|p| p.map_or(-1, |i| i as i32))
                .collect();
            sink.set_topology(&parents, &self.bone_names);
        }
    }
}

impl fmt::Display for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Skeleton")?;
        writeln!(f, "  numBones = {}", self.bone_count())?;
        for (i, name) in self.bone_names.iter().enumerate() {
            writeln!(f, "    {}: {}", i, name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skeleton")
            .field("id", &self.id)
            .field("bone_names", &self.bone_names)
            .field("parents", &self.parents)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// 骨骼名称必须唯一
fn check_unique_names(names: &[String]) -> SkeletonResult<()> {
    let mut seen = HashSet::with_capacity(names.len());
    match names.iter().find(|n| !seen.insert(n.as_str())) {
        Some(name) => Err(SkeletonError::illegal(format!("duplicate bone name {}", name))),
        None => Ok(()),
    }
}

/// 检查父索引数组：非空，每根骨骼的父骨骼必须在它之前
fn validate_parents(parents: &[i32]) -> SkeletonResult<Vec<Option<usize>>> {
    if parents.is_empty() {
        return Err(SkeletonError::illegal("skeleton must have at least one bone"));
    }
    parents
        .iter()
        .enumerate()
        .map(|(i, &p)| match p {
            p if p < 0 => Ok(None),
            p if (p as usize) < i => Ok(Some(p as usize)),
            p => Err(SkeletonError::illegal(format!(
                "bone {} has parent {} which does not precede it",
                i, p
            ))),
        })
        .collect()
}

/// 通过场景节点层级解析每根骨骼的父索引
///
/// 返回父索引数组和第一个根骨骼节点。
fn resolve_parents<S: SceneGraph + ?Sized>(
    scene: &S,
    root: NodeId,
    bone_names: &[String],
) -> (Vec<i32>, Option<NodeId>) {
    let mut parents = vec![-1; bone_names.len()];
    let mut skeleton_root = None;

    for (bone, name) in bone_names.iter().enumerate() {
        let Some(node) = scene.find_descendant(root, name) else {
            tracing::warn!(target: "skeleton", "Bone {} not found in scene", name);
            continue;
        };
        let parent = scene
            .parent(node)
            .and_then(|p| scene.name(p))
            .and_then(|parent_name| bone_names.iter().position(|n| n == parent_name));

        match parent {
            Some(p) => parents[bone] = p as i32,
            None if skeleton_root.is_none() => {
                tracing::debug!(target: "skeleton", "Skeleton root is {}", name);
                skeleton_root = Some(node);
            }
            None => {}
        }
    }
    (parents, skeleton_root)
}

// ============================================================================
// 测试
// ============================================================================
